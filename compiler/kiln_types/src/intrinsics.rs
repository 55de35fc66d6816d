//! External functions callable from IR.
//!
//! Registered once during environment setup and shared read-only (as an
//! `Arc`) by every lowering session and VM. Signatures use only primitive
//! types, whose handles are identical in every [`TypePool`](crate::TypePool).

use rustc_hash::FxHashMap;

use crate::{RegistryError, TypeId};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Intrinsic {
    pub name: String,
    pub params: Box<[TypeId]>,
    pub ret: TypeId,
}

impl Intrinsic {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

#[derive(Clone, Debug, Default)]
pub struct IntrinsicRegistry {
    entries: FxHashMap<String, Intrinsic>,
}

impl IntrinsicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard set every VM ships handlers for.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        let entries: [(&str, &[TypeId], TypeId); 9] = [
            ("print", &[TypeId::ANY], TypeId::VOID),
            ("println", &[TypeId::ANY], TypeId::VOID),
            ("sqrt", &[TypeId::FLOAT], TypeId::FLOAT),
            ("abs", &[TypeId::INT], TypeId::INT),
            ("argc", &[], TypeId::INT),
            ("argv", &[TypeId::INT], TypeId::STR),
            ("str_len", &[TypeId::STR], TypeId::INT),
            ("int_to_str", &[TypeId::INT], TypeId::STR),
            ("concat", &[TypeId::STR, TypeId::STR], TypeId::STR),
        ];
        for (name, params, ret) in entries {
            registry.entries.insert(
                name.to_string(),
                Intrinsic {
                    name: name.to_string(),
                    params: params.into(),
                    ret,
                },
            );
        }
        registry
    }

    pub fn register(
        &mut self,
        name: &str,
        params: &[TypeId],
        ret: TypeId,
    ) -> Result<&Intrinsic, RegistryError> {
        if ret == TypeId::ANY {
            return Err(RegistryError::AnyReturn {
                name: name.to_string(),
            });
        }
        if self.entries.contains_key(name) {
            return Err(RegistryError::Duplicate {
                name: name.to_string(),
            });
        }
        tracing::debug!(name, arity = params.len(), "intrinsic registered");
        Ok(self
            .entries
            .entry(name.to_string())
            .or_insert_with(|| Intrinsic {
                name: name.to_string(),
                params: params.into(),
                ret,
            }))
    }

    pub fn lookup(&self, name: &str) -> Option<&Intrinsic> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
