//! Identity newtypes shared by the tables, the lowering engine and the VM.

use std::fmt;

macro_rules! index_newtype {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }

            /// The index as `usize`, for indexing into `Vec`s.
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            /// Build from a `Vec` length or position.
            ///
            /// # Panics
            /// Panics if `index` does not fit in `u32`.
            #[inline]
            pub fn from_index(index: usize) -> Self {
                Self(u32::try_from(index).unwrap_or_else(|_| {
                    panic!(concat!(stringify!($name), " index {} overflows u32"), index)
                }))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

index_newtype!(
    /// Identity of one atom (function, class, namespace, variable, module)
    /// in its session's atom table.
    AtomId,
    "atom#"
);

index_newtype!(
    /// A position in an [`IrSequence`](crate::ir::IrSequence), used as a
    /// jump target.
    Label,
    "@"
);

/// Local slot index within one atom's body.
///
/// Slots are allocated from a strictly increasing per-atom counter, one for
/// every expression result and user variable.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Slot(u32);

impl Slot {
    /// Wildcard slot: matches every slot of an atom in lookups, never
    /// allocated as a real slot.
    pub const ANY: Slot = Slot(u32::MAX);

    #[inline]
    pub const fn new(raw: u32) -> Self {
        Slot(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_any(self) -> bool {
        self.0 == u32::MAX
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            write!(f, "%*")
        } else {
            write!(f, "%{}", self.0)
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Compound local identity: a slot qualified by the atom whose body owns it.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Clid {
    pub atom: AtomId,
    pub slot: Slot,
}

impl Clid {
    #[inline]
    pub const fn new(atom: AtomId, slot: Slot) -> Self {
        Clid { atom, slot }
    }

    /// Wildcard identity matching every slot of `atom`.
    #[inline]
    pub const fn any(atom: AtomId) -> Self {
        Clid {
            atom,
            slot: Slot::ANY,
        }
    }

    /// Whether `self`, possibly a wildcard, matches the concrete `other`.
    #[inline]
    pub fn matches(self, other: Clid) -> bool {
        self.atom == other.atom && (self.slot.is_any() || self.slot == other.slot)
    }
}

impl fmt::Debug for Clid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.atom, self.slot)
    }
}

impl fmt::Display for Clid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
