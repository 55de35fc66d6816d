//! Type expressions: `(type int)`, `(type geo::Point)`,
//! `(type fn (type int) (type str))`.

use kiln_diagnostic::{Fault, FaultKind};
use kiln_ir::{AstNode, AtomId, Rule};
use kiln_types::{AtomKind, AtomTable, TypeId, TypePool};

use crate::diag::{missing, resolve_fault, unexpected};

/// Where a type expression appears. `any` is only legal for parameters.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum TypePosition {
    Param,
    Other,
}

pub(crate) fn resolve_type(
    atoms: &mut AtomTable,
    scope: AtomId,
    node: &AstNode,
    position: TypePosition,
) -> Result<TypeId, Fault> {
    if node.rule != Rule::Type {
        return Err(unexpected(node, "a type position"));
    }
    let name = node.text().ok_or_else(|| missing(node, "a type name"))?;

    if name == "fn" {
        let Some((ret, params)) = node.children.split_last() else {
            return Err(missing(node, "a return type"));
        };
        let params = params
            .iter()
            .map(|p| resolve_type(atoms, scope, p, TypePosition::Param))
            .collect::<Result<Vec<_>, _>>()?;
        let ret = resolve_type(atoms, scope, ret, TypePosition::Other)?;
        return Ok(atoms.types_mut().function(&params, ret));
    }
    if let Some(extra) = node.children.first() {
        return Err(unexpected(extra, "a type"));
    }

    if let Some(ty) = TypePool::primitive_by_name(name) {
        if ty == TypeId::ANY && position != TypePosition::Param {
            return Err(Fault::new(
                FaultKind::TypeConflict,
                "`any` is only allowed as a parameter type",
            )
            .or_span(node.span));
        }
        return Ok(ty);
    }

    let ids = atoms
        .lookup_path(scope, name)
        .map_err(|err| resolve_fault(&err, node.span))?;
    match ids.as_slice() {
        [class] if atoms[*class].kind == AtomKind::Class => Ok(atoms.class_type(*class)),
        _ => Err(
            Fault::new(FaultKind::TypeConflict, format!("`{name}` is not a type"))
                .or_span(node.span),
        ),
    }
}
