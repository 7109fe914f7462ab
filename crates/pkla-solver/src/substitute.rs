//! Type parameter substitution.
//!
//! Bindings map generic type-parameter definitions to concrete types and
//! are threaded through resolution and inference by value — never stored
//! globally. Substitution rebuilds interned types, so the result is
//! normalized exactly like a directly-constructed type (unions re-flatten).

use crate::db::TypeDatabase;
use crate::def::DefId;
use crate::types::{TypeData, TypeId};
use pkla_common::limits::MAX_INSTANTIATION_DEPTH;
use rustc_hash::FxHashMap;

/// Mapping from type parameter definition to the type substituted for it.
pub type TypeParameterBindings = FxHashMap<DefId, TypeId>;

/// Zip parameter definitions with argument types; missing arguments bind
/// `unknown` so partially-applied generics stay total.
pub fn bindings_for(params: &[DefId], args: &[TypeId]) -> TypeParameterBindings {
    params
        .iter()
        .enumerate()
        .map(|(i, &p)| (p, args.get(i).copied().unwrap_or(TypeId::UNKNOWN)))
        .collect()
}

/// Replace `Variable` occurrences per `bindings`, recursing into type
/// arguments, union members, function parameter/return types and
/// constrained bases.
pub fn substitute(db: TypeDatabase<'_>, ty: TypeId, bindings: &TypeParameterBindings) -> TypeId {
    if bindings.is_empty() {
        return ty;
    }
    substitute_at(db, ty, bindings, 0)
}

fn substitute_at(
    db: TypeDatabase<'_>,
    ty: TypeId,
    bindings: &TypeParameterBindings,
    depth: u32,
) -> TypeId {
    if depth > MAX_INSTANTIATION_DEPTH {
        return ty;
    }
    let Some(data) = db.lookup(ty) else {
        return ty;
    };
    match data {
        TypeData::Variable { def } => bindings.get(&def).copied().unwrap_or(ty),
        TypeData::Class { def, args } => {
            let new_args = substitute_list(db, args, bindings, depth);
            match new_args {
                Some(list) => db.types.class(def, &list),
                None => ty,
            }
        }
        TypeData::Alias { def, args } => {
            let new_args = substitute_list(db, args, bindings, depth);
            match new_args {
                Some(list) => db.types.alias(def, &list),
                None => ty,
            }
        }
        TypeData::Union { members } => {
            let list = db.types.type_list(members);
            let substituted: Vec<TypeId> = list
                .iter()
                .map(|&m| substitute_at(db, m, bindings, depth + 1))
                .collect();
            if substituted.as_slice() == &*list {
                ty
            } else {
                // Re-normalize: a substitution can introduce nesting or
                // duplicates (`T|Null` with `T := String|Null`).
                db.union(substituted)
            }
        }
        TypeData::Function { params, ret } => {
            let new_params = substitute_list(db, params, bindings, depth);
            let new_ret = substitute_at(db, ret, bindings, depth + 1);
            if new_params.is_none() && new_ret == ret {
                ty
            } else {
                let params_list = match new_params {
                    Some(list) => list,
                    None => db.types.type_list(params).to_vec(),
                };
                db.types.function(&params_list, new_ret)
            }
        }
        TypeData::Constrained { base, constraints } => {
            let new_base = substitute_at(db, base, bindings, depth + 1);
            if new_base == base {
                ty
            } else {
                let list = db.types.constraint_list(constraints);
                db.types.constrained(new_base, &list)
            }
        }
        TypeData::Unknown
        | TypeData::Nothing
        | TypeData::Module { .. }
        | TypeData::StringLiteral { .. } => ty,
    }
}

/// Substitute through a type list; `None` when nothing changed.
fn substitute_list(
    db: TypeDatabase<'_>,
    list_id: crate::types::TypeListId,
    bindings: &TypeParameterBindings,
    depth: u32,
) -> Option<Vec<TypeId>> {
    let list = db.types.type_list(list_id);
    let substituted: Vec<TypeId> = list
        .iter()
        .map(|&m| substitute_at(db, m, bindings, depth + 1))
        .collect();
    if substituted.as_slice() == &*list {
        None
    } else {
        Some(substituted)
    }
}
