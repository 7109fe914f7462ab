//! Query facade over the interner, definition store and string interner.
//!
//! Most solver operations need all three; `TypeDatabase` is the cheap
//! `Copy` handle threaded through them, keeping free functions out of a
//! god object without three-argument plumbing at every call site.

use crate::def::{Builtins, DefKind, DefinitionStore};
use crate::intern::TypeInterner;
use crate::substitute::{bindings_for, substitute};
use crate::types::{TypeData, TypeId};
use pkla_common::limits::MAX_SUPERCLASS_CHAIN;
use pkla_common::Interner;

#[derive(Copy, Clone)]
pub struct TypeDatabase<'a> {
    pub types: &'a TypeInterner,
    pub defs: &'a DefinitionStore,
    pub strings: &'a Interner,
}

impl<'a> TypeDatabase<'a> {
    pub fn new(
        types: &'a TypeInterner,
        defs: &'a DefinitionStore,
        strings: &'a Interner,
    ) -> Self {
        Self {
            types,
            defs,
            strings,
        }
    }

    pub fn builtins(&self) -> Builtins {
        self.defs.builtins()
    }

    pub fn lookup(&self, ty: TypeId) -> Option<TypeData> {
        self.types.lookup(ty)
    }

    // -------------------------------------------------------------------------
    // Well-known types
    // -------------------------------------------------------------------------

    pub fn string_type(&self) -> TypeId {
        self.types.class0(self.builtins().string)
    }

    pub fn boolean_type(&self) -> TypeId {
        self.types.class0(self.builtins().boolean)
    }

    pub fn int_type(&self) -> TypeId {
        self.types.class0(self.builtins().int)
    }

    pub fn float_type(&self) -> TypeId {
        self.types.class0(self.builtins().float)
    }

    pub fn number_type(&self) -> TypeId {
        self.types.class0(self.builtins().number)
    }

    pub fn null_type(&self) -> TypeId {
        self.types.class0(self.builtins().null)
    }

    pub fn dynamic_type(&self) -> TypeId {
        self.types.class0(self.builtins().dynamic)
    }

    pub fn any_type(&self) -> TypeId {
        self.types.class0(self.builtins().any)
    }

    // -------------------------------------------------------------------------
    // Union building and nullability
    // -------------------------------------------------------------------------

    /// Union with member subsumption on top of the interner's structural
    /// normalization: a string-literal alternative already covered by a
    /// `String` alternative is dropped (Pkl's enum idiom de-duplication).
    pub fn union(&self, members: Vec<TypeId>) -> TypeId {
        let raw = self.types.union(members);
        let Some(TypeData::Union { members }) = self.lookup(raw) else {
            return raw;
        };
        let list = self.types.type_list(members);
        let has_string = list.iter().any(|&m| m == self.string_type());
        if !has_string {
            return raw;
        }
        let filtered: Vec<TypeId> = list
            .iter()
            .copied()
            .filter(|&m| !matches!(self.lookup(m), Some(TypeData::StringLiteral { .. })))
            .collect();
        if filtered.len() == list.len() {
            raw
        } else {
            self.types.union(filtered)
        }
    }

    pub fn union2(&self, a: TypeId, b: TypeId) -> TypeId {
        self.union(vec![a, b])
    }

    pub fn nullable(&self, ty: TypeId) -> TypeId {
        self.union2(ty, self.null_type())
    }

    pub fn is_null_type(&self, ty: TypeId) -> bool {
        ty == self.null_type()
    }

    /// Whether `ty` admits `null` (is `Null`, or a union containing it).
    pub fn is_nullable(&self, ty: TypeId) -> bool {
        self.is_nullable_at(ty, 0)
    }

    fn is_nullable_at(&self, ty: TypeId, depth: u32) -> bool {
        if depth > pkla_common::limits::MAX_ALIAS_RESOLUTION_DEPTH {
            return false;
        }
        if self.is_null_type(ty) {
            return true;
        }
        match self.lookup(ty) {
            Some(TypeData::Union { members }) => self
                .types
                .type_list(members)
                .iter()
                .any(|&m| self.is_nullable_at(m, depth + 1)),
            Some(TypeData::Alias { .. }) => self
                .unfold_alias(ty)
                .is_some_and(|t| t != ty && self.is_nullable_at(t, depth + 1)),
            Some(TypeData::Constrained { base, .. }) => self.is_nullable_at(base, depth + 1),
            _ => false,
        }
    }

    /// Strip the `Null` alternative: `T|Null` becomes `T`, `Null` becomes
    /// `nothing`, anything else is unchanged.
    pub fn non_null(&self, ty: TypeId) -> TypeId {
        self.non_null_at(ty, 0)
    }

    fn non_null_at(&self, ty: TypeId, depth: u32) -> TypeId {
        if depth > pkla_common::limits::MAX_ALIAS_RESOLUTION_DEPTH {
            return ty;
        }
        if self.is_null_type(ty) {
            return TypeId::NOTHING;
        }
        match self.lookup(ty) {
            Some(TypeData::Union { members }) => {
                let remaining: Vec<TypeId> = self
                    .types
                    .type_list(members)
                    .iter()
                    .copied()
                    .filter(|&m| !self.is_null_type(m))
                    .collect();
                self.union(remaining)
            }
            Some(TypeData::Alias { .. }) => match self.unfold_alias(ty) {
                Some(unfolded) if unfolded != ty => self.non_null_at(unfolded, depth + 1),
                _ => ty,
            },
            _ => ty,
        }
    }

    // -------------------------------------------------------------------------
    // Alias unfolding and class chains
    // -------------------------------------------------------------------------

    /// One unfolding step: the alias body with type arguments substituted.
    /// `None` when `ty` is not an alias or the alias is dangling.
    pub fn unfold_alias(&self, ty: TypeId) -> Option<TypeId> {
        let TypeData::Alias { def, args } = self.lookup(ty)? else {
            return None;
        };
        let info = self.defs.lookup(def)?;
        let body = info.alias_body?;
        let args = self.types.type_list(args);
        let bindings = bindings_for(&info.type_params, &args);
        Some(substitute(*self, body, &bindings))
    }

    /// Walk `ty`'s nominal supertype chain (classes and modules) looking
    /// for a class definition; applies type-argument substitution at each
    /// step. Used by amendability and member lookup.
    pub fn class_chain_contains(&self, ty: TypeId, target: crate::def::DefId) -> bool {
        if !target.is_valid() {
            return false;
        }
        let mut current = ty;
        for _ in 0..MAX_SUPERCLASS_CHAIN {
            match self.lookup(current) {
                Some(TypeData::Class { def, args }) => {
                    if def == target {
                        return true;
                    }
                    let Some(info) = self.defs.lookup(def) else {
                        return false;
                    };
                    let Some(supertype) = info.supertype else {
                        return false;
                    };
                    let args = self.types.type_list(args);
                    let bindings = bindings_for(&info.type_params, &args);
                    current = substitute(*self, supertype, &bindings);
                }
                Some(TypeData::Module { def }) => match self.defs.supertype(def) {
                    Some(supertype) => current = supertype,
                    None => {
                        current = self.types.class0(self.builtins().module_class);
                    }
                },
                Some(TypeData::Alias { .. }) => match self.unfold_alias(current) {
                    Some(unfolded) if unfolded != current => current = unfolded,
                    _ => return false,
                },
                Some(TypeData::Constrained { base, .. }) => current = base,
                _ => return false,
            }
        }
        false
    }

    // -------------------------------------------------------------------------
    // Amendability / instantiability
    // -------------------------------------------------------------------------

    /// A type is amendable iff its value is object-shaped: its class chain
    /// reaches `Object` (covering `Typed`, `Dynamic`, `Listing`, `Mapping`
    /// and their subclasses) or it is a module. `unknown` is permissively
    /// amendable — the engine cannot prove the amendment invalid.
    pub fn is_amendable(&self, ty: TypeId) -> bool {
        self.is_amendable_at(ty, 0)
    }

    fn is_amendable_at(&self, ty: TypeId, depth: u32) -> bool {
        if depth > pkla_common::limits::MAX_ALIAS_RESOLUTION_DEPTH {
            return false;
        }
        if ty == TypeId::UNKNOWN {
            return true;
        }
        match self.lookup(ty) {
            Some(TypeData::Module { .. }) => true,
            Some(TypeData::Class { .. }) => {
                self.class_chain_contains(ty, self.builtins().object)
            }
            Some(TypeData::Alias { .. }) => match self.unfold_alias(ty) {
                Some(unfolded) if unfolded != ty => self.is_amendable_at(unfolded, depth + 1),
                _ => false,
            },
            Some(TypeData::Constrained { base, .. }) => self.is_amendable_at(base, depth + 1),
            _ => false,
        }
    }

    /// A type is instantiable (`new`-able) iff it is amendable and names a
    /// non-abstract class. Modules are amendable but not instantiable.
    pub fn is_instantiable(&self, ty: TypeId) -> bool {
        self.is_instantiable_at(ty, 0)
    }

    fn is_instantiable_at(&self, ty: TypeId, depth: u32) -> bool {
        if depth > pkla_common::limits::MAX_ALIAS_RESOLUTION_DEPTH {
            return false;
        }
        if ty == TypeId::UNKNOWN {
            return true;
        }
        match self.lookup(ty) {
            Some(TypeData::Class { def, .. }) => {
                if !self.is_amendable(ty) {
                    return false;
                }
                self.defs
                    .lookup(def)
                    .is_some_and(|d| !d.modifiers.contains(pkla_syntax::Modifiers::ABSTRACT))
            }
            Some(TypeData::Alias { .. }) => match self.unfold_alias(ty) {
                Some(unfolded) if unfolded != ty => self.is_instantiable_at(unfolded, depth + 1),
                _ => false,
            },
            Some(TypeData::Constrained { base, .. }) => self.is_instantiable_at(base, depth + 1),
            _ => false,
        }
    }

    /// Element type of a `Listing`-chained type, if any.
    pub fn listing_element(&self, ty: TypeId) -> Option<TypeId> {
        self.generic_argument(ty, self.builtins().listing, 0)
    }

    /// Key/value types of a `Mapping`-chained type, if any.
    pub fn mapping_entry(&self, ty: TypeId) -> Option<(TypeId, TypeId)> {
        Some((
            self.generic_argument(ty, self.builtins().mapping, 0)?,
            self.generic_argument(ty, self.builtins().mapping, 1)?,
        ))
    }

    /// The `index`-th type argument `ty` supplies to `target` anywhere in
    /// its supertype chain.
    pub fn generic_argument(
        &self,
        ty: TypeId,
        target: crate::def::DefId,
        index: usize,
    ) -> Option<TypeId> {
        if !target.is_valid() {
            return None;
        }
        let mut current = ty;
        for _ in 0..MAX_SUPERCLASS_CHAIN {
            match self.lookup(current)? {
                TypeData::Class { def, args } => {
                    let args = self.types.type_list(args);
                    if def == target {
                        return Some(args.get(index).copied().unwrap_or(TypeId::UNKNOWN));
                    }
                    let info = self.defs.lookup(def)?;
                    let supertype = info.supertype?;
                    let bindings = bindings_for(&info.type_params, &args);
                    current = substitute(*self, supertype, &bindings);
                }
                TypeData::Alias { .. } => {
                    let unfolded = self.unfold_alias(current)?;
                    if unfolded == current {
                        return None;
                    }
                    current = unfolded;
                }
                TypeData::Constrained { base, .. } => current = base,
                _ => return None,
            }
        }
        None
    }

    /// Whether `def` names something whose members can grow at runtime
    /// (`Dynamic`), which downgrades unresolved-member diagnostics.
    pub fn is_dynamic_def(&self, def: crate::def::DefId) -> bool {
        def == self.builtins().dynamic
    }

    pub fn def_kind(&self, def: crate::def::DefId) -> Option<DefKind> {
        self.defs.kind(def)
    }
}
