//! Definition identifiers and storage.
//!
//! `DefId` is the solver-owned identity of a class, module, type alias or
//! type parameter declaration. Types reference declarations through these
//! ids rather than syntax nodes, which decouples the type model from tree
//! identity, lets tests build types without a full module graph, and gives
//! caches a stable composite key.
//!
//! The base library's backbone (Any, Typed, Dynamic, Listing, Mapping, the
//! primitive classes) is registered synthetically through [`Builtins`], so
//! the solver can answer nullability and amendability questions even before
//! a host provides a real base module tree.

use crate::intern::TypeInterner;
use crate::types::TypeId;
use dashmap::DashMap;
use pkla_binder::ModuleId;
use pkla_common::{Atom, Interner};
use pkla_syntax::{Modifiers, NodeId, Variance};
use rustc_hash::FxBuildHasher;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

/// Solver-owned declaration identifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefId(pub u32);

impl DefId {
    /// Sentinel for invalid/unregistered definitions.
    pub const INVALID: Self = Self(0);

    pub const fn is_valid(self) -> bool {
        self.0 > 0
    }
}

/// Kind of definition. Affects unfolding and subtype behavior: aliases are
/// transparent, classes and modules are nominal, type parameters resolve
/// only through bindings.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DefKind {
    Class,
    Module,
    TypeAlias,
    TypeParam,
}

/// Complete information about one definition.
#[derive(Clone, Debug)]
pub struct DefinitionInfo {
    pub kind: DefKind,
    pub name: Atom,
    pub modifiers: Modifiers,
    /// Type parameter definitions, in declaration order.
    pub type_params: Vec<DefId>,
    /// Declared variance; meaningful for `TypeParam` definitions.
    pub variance: Variance,
    /// For classes: the `extends` type. For modules: the supermodule's
    /// module type, or the builtin `Module` class type for root modules.
    pub supertype: Option<TypeId>,
    /// For type aliases: the aliased type.
    pub alias_body: Option<TypeId>,
    /// Originating declaration, when lowered from a syntax tree. Synthetic
    /// builtins carry no source.
    pub source: Option<(ModuleId, NodeId)>,
}

impl DefinitionInfo {
    pub fn class(name: Atom) -> Self {
        Self {
            kind: DefKind::Class,
            name,
            modifiers: Modifiers::empty(),
            type_params: Vec::new(),
            variance: Variance::Invariant,
            supertype: None,
            alias_body: None,
            source: None,
        }
    }

    pub fn module(name: Atom) -> Self {
        Self {
            kind: DefKind::Module,
            ..Self::class(name)
        }
    }

    pub fn type_alias(name: Atom) -> Self {
        Self {
            kind: DefKind::TypeAlias,
            ..Self::class(name)
        }
    }

    pub fn type_param(name: Atom, variance: Variance) -> Self {
        Self {
            kind: DefKind::TypeParam,
            variance,
            ..Self::class(name)
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_type_params(mut self, params: Vec<DefId>) -> Self {
        self.type_params = params;
        self
    }

    pub fn with_supertype(mut self, supertype: TypeId) -> Self {
        self.supertype = Some(supertype);
        self
    }

    pub fn with_source(mut self, module: ModuleId, node: NodeId) -> Self {
        self.source = Some((module, node));
        self
    }
}

/// Well-known base library definitions.
///
/// Fields default to [`DefId::INVALID`] until [`DefinitionStore::install_builtins`]
/// runs; every consumer treats an invalid id as "not that builtin".
#[derive(Copy, Clone, Debug)]
pub struct Builtins {
    pub any: DefId,
    pub object: DefId,
    pub typed: DefId,
    pub dynamic: DefId,
    pub listing: DefId,
    pub mapping: DefId,
    pub string: DefId,
    pub boolean: DefId,
    pub number: DefId,
    pub int: DefId,
    pub float: DefId,
    pub null: DefId,
    pub collection: DefId,
    pub list: DefId,
    pub set: DefId,
    pub map: DefId,
    pub pair: DefId,
    pub duration: DefId,
    pub data_size: DefId,
    pub regex: DefId,
    pub module_class: DefId,
    pub class_class: DefId,
    pub type_alias_class: DefId,
    pub function_class: DefId,
}

impl Default for Builtins {
    fn default() -> Self {
        Self {
            any: DefId::INVALID,
            object: DefId::INVALID,
            typed: DefId::INVALID,
            dynamic: DefId::INVALID,
            listing: DefId::INVALID,
            mapping: DefId::INVALID,
            string: DefId::INVALID,
            boolean: DefId::INVALID,
            number: DefId::INVALID,
            int: DefId::INVALID,
            float: DefId::INVALID,
            null: DefId::INVALID,
            collection: DefId::INVALID,
            list: DefId::INVALID,
            set: DefId::INVALID,
            map: DefId::INVALID,
            pair: DefId::INVALID,
            duration: DefId::INVALID,
            data_size: DefId::INVALID,
            regex: DefId::INVALID,
            module_class: DefId::INVALID,
            class_class: DefId::INVALID,
            type_alias_class: DefId::INVALID,
            function_class: DefId::INVALID,
        }
    }
}

/// Concurrent definition store.
pub struct DefinitionStore {
    defs: DashMap<DefId, Arc<DefinitionInfo>, FxBuildHasher>,
    next_id: AtomicU32,
    builtins: OnceLock<Builtins>,
}

impl Default for DefinitionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DefinitionStore {
    pub fn new() -> Self {
        Self {
            defs: DashMap::with_hasher(FxBuildHasher),
            // 0 is DefId::INVALID.
            next_id: AtomicU32::new(1),
            builtins: OnceLock::new(),
        }
    }

    pub fn alloc(&self, info: DefinitionInfo) -> DefId {
        let id = DefId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.defs.insert(id, Arc::new(info));
        id
    }

    pub fn lookup(&self, def: DefId) -> Option<Arc<DefinitionInfo>> {
        self.defs.get(&def).map(|d| Arc::clone(&d))
    }

    pub fn name(&self, def: DefId) -> Atom {
        self.lookup(def).map(|d| d.name).unwrap_or(Atom::EMPTY)
    }

    pub fn kind(&self, def: DefId) -> Option<DefKind> {
        self.lookup(def).map(|d| d.kind)
    }

    pub fn supertype(&self, def: DefId) -> Option<TypeId> {
        self.lookup(def).and_then(|d| d.supertype)
    }

    /// Set a definition's supertype after allocation (forward references:
    /// `class A extends B` where `B` lowers later).
    pub fn set_supertype(&self, def: DefId, supertype: TypeId) {
        if let Some(existing) = self.lookup(def) {
            let mut info = (*existing).clone();
            info.supertype = Some(supertype);
            self.defs.insert(def, Arc::new(info));
        }
    }

    /// Set a type alias's body after allocation.
    pub fn set_alias_body(&self, def: DefId, body: TypeId) {
        if let Some(existing) = self.lookup(def) {
            let mut info = (*existing).clone();
            info.alias_body = Some(body);
            self.defs.insert(def, Arc::new(info));
        }
    }

    pub fn builtins(&self) -> Builtins {
        self.builtins.get().copied().unwrap_or_default()
    }

    /// Register the synthetic base library backbone. Idempotent: a second
    /// call returns the already-installed table.
    pub fn install_builtins(&self, types: &TypeInterner, strings: &Interner) -> Builtins {
        *self.builtins.get_or_init(|| {
            let any = self.alloc(
                DefinitionInfo::class(strings.intern("Any"))
                    .with_modifiers(Modifiers::ABSTRACT | Modifiers::EXTERNAL),
            );
            let any_ty = types.class0(any);

            let class = |name: &str, supertype: TypeId, modifiers: Modifiers| {
                self.alloc(
                    DefinitionInfo::class(strings.intern(name))
                        .with_modifiers(modifiers | Modifiers::EXTERNAL)
                        .with_supertype(supertype),
                )
            };
            let external = Modifiers::empty();
            let abstract_ = Modifiers::ABSTRACT;

            let null = class("Null", any_ty, external);
            let string = class("String", any_ty, external);
            let boolean = class("Boolean", any_ty, external);
            let number = class("Number", any_ty, abstract_);
            let number_ty = types.class0(number);
            let int = class("Int", number_ty, external);
            let float = class("Float", number_ty, external);
            let duration = class("Duration", any_ty, external);
            let data_size = class("DataSize", any_ty, external);
            let regex = class("Regex", any_ty, external);
            let module_class = class("Module", any_ty, abstract_);
            let class_class = class("Class", any_ty, external);
            let type_alias_class = class("TypeAlias", any_ty, external);
            let function_class = class("Function", any_ty, abstract_);

            // Object is the root of every amendable type.
            let object = class("Object", any_ty, abstract_);
            let object_ty = types.class0(object);
            let typed = class("Typed", object_ty, abstract_ | Modifiers::OPEN);
            let dynamic = class("Dynamic", object_ty, external);

            let generic1 = |name: &str, param: &str, supertype: TypeId, modifiers: Modifiers| {
                let p = self.alloc(DefinitionInfo::type_param(
                    strings.intern(param),
                    Variance::Covariant,
                ));
                let def = self.alloc(
                    DefinitionInfo::class(strings.intern(name))
                        .with_modifiers(modifiers | Modifiers::EXTERNAL)
                        .with_type_params(vec![p])
                        .with_supertype(supertype),
                );
                (def, p)
            };

            let (listing, _) = generic1("Listing", "Element", object_ty, external);
            let (collection, _) = generic1("Collection", "Element", any_ty, abstract_);
            let collection_of = |types: &TypeInterner, elem: TypeId| {
                types.class(collection, &[elem])
            };
            let (list, list_elem) = generic1("List", "Element", any_ty, external);
            self.set_supertype(list, collection_of(types, types.variable(list_elem)));
            let (set, set_elem) = generic1("Set", "Element", any_ty, external);
            self.set_supertype(set, collection_of(types, types.variable(set_elem)));

            let generic2 = |name: &str, p1: &str, p2: &str, supertype: TypeId| {
                let a = self.alloc(DefinitionInfo::type_param(
                    strings.intern(p1),
                    Variance::Covariant,
                ));
                let b = self.alloc(DefinitionInfo::type_param(
                    strings.intern(p2),
                    Variance::Covariant,
                ));
                self.alloc(
                    DefinitionInfo::class(strings.intern(name))
                        .with_modifiers(Modifiers::EXTERNAL)
                        .with_type_params(vec![a, b])
                        .with_supertype(supertype),
                )
            };
            let mapping = generic2("Mapping", "Key", "Value", object_ty);
            let map = generic2("Map", "Key", "Value", any_ty);
            let pair = generic2("Pair", "First", "Second", any_ty);

            Builtins {
                any,
                object,
                typed,
                dynamic,
                listing,
                mapping,
                string,
                boolean,
                number,
                int,
                float,
                null,
                collection,
                list,
                set,
                map,
                pair,
                duration,
                data_size,
                regex,
                module_class,
                class_class,
                type_alias_class,
                function_class,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_and_lookup() {
        let strings = Interner::new();
        let store = DefinitionStore::new();
        let def = store.alloc(DefinitionInfo::class(strings.intern("Bird")));
        assert!(def.is_valid());
        assert_eq!(store.name(def), strings.intern("Bird"));
        assert_eq!(store.kind(def), Some(DefKind::Class));
        assert!(store.lookup(DefId::INVALID).is_none());
    }

    #[test]
    fn install_builtins_is_idempotent() {
        let strings = Interner::new();
        let types = TypeInterner::new();
        let store = DefinitionStore::new();
        let first = store.install_builtins(&types, &strings);
        let second = store.install_builtins(&types, &strings);
        assert_eq!(first.any, second.any);
        assert_eq!(first.listing, second.listing);
        assert!(first.string.is_valid());
    }

    #[test]
    fn builtin_chain_roots_at_any() {
        let strings = Interner::new();
        let types = TypeInterner::new();
        let store = DefinitionStore::new();
        let b = store.install_builtins(&types, &strings);
        // Int -> Number -> Any
        let number_ty = store.supertype(b.int).unwrap();
        assert_eq!(types.lookup(number_ty), Some(crate::types::TypeData::Class {
            def: b.number,
            args: crate::types::TypeListId::EMPTY,
        }));
        let any_ty = store.supertype(b.number).unwrap();
        assert_eq!(any_ty, types.class0(b.any));
        assert!(store.supertype(b.any).is_none());
    }
}
