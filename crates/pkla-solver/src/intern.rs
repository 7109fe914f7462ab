//! Type interning.
//!
//! One `TypeId` per distinct [`TypeData`]: equality is integer comparison,
//! and construction is where union normalization happens. The interner is
//! concurrent — forward maps are sharded (`DashMap`), reverse tables are
//! append-only behind an `RwLock` — because the hosting IDE issues type
//! queries from several threads at once.

use crate::constraint::ConstraintInfo;
use crate::def::DefId;
use crate::types::{ConstraintId, ConstraintListId, TypeData, TypeId, TypeListId};
use dashmap::DashMap;
use pkla_common::limits::TYPE_LIST_INLINE;
use pkla_common::Atom;
use rustc_hash::{FxBuildHasher, FxHashSet};
use smallvec::SmallVec;
use std::sync::{Arc, RwLock};

pub struct TypeInterner {
    map: DashMap<TypeData, TypeId, FxBuildHasher>,
    table: RwLock<Vec<TypeData>>,
    lists: DashMap<Arc<[TypeId]>, TypeListId, FxBuildHasher>,
    list_table: RwLock<Vec<Arc<[TypeId]>>>,
    constraints: DashMap<Arc<ConstraintInfo>, ConstraintId, FxBuildHasher>,
    constraint_table: RwLock<Vec<Arc<ConstraintInfo>>>,
    constraint_lists: DashMap<Arc<[ConstraintId]>, ConstraintListId, FxBuildHasher>,
    constraint_list_table: RwLock<Vec<Arc<[ConstraintId]>>>,
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeInterner {
    pub fn new() -> Self {
        let interner = Self {
            map: DashMap::with_hasher(FxBuildHasher),
            table: RwLock::new(Vec::new()),
            lists: DashMap::with_hasher(FxBuildHasher),
            list_table: RwLock::new(Vec::new()),
            constraints: DashMap::with_hasher(FxBuildHasher),
            constraint_table: RwLock::new(Vec::new()),
            constraint_lists: DashMap::with_hasher(FxBuildHasher),
            constraint_list_table: RwLock::new(Vec::new()),
        };
        // Pre-register the sentinels so TypeId::UNKNOWN / TypeId::NOTHING
        // and the empty lists are stable constants.
        let unknown = interner.intern(TypeData::Unknown);
        let nothing = interner.intern(TypeData::Nothing);
        debug_assert_eq!(unknown, TypeId::UNKNOWN);
        debug_assert_eq!(nothing, TypeId::NOTHING);
        let empty_list = interner.intern_list(&[]);
        debug_assert_eq!(empty_list, TypeListId::EMPTY);
        let empty_constraints = interner.intern_constraint_list(&[]);
        debug_assert_eq!(empty_constraints, ConstraintListId::EMPTY);
        interner
    }

    pub fn intern(&self, data: TypeData) -> TypeId {
        if let Some(existing) = self.map.get(&data) {
            return *existing;
        }
        let mut table = self.table.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = self.map.get(&data) {
            return *existing;
        }
        let id = TypeId(table.len() as u32);
        table.push(data.clone());
        self.map.insert(data, id);
        id
    }

    /// Structural data behind `id`; `None` for ids this interner never
    /// produced (dangling input is the caller's safe-default path).
    pub fn lookup(&self, id: TypeId) -> Option<TypeData> {
        let table = self.table.read().unwrap_or_else(|e| e.into_inner());
        table.get(id.0 as usize).cloned()
    }

    pub fn intern_list(&self, members: &[TypeId]) -> TypeListId {
        let key: Arc<[TypeId]> = Arc::from(members);
        if let Some(existing) = self.lists.get(&key) {
            return *existing;
        }
        let mut table = self.list_table.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = self.lists.get(&key) {
            return *existing;
        }
        let id = TypeListId(table.len() as u32);
        table.push(Arc::clone(&key));
        self.lists.insert(key, id);
        id
    }

    pub fn type_list(&self, id: TypeListId) -> Arc<[TypeId]> {
        let table = self.list_table.read().unwrap_or_else(|e| e.into_inner());
        table
            .get(id.0 as usize)
            .cloned()
            .unwrap_or_else(|| Arc::from(&[] as &[TypeId]))
    }

    pub fn intern_constraint(&self, info: ConstraintInfo) -> ConstraintId {
        let key = Arc::new(info);
        if let Some(existing) = self.constraints.get(&key) {
            return *existing;
        }
        let mut table = self
            .constraint_table
            .write()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = self.constraints.get(&key) {
            return *existing;
        }
        let id = ConstraintId(table.len() as u32);
        table.push(Arc::clone(&key));
        self.constraints.insert(key, id);
        id
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<Arc<ConstraintInfo>> {
        let table = self
            .constraint_table
            .read()
            .unwrap_or_else(|e| e.into_inner());
        table.get(id.0 as usize).cloned()
    }

    pub fn intern_constraint_list(&self, constraints: &[ConstraintId]) -> ConstraintListId {
        let key: Arc<[ConstraintId]> = Arc::from(constraints);
        if let Some(existing) = self.constraint_lists.get(&key) {
            return *existing;
        }
        let mut table = self
            .constraint_list_table
            .write()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = self.constraint_lists.get(&key) {
            return *existing;
        }
        let id = ConstraintListId(table.len() as u32);
        table.push(Arc::clone(&key));
        self.constraint_lists.insert(key, id);
        id
    }

    pub fn constraint_list(&self, id: ConstraintListId) -> Arc<[ConstraintId]> {
        let table = self
            .constraint_list_table
            .read()
            .unwrap_or_else(|e| e.into_inner());
        table
            .get(id.0 as usize)
            .cloned()
            .unwrap_or_else(|| Arc::from(&[] as &[ConstraintId]))
    }

    // -------------------------------------------------------------------------
    // Constructors
    // -------------------------------------------------------------------------

    pub fn class(&self, def: DefId, args: &[TypeId]) -> TypeId {
        self.intern(TypeData::Class {
            def,
            args: self.intern_list(args),
        })
    }

    /// Class type without type arguments.
    pub fn class0(&self, def: DefId) -> TypeId {
        self.class(def, &[])
    }

    pub fn module(&self, def: DefId) -> TypeId {
        self.intern(TypeData::Module { def })
    }

    pub fn alias(&self, def: DefId, args: &[TypeId]) -> TypeId {
        self.intern(TypeData::Alias {
            def,
            args: self.intern_list(args),
        })
    }

    pub fn variable(&self, def: DefId) -> TypeId {
        self.intern(TypeData::Variable { def })
    }

    pub fn string_literal(&self, value: Atom) -> TypeId {
        self.intern(TypeData::StringLiteral { value })
    }

    pub fn function(&self, params: &[TypeId], ret: TypeId) -> TypeId {
        self.intern(TypeData::Function {
            params: self.intern_list(params),
            ret,
        })
    }

    pub fn constrained(&self, base: TypeId, constraints: &[ConstraintId]) -> TypeId {
        if constraints.is_empty() {
            return base;
        }
        self.intern(TypeData::Constrained {
            base,
            constraints: self.intern_constraint_list(constraints),
        })
    }

    /// Build a union, normalizing at construction:
    ///
    /// - nested unions are flattened
    /// - `nothing` members are dropped
    /// - a `unknown` member collapses the whole union to `unknown`
    /// - duplicates are removed, first occurrence order preserved
    /// - an empty result is `nothing`, a singleton is the member itself
    pub fn union(&self, members: Vec<TypeId>) -> TypeId {
        // Most unions in real Pkl stay within the inline capacity.
        let mut flat: SmallVec<[TypeId; TYPE_LIST_INLINE]> = SmallVec::new();
        let mut worklist: Vec<TypeId> = members;
        worklist.reverse();
        let mut seen: FxHashSet<TypeId> = FxHashSet::default();
        while let Some(member) = worklist.pop() {
            if member == TypeId::UNKNOWN {
                return TypeId::UNKNOWN;
            }
            if member == TypeId::NOTHING {
                continue;
            }
            match self.lookup(member) {
                Some(TypeData::Union { members }) => {
                    let nested = self.type_list(members);
                    for &m in nested.iter().rev() {
                        worklist.push(m);
                    }
                }
                _ => {
                    if seen.insert(member) {
                        flat.push(member);
                    }
                }
            }
        }
        match flat.len() {
            0 => TypeId::NOTHING,
            1 => flat[0],
            _ => self.intern(TypeData::Union {
                members: self.intern_list(&flat),
            }),
        }
    }

    pub fn union2(&self, a: TypeId, b: TypeId) -> TypeId {
        self.union(vec![a, b])
    }

    /// Number of interned types (diagnostic/metric use).
    pub fn len(&self) -> usize {
        self.table.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
