//! Structural and nominal subtyping.
//!
//! Rules, in precedence order:
//!
//! - `nothing <: T` and `T <: unknown` for every `T`
//! - aliases are transparently unfolded on both sides
//! - `Constrained(base, cs) <: T` reduces to `base <: T`; in the other
//!   direction `T <: Constrained(base, cs)` requires `T <: base` *and*
//!   that no constraint is statically provably false for `T`'s inhabitants
//! - `Union(ms) <: T` iff every member is; `T <: Union(ms)` iff some
//!   member admits `T`
//! - class subtyping follows the single-inheritance chain with
//!   type-argument comparison per declared variance (invariant unless the
//!   parameter says `in`/`out`)
//! - modules follow their supermodule chain, terminating in the builtin
//!   `Module` class
//! - functions are contravariant in parameters, covariant in return
//!
//! All queries are total: dangling definitions compare as `false`, cycles
//! resolve coinductively (a pair already in flight is assumed to hold),
//! and depth is bounded by `MAX_SUBTYPE_DEPTH`.

use crate::constraint::{evaluate_constraint, ConstValue, ConstraintVerdict};
use crate::db::TypeDatabase;
use crate::recursion::{RecursionGuard, RecursionProfile, RecursionResult};
use crate::substitute::{bindings_for, substitute};
use crate::types::{ConstraintListId, TypeData, TypeId, TypeListId};
use pkla_common::limits::{MAX_ALIAS_RESOLUTION_DEPTH, MAX_SUPERCLASS_CHAIN};
use pkla_syntax::Variance;
use tracing::trace;

/// One-shot subtype query.
pub fn is_subtype_of(db: TypeDatabase<'_>, a: TypeId, b: TypeId) -> bool {
    SubtypeChecker::new(db).check(a, b)
}

pub struct SubtypeChecker<'a> {
    db: TypeDatabase<'a>,
    guard: RecursionGuard<(TypeId, TypeId)>,
    alias_depth: u32,
}

impl<'a> SubtypeChecker<'a> {
    pub fn new(db: TypeDatabase<'a>) -> Self {
        Self {
            db,
            guard: RecursionGuard::with_profile(RecursionProfile::SubtypeCheck),
            alias_depth: 0,
        }
    }

    /// `true` iff `a <: b`.
    pub fn check(&mut self, a: TypeId, b: TypeId) -> bool {
        if a == b {
            return true;
        }
        if a == TypeId::NOTHING || b == TypeId::UNKNOWN {
            return true;
        }
        if a == TypeId::UNKNOWN || b == TypeId::NOTHING {
            return false;
        }
        match self.guard.enter((a, b)) {
            RecursionResult::Entered => {}
            // A pair already in flight: recursive types compare
            // coinductively, so assume the relation holds.
            RecursionResult::CycleDetected => return true,
            RecursionResult::LimitExceeded => return false,
        }
        let result = self.check_inner(a, b);
        self.guard.leave((a, b));
        trace!(a = a.0, b = b.0, result, "subtype");
        result
    }

    fn check_inner(&mut self, a: TypeId, b: TypeId) -> bool {
        let Some(da) = self.db.lookup(a) else {
            return false;
        };
        let Some(db_) = self.db.lookup(b) else {
            return false;
        };

        // Aliases are transparent on both sides.
        if matches!(da, TypeData::Alias { .. }) {
            return match self.unfold(a) {
                Some(unfolded) => self.check(unfolded, b),
                None => false,
            };
        }
        if matches!(db_, TypeData::Alias { .. }) {
            return match self.unfold(b) {
                Some(unfolded) => self.check(a, unfolded),
                None => false,
            };
        }

        // Constraints never widen the left side's nominal relation.
        if let TypeData::Constrained { base, .. } = da {
            return self.check(base, b);
        }

        // Union decomposition. Left before right so union-vs-union reduces
        // member-wise.
        if let TypeData::Union { members } = da {
            let members = self.db.types.type_list(members);
            return members.iter().all(|&m| self.check(m, b));
        }
        if let TypeData::Union { members } = db_ {
            let members = self.db.types.type_list(members);
            return members.iter().any(|&m| self.check(a, m));
        }

        if let TypeData::Constrained { base, constraints } = db_ {
            return self.check(a, base) && !self.constraints_provably_violated(a, constraints);
        }

        // `Any` sits atop the nominal lattice: every value is an `Any`.
        if let TypeData::Class { def, .. } = db_ {
            if def == self.db.builtins().any && def.is_valid() {
                return true;
            }
        }

        match (da, db_) {
            (TypeData::Class { def: d1, args: a1 }, TypeData::Class { def: d2, args: a2 }) => {
                self.class_subtype(d1, a1, d2, a2)
            }
            (TypeData::StringLiteral { .. }, TypeData::Class { def, args }) => {
                self.class_subtype(self.db.builtins().string, TypeListId::EMPTY, def, args)
            }
            (TypeData::Module { def: m }, TypeData::Module { .. }) => {
                self.module_chain_reaches(m, b)
            }
            (TypeData::Module { def: m }, TypeData::Class { def: d2, args: a2 }) => {
                self.module_as_class(m, d2, a2)
            }
            (TypeData::Function { .. }, TypeData::Class { def, args }) => self.class_subtype(
                self.db.builtins().function_class,
                TypeListId::EMPTY,
                def,
                args,
            ),
            (
                TypeData::Function {
                    params: p1,
                    ret: r1,
                },
                TypeData::Function {
                    params: p2,
                    ret: r2,
                },
            ) => {
                let p1 = self.db.types.type_list(p1);
                let p2 = self.db.types.type_list(p2);
                p1.len() == p2.len()
                    && p2.iter().zip(p1.iter()).all(|(&x, &y)| self.check(x, y))
                    && self.check(r1, r2)
            }
            _ => false,
        }
    }

    fn unfold(&mut self, ty: TypeId) -> Option<TypeId> {
        if self.alias_depth >= MAX_ALIAS_RESOLUTION_DEPTH {
            return None;
        }
        self.alias_depth += 1;
        let result = self.db.unfold_alias(ty);
        self.alias_depth -= 1;
        result
    }

    /// Nominal class chain walk with variance-aware argument comparison.
    fn class_subtype(
        &mut self,
        d1: crate::def::DefId,
        args1: TypeListId,
        d2: crate::def::DefId,
        args2: TypeListId,
    ) -> bool {
        if !d1.is_valid() || !d2.is_valid() {
            return false;
        }
        let mut current_def = d1;
        let mut current_args: Vec<TypeId> = self.db.types.type_list(args1).to_vec();
        for _ in 0..MAX_SUPERCLASS_CHAIN {
            if current_def == d2 {
                return self.check_type_arguments(d2, &current_args, args2);
            }
            let Some(info) = self.db.defs.lookup(current_def) else {
                return false;
            };
            let Some(supertype) = info.supertype else {
                return false;
            };
            let bindings = bindings_for(&info.type_params, &current_args);
            let substituted = substitute(self.db, supertype, &bindings);
            match self.db.lookup(substituted) {
                Some(TypeData::Class { def, args }) => {
                    current_def = def;
                    current_args = self.db.types.type_list(args).to_vec();
                }
                _ => return false,
            }
        }
        false
    }

    fn check_type_arguments(
        &mut self,
        def: crate::def::DefId,
        args1: &[TypeId],
        args2: TypeListId,
    ) -> bool {
        let args2 = self.db.types.type_list(args2);
        let params = self
            .db
            .defs
            .lookup(def)
            .map(|d| d.type_params.clone())
            .unwrap_or_default();
        params.iter().enumerate().all(|(i, &param)| {
            let x = args1.get(i).copied().unwrap_or(TypeId::UNKNOWN);
            let y = args2.get(i).copied().unwrap_or(TypeId::UNKNOWN);
            if x == y {
                return true;
            }
            let variance = self
                .db
                .defs
                .lookup(param)
                .map(|p| p.variance)
                .unwrap_or(Variance::Invariant);
            match variance {
                Variance::Covariant => self.check(x, y),
                Variance::Contravariant => self.check(y, x),
                Variance::Invariant => self.check(x, y) && self.check(y, x),
            }
        })
    }

    /// Walk a module definition's supermodule chain looking for the exact
    /// module type `target`.
    fn module_chain_reaches(&mut self, def: crate::def::DefId, target: TypeId) -> bool {
        let mut current = def;
        for _ in 0..MAX_SUPERCLASS_CHAIN {
            let Some(supertype) = self.db.defs.supertype(current) else {
                return false;
            };
            if supertype == target {
                return true;
            }
            match self.db.lookup(supertype) {
                Some(TypeData::Module { def }) => current = def,
                _ => return false,
            }
        }
        false
    }

    /// A module viewed as a class: follow its supermodule chain to the
    /// first class type (the builtin `Module` class when none is declared).
    fn module_as_class(
        &mut self,
        def: crate::def::DefId,
        d2: crate::def::DefId,
        args2: TypeListId,
    ) -> bool {
        let mut current = def;
        for _ in 0..MAX_SUPERCLASS_CHAIN {
            match self.db.defs.supertype(current) {
                Some(supertype) => match self.db.lookup(supertype) {
                    Some(TypeData::Module { def }) => current = def,
                    Some(TypeData::Class { def, args }) => {
                        return self.class_subtype(def, args, d2, args2);
                    }
                    _ => return false,
                },
                None => {
                    return self.class_subtype(
                        self.db.builtins().module_class,
                        TypeListId::EMPTY,
                        d2,
                        args2,
                    );
                }
            }
        }
        false
    }

    /// Whether some constraint in `constraints` is provably false for all
    /// inhabitants of `a`. Only singleton types produce a usable candidate;
    /// everything else evaluates as opaque (undecidable ⇒ allowed).
    fn constraints_provably_violated(&self, a: TypeId, constraints: ConstraintListId) -> bool {
        let candidate = match self.db.lookup(a) {
            Some(TypeData::StringLiteral { value }) => {
                ConstValue::String(self.db.strings.resolve(value))
            }
            _ => ConstValue::Opaque,
        };
        let list = self.db.types.constraint_list(constraints);
        list.iter().any(|&c| {
            self.db.types.constraint(c).is_some_and(|info| {
                evaluate_constraint(&info.expr, &candidate, self.db.strings)
                    == ConstraintVerdict::Violated
            })
        })
    }
}

/// Whether some non-`nothing` type inhabits both `a` and `b`.
///
/// Drives the hard-error/weak-warning split for type mismatches: a mismatch
/// with a common subtype can still succeed after a runtime narrowing.
pub fn has_common_subtype_with(db: TypeDatabase<'_>, a: TypeId, b: TypeId) -> bool {
    overlap(db, a, b, 0)
}

fn overlap(db: TypeDatabase<'_>, a: TypeId, b: TypeId, depth: u32) -> bool {
    if depth > pkla_common::limits::MAX_SUBTYPE_DEPTH {
        return false;
    }
    if a == TypeId::NOTHING || b == TypeId::NOTHING {
        return false;
    }
    if a == TypeId::UNKNOWN || b == TypeId::UNKNOWN {
        return true;
    }
    if is_subtype_of(db, a, b) || is_subtype_of(db, b, a) {
        return true;
    }
    let unfold = |ty: TypeId| match db.lookup(ty) {
        Some(TypeData::Alias { .. }) => db.unfold_alias(ty),
        Some(TypeData::Constrained { base, .. }) => Some(base),
        _ => None,
    };
    if let Some(ua) = unfold(a) {
        if ua != a {
            return overlap(db, ua, b, depth + 1);
        }
    }
    if let Some(ub) = unfold(b) {
        if ub != b {
            return overlap(db, a, ub, depth + 1);
        }
    }
    let members_of = |ty: TypeId| match db.lookup(ty) {
        Some(TypeData::Union { members }) => Some(db.types.type_list(members)),
        _ => None,
    };
    if let Some(members) = members_of(a) {
        return members.iter().any(|&m| overlap(db, m, b, depth + 1));
    }
    if let Some(members) = members_of(b) {
        return members.iter().any(|&m| overlap(db, a, m, depth + 1));
    }
    // Remaining shapes are nominal leaves: with single inheritance a common
    // subclass would make one side a subtype of the other, which was
    // already ruled out.
    false
}
