//! Generic argument inference.
//!
//! When a call supplies no explicit type arguments, each parameter's
//! declared (possibly generic) type is unified against the corresponding
//! argument's computed type, building a bindings map. Unification recurses
//! into nested type arguments; a variadic trailing parameter first unions
//! all excess argument types, then unifies once. Conflicting bindings
//! union (the call site's join), so inference is total.

use crate::analyzer::{Analyzer, Ctx};
use pkla_common::limits::MAX_INSTANTIATION_DEPTH;
use pkla_solver::{DefId, TypeData, TypeId, TypeParameterBindings};
use pkla_syntax::{MethodDecl, NodeData};
use rustc_hash::FxHashSet;

impl Analyzer {
    /// Unify a method's declared parameter types against actual argument
    /// types, extending `bindings` with the method's own type parameters.
    pub(crate) fn infer_call_bindings(
        &self,
        method_module: pkla_binder::ModuleId,
        method: &MethodDecl,
        arg_types: &[TypeId],
        ctx: Ctx,
        bindings: &mut TypeParameterBindings,
    ) {
        let Some(tree) = self.graph.tree(method_module) else {
            return;
        };
        let inferable: FxHashSet<DefId> = method
            .type_params
            .iter()
            .map(|&tp| self.lower_def(method_module, tp, ctx))
            .filter(|d| d.is_valid() && !bindings.contains_key(d))
            .collect();
        if inferable.is_empty() {
            return;
        }
        let declared: Vec<TypeId> = method
            .params
            .iter()
            .map(|&p| match tree.data(p) {
                NodeData::Param(param) => param
                    .type_ann
                    .map(|ann| self.lower_type_node(method_module, ann, ctx))
                    .unwrap_or(TypeId::UNKNOWN),
                _ => TypeId::UNKNOWN,
            })
            .collect();

        let fixed = if method.variadic {
            declared.len().saturating_sub(1)
        } else {
            declared.len()
        };
        for (i, &decl_ty) in declared.iter().take(fixed).enumerate() {
            if let Some(&actual) = arg_types.get(i) {
                self.unify(decl_ty, actual, &inferable, bindings, 0);
            }
        }
        if method.variadic {
            if let Some(&tail_ty) = declared.last() {
                let excess: Vec<TypeId> = arg_types.iter().skip(fixed).copied().collect();
                if !excess.is_empty() {
                    let joined = self.db().union(excess);
                    self.unify(tail_ty, joined, &inferable, bindings, 0);
                }
            }
        }
    }

    fn unify(
        &self,
        declared: TypeId,
        actual: TypeId,
        inferable: &FxHashSet<DefId>,
        bindings: &mut TypeParameterBindings,
        depth: u32,
    ) {
        if depth > MAX_INSTANTIATION_DEPTH || actual == TypeId::UNKNOWN {
            return;
        }
        let db = self.db();
        let Some(decl_data) = db.lookup(declared) else {
            return;
        };
        match decl_data {
            TypeData::Variable { def } if inferable.contains(&def) => {
                let entry = bindings.entry(def).or_insert(TypeId::NOTHING);
                *entry = db.union2(*entry, actual);
            }
            TypeData::Class {
                def: decl_def,
                args: decl_args,
            } => {
                // Find the declared class in the actual type's chain and
                // unify the argument lists position-wise.
                let decl_args = self.types.type_list(decl_args);
                let param_count = self
                    .defs
                    .lookup(decl_def)
                    .map(|d| d.type_params.len())
                    .unwrap_or(0);
                for (i, &decl_arg) in decl_args.iter().enumerate().take(param_count) {
                    if let Some(actual_arg) = db.generic_argument(actual, decl_def, i) {
                        self.unify(decl_arg, actual_arg, inferable, bindings, depth + 1);
                    }
                }
            }
            TypeData::Alias { .. } => {
                if let Some(unfolded) = db.unfold_alias(declared) {
                    if unfolded != declared {
                        self.unify(unfolded, actual, inferable, bindings, depth + 1);
                    }
                }
            }
            TypeData::Union { members } => {
                let members = self.types.type_list(members);
                // The nullable-parameter idiom `T?`: match the non-null
                // parts against the argument's non-null part.
                let null = db.null_type();
                let non_null_members: Vec<TypeId> =
                    members.iter().copied().filter(|&m| m != null).collect();
                if non_null_members.len() == 1 && non_null_members.len() < members.len() {
                    self.unify(
                        non_null_members[0],
                        db.non_null(actual),
                        inferable,
                        bindings,
                        depth + 1,
                    );
                }
            }
            TypeData::Function {
                params: decl_params,
                ret: decl_ret,
            } => {
                if let Some(TypeData::Function {
                    params: actual_params,
                    ret: actual_ret,
                }) = db.lookup(actual)
                {
                    let decl_params = self.types.type_list(decl_params);
                    let actual_params = self.types.type_list(actual_params);
                    for (&d, &a) in decl_params.iter().zip(actual_params.iter()) {
                        self.unify(d, a, inferable, bindings, depth + 1);
                    }
                    self.unify(decl_ret, actual_ret, inferable, bindings, depth + 1);
                }
            }
            TypeData::Constrained { base, .. } => {
                self.unify(base, actual, inferable, bindings, depth + 1);
            }
            _ => {}
        }
    }
}
