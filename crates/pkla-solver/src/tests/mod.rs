//! Solver unit tests.

mod format_tests;

use crate::constraint::{CompareOp, ConstLiteral, ConstraintExpr, ConstraintInfo};
use crate::db::TypeDatabase;
use crate::def::{Builtins, DefId, DefinitionInfo, DefinitionStore};
use crate::intern::TypeInterner;
use crate::types::{ConstraintId, TypeId};
use pkla_common::Interner;
use pkla_syntax::{Modifiers, Variance};

/// Interner + store with builtins installed, shared by the test modules.
pub(crate) struct Fixture {
    pub strings: Interner,
    pub types: TypeInterner,
    pub defs: DefinitionStore,
    pub builtins: Builtins,
}

impl Fixture {
    pub fn new() -> Self {
        let strings = Interner::new();
        let types = TypeInterner::new();
        let defs = DefinitionStore::new();
        let builtins = defs.install_builtins(&types, &strings);
        Self {
            strings,
            types,
            defs,
            builtins,
        }
    }

    pub fn db(&self) -> TypeDatabase<'_> {
        TypeDatabase::new(&self.types, &self.defs, &self.strings)
    }

    /// User class extending the given supertype.
    pub fn class_def(&self, name: &str, supertype: TypeId) -> DefId {
        self.defs.alloc(
            DefinitionInfo::class(self.strings.intern(name)).with_supertype(supertype),
        )
    }

    pub fn abstract_class_def(&self, name: &str, supertype: TypeId) -> DefId {
        self.defs.alloc(
            DefinitionInfo::class(self.strings.intern(name))
                .with_modifiers(Modifiers::ABSTRACT)
                .with_supertype(supertype),
        )
    }

    /// Generic class `name<P>` with the parameter's declared variance.
    pub fn generic_class_def(
        &self,
        name: &str,
        param: &str,
        variance: Variance,
        supertype: TypeId,
    ) -> (DefId, DefId) {
        let p = self
            .defs
            .alloc(DefinitionInfo::type_param(self.strings.intern(param), variance));
        let def = self.defs.alloc(
            DefinitionInfo::class(self.strings.intern(name))
                .with_type_params(vec![p])
                .with_supertype(supertype),
        );
        (def, p)
    }

    pub fn typed_type(&self) -> TypeId {
        self.types.class0(self.builtins.typed)
    }

    pub fn lit(&self, value: &str) -> TypeId {
        self.types.string_literal(self.strings.intern(value))
    }

    /// `length > n` constraint, as the checker would lower it.
    pub fn length_gt(&self, n: i64) -> ConstraintId {
        let expr = ConstraintExpr::Compare {
            op: CompareOp::Gt,
            lhs: Box::new(ConstraintExpr::Property {
                receiver: Box::new(ConstraintExpr::Candidate),
                name: self.strings.intern("length"),
            }),
            rhs: Box::new(ConstraintExpr::Literal(ConstLiteral::Int(n))),
        };
        self.types.intern_constraint(ConstraintInfo {
            expr,
            source: self.strings.intern(&format!("length > {n}")),
        })
    }
}
