//! Interned type representation.

use crate::def::DefId;
use pkla_common::Atom;

/// Interned type handle.
///
/// Equality of `TypeId`s is equality of the underlying structural
/// representation: the interner guarantees one id per distinct [`TypeData`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    /// The top type: every type is a subtype of `unknown`.
    pub const UNKNOWN: Self = Self(0);
    /// The bottom type: `nothing` is a subtype of every type.
    pub const NOTHING: Self = Self(1);
}

/// Interned list of types (union members, type arguments, parameters).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeListId(pub u32);

impl TypeListId {
    pub const EMPTY: Self = Self(0);
}

/// Interned refinement constraint (expression + source text).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConstraintId(pub u32);

/// Interned list of constraints attached to one `Constrained` type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConstraintListId(pub u32);

impl ConstraintListId {
    pub const EMPTY: Self = Self(0);
}

/// The structural representation behind a [`TypeId`].
///
/// Pure data: never mutated after interning. Two `TypeData` denote the same
/// set of inhabitants iff structurally equal after alias-unfolding and
/// union-flattening; union flattening happens at construction
/// ([`TypeInterner::union`](crate::intern::TypeInterner::union)), alias
/// unfolding inside the subtype checker.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeData {
    /// Top.
    Unknown,
    /// Bottom.
    Nothing,
    /// Nominal class type with type arguments matching the declaration's
    /// type parameters.
    Class { def: DefId, args: TypeListId },
    /// The singleton type of one specific module.
    Module { def: DefId },
    /// Type alias reference. Must be unfolded to inspect structure.
    Alias { def: DefId, args: TypeListId },
    /// Flattened, deduplicated union. Never nested, never empty, never a
    /// single member (the interner normalizes those away).
    Union { members: TypeListId },
    /// Reference to a generic type parameter; resolved through a bindings
    /// map during substitution.
    Variable { def: DefId },
    /// Singleton type of one literal string.
    StringLiteral { value: Atom },
    /// Function type `(params) -> ret`.
    Function { params: TypeListId, ret: TypeId },
    /// `base` narrowed by boolean constraints over candidate values.
    Constrained {
        base: TypeId,
        constraints: ConstraintListId,
    },
}
