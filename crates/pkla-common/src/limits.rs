//! Centralized limits and thresholds for the semantic engine.
//!
//! This module provides shared constants for recursion depths, operation
//! counts, and capacity limits used throughout the codebase. Centralizing
//! these values:
//! - Prevents duplicate definitions with inconsistent values
//! - Makes it easy to tune limits in one place
//! - Documents the rationale for each limit
//!
//! Every recursive or iterative semantic computation must be bounded by one
//! of these constants. Queries never abort the process when a limit is hit;
//! they return a safe default (`Unknown` type, empty result) instead.

// =============================================================================
// Recursion Depth Limits
// =============================================================================
// These prevent stack overflow in deeply nested type structures.

/// Maximum depth for subtype checking.
///
/// Prevents unbounded recursion when comparing recursive types. A visited
/// pair set handles genuine cycles; the depth cap handles legitimately deep
/// structural comparison before a cycle is found.
///
/// # Pkl example
///
/// ```pkl
/// class Node { next: Node? }
/// // checking `Node?` against `Node?` recurses through `next` until the
/// // (Node?, Node?) pair repeats
/// ```
pub const MAX_SUBTYPE_DEPTH: u32 = 100;

/// Maximum depth for type alias unfolding.
///
/// Alias chains are transparently unfolded on both sides of a subtype check.
/// A self-referential alias (`typealias Loop = Loop`) is a user error that
/// must surface as a diagnostic, not a hang: once this depth is hit the
/// alias is treated as `unknown`.
pub const MAX_ALIAS_RESOLUTION_DEPTH: u32 = 128;

/// Maximum depth for generic type substitution.
///
/// Substituting type arguments into a recursive generic type can expand
/// indefinitely (`class Foo<T> { next: Foo<Foo<T>> }`). Substitution stops
/// and returns the unsubstituted type when this depth is exceeded.
pub const MAX_INSTANTIATION_DEPTH: u32 = 50;

/// Maximum depth for this-type computation through nested object bodies.
///
/// The apparent type of `this` inside an object literal is computed
/// bottom-up through every enclosing object body. Bodies nest arbitrarily
/// but finitely in real documents; the cap turns a pathological or cyclic
/// amendment chain into `unknown`.
pub const MAX_THIS_TYPE_DEPTH: u32 = 64;

/// Maximum depth for expression type computation.
///
/// Each nested expression adds a frame; at 500 levels the checker returns
/// `unknown` for the remaining subtree.
pub const MAX_EXPR_TYPE_DEPTH: u32 = 500;

/// Maximum length of a module supertype (extends/amends) chain walk.
///
/// A cycle in the supermodule chain is a user error diagnosed by the
/// binder's visited set; the cap additionally bounds legitimate chains.
pub const MAX_SUPERMODULE_CHAIN: u32 = 128;

/// Maximum length of a class inheritance chain walk.
pub const MAX_SUPERCLASS_CHAIN: u32 = 128;

// =============================================================================
// Operation Count Limits
// =============================================================================
// These prevent infinite loops in iterative algorithms.

/// Maximum iterations for upward scope walks.
///
/// The resolver walks from a position up through enclosing object bodies,
/// classes, modules, imports and supermodules. The walk is linear in
/// nesting depth for well-formed trees; the cap is a safety valve against
/// corrupted parent links.
pub const MAX_SCOPE_WALK_ITERATIONS: u32 = 10_000;

/// Maximum modules produced by one glob-import expansion.
///
/// Glob URIs (`import* "*.pkl"`) can match arbitrarily many modules. The
/// expansion is truncated at this count and a warning diagnostic is
/// reported, preventing runaway CPU/memory on pathological patterns.
pub const MAX_GLOB_EXPANSION: usize = 10_000;

/// Maximum constraint expressions evaluated per type check.
///
/// Bounds total work when a union of constrained types is checked against
/// a union-typed candidate.
pub const MAX_CONSTRAINT_EVALUATIONS: u32 = 10_000;

// =============================================================================
// Capacity/Size Limits
// =============================================================================

/// Inline capacity for type lists (union members, type arguments).
///
/// Type lists backed by `SmallVec<[TypeId; 8]>` hold up to 8 elements
/// without heap allocation. Most unions and argument lists in real Pkl
/// code have fewer than 8 members.
pub const TYPE_LIST_INLINE: usize = 8;

/// Maximum union members to show in diagnostic messages.
///
/// Larger unions are elided with `|...` to keep messages readable.
pub const UNION_MEMBER_DIAGNOSTIC_LIMIT: usize = 6;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_depth_exceeds_subtype_depth() {
        // Alias unfolding happens inside subtype checks; the alias cap must
        // not be the binding constraint for ordinary chains.
        assert!(MAX_ALIAS_RESOLUTION_DEPTH >= MAX_SUBTYPE_DEPTH);
    }
}
