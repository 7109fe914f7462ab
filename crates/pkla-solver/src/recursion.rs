//! Unified recursion guard for cycle detection, depth limiting and
//! iteration bounding in recursive type computations.
//!
//! Subtype checking, this-type computation and expression inference are all
//! mutually recursive over a declaration graph the user controls; each of
//! them combines three safety mechanisms through this guard:
//!
//! 1. **Cycle detection** via a visiting set
//! 2. **Depth limiting** to prevent stack overflow
//! 3. **Iteration bounding** to prevent infinite loops
//!
//! Profiles name the limit pairs so call sites say what they are guarding
//! rather than repeating magic numbers.

use pkla_common::limits;
use rustc_hash::FxHashSet;
use std::hash::Hash;

/// Named recursion limit presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecursionProfile {
    /// Structural subtype comparison of recursive types.
    SubtypeCheck,
    /// This-type computation through nested object bodies.
    ThisType,
    /// Expression type computation.
    ExprType,
    /// Constraint partial evaluation over union alternatives.
    ConstraintEval,
    /// One-off or test scenarios.
    Custom { max_depth: u32, max_iterations: u32 },
}

impl RecursionProfile {
    pub const fn max_depth(self) -> u32 {
        match self {
            Self::SubtypeCheck => limits::MAX_SUBTYPE_DEPTH,
            Self::ThisType => limits::MAX_THIS_TYPE_DEPTH,
            Self::ExprType => limits::MAX_EXPR_TYPE_DEPTH,
            Self::ConstraintEval => limits::MAX_SUBTYPE_DEPTH,
            Self::Custom { max_depth, .. } => max_depth,
        }
    }

    pub const fn max_iterations(self) -> u32 {
        match self {
            Self::SubtypeCheck
            | Self::ThisType
            | Self::ExprType => 100_000,
            Self::ConstraintEval => limits::MAX_CONSTRAINT_EVALUATIONS,
            Self::Custom { max_iterations, .. } => max_iterations,
        }
    }
}

/// Result of attempting to enter a recursive computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecursionResult {
    /// Proceed with the computation.
    Entered,
    /// The key is already being visited: a cycle.
    CycleDetected,
    /// Depth or iteration limit exceeded.
    LimitExceeded,
}

#[derive(Debug)]
pub struct RecursionGuard<K> {
    visiting: FxHashSet<K>,
    depth: u32,
    iterations: u32,
    profile: RecursionProfile,
    exceeded: bool,
}

impl<K: Eq + Hash + Copy> RecursionGuard<K> {
    pub fn with_profile(profile: RecursionProfile) -> Self {
        Self {
            visiting: FxHashSet::default(),
            depth: 0,
            iterations: 0,
            profile,
            exceeded: false,
        }
    }

    pub fn enter(&mut self, key: K) -> RecursionResult {
        self.iterations = self.iterations.saturating_add(1);
        if self.iterations > self.profile.max_iterations()
            || self.depth >= self.profile.max_depth()
        {
            self.exceeded = true;
            return RecursionResult::LimitExceeded;
        }
        if !self.visiting.insert(key) {
            return RecursionResult::CycleDetected;
        }
        self.depth += 1;
        RecursionResult::Entered
    }

    pub fn leave(&mut self, key: K) {
        debug_assert!(self.visiting.contains(&key), "leave() without enter()");
        self.visiting.remove(&key);
        self.depth = self.depth.saturating_sub(1);
    }

    /// Whether any limit was hit during this guard's lifetime. Callers use
    /// this to degrade to a safe default instead of reporting half-computed
    /// results.
    pub fn is_exceeded(&self) -> bool {
        self.exceeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_cycles() {
        let mut guard: RecursionGuard<u32> = RecursionGuard::with_profile(
            RecursionProfile::Custom {
                max_depth: 10,
                max_iterations: 100,
            },
        );
        assert_eq!(guard.enter(1), RecursionResult::Entered);
        assert_eq!(guard.enter(2), RecursionResult::Entered);
        assert_eq!(guard.enter(1), RecursionResult::CycleDetected);
        guard.leave(2);
        guard.leave(1);
        assert_eq!(guard.enter(1), RecursionResult::Entered);
    }

    #[test]
    fn enforces_depth() {
        let mut guard: RecursionGuard<u32> = RecursionGuard::with_profile(
            RecursionProfile::Custom {
                max_depth: 2,
                max_iterations: 100,
            },
        );
        assert_eq!(guard.enter(1), RecursionResult::Entered);
        assert_eq!(guard.enter(2), RecursionResult::Entered);
        assert_eq!(guard.enter(3), RecursionResult::LimitExceeded);
        assert!(guard.is_exceeded());
    }

    #[test]
    fn enforces_iterations() {
        let mut guard: RecursionGuard<u32> = RecursionGuard::with_profile(
            RecursionProfile::Custom {
                max_depth: 10,
                max_iterations: 3,
            },
        );
        for i in 0..3 {
            assert_eq!(guard.enter(i), RecursionResult::Entered);
            guard.leave(i);
        }
        assert_eq!(guard.enter(99), RecursionResult::LimitExceeded);
    }
}
