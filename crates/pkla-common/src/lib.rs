//! Common types and utilities for the pkl-analyzer semantic engine.
//!
//! This crate provides foundational types used across all pkla crates:
//! - String interning (`Atom`, `Interner`)
//! - Source spans (`Span`, `Spanned`)
//! - Centralized limits and thresholds
//! - Diagnostics (`Diagnostic`, `DiagnosticCategory`, message table)
//! - Pkl language versions (`PklVersion`)

// String interning for identifier deduplication
pub mod interner;
pub use interner::{Atom, Interner};

// Span - Source location tracking (byte offsets)
pub mod span;
pub use span::{Span, Spanned};

// Centralized limits and thresholds
pub mod limits;

// Diagnostics shared by binder/solver/checker
pub mod diagnostics;
pub use diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticMessage};

// Pkl language version ordering
pub mod version;
pub use version::PklVersion;
