//! Pkl language versions.
//!
//! Modules can pin a minimum interpreter version via a `minPklVersion`
//! annotation. The binder aggregates these into a per-module derived fact
//! (the maximum over a module and its imports), so versions need a total
//! order and a parser for `major.minor.patch` strings.

use std::fmt;

/// A `major.minor.patch` Pkl version, ordered lexicographically.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PklVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl PklVersion {
    /// The lowest version; used when a module carries no annotation.
    pub const ZERO: Self = Self {
        major: 0,
        minor: 0,
        patch: 0,
    };

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse `"0.25.3"`. Missing components default to zero; a malformed
    /// string yields `None` so callers can ignore the annotation.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.trim().splitn(3, '.');
        let major = parts.next()?.parse().ok()?;
        let minor = match parts.next() {
            Some(p) => p.parse().ok()?,
            None => 0,
        };
        let patch = match parts.next() {
            Some(p) => p.parse().ok()?,
            None => 0,
        };
        Some(Self {
            major,
            minor,
            patch,
        })
    }
}

impl fmt::Display for PklVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_order() {
        let a = PklVersion::parse("0.25.0").unwrap();
        let b = PklVersion::parse("0.26").unwrap();
        assert!(a < b);
        assert_eq!(b, PklVersion::new(0, 26, 0));
    }

    #[test]
    fn malformed_is_none() {
        assert_eq!(PklVersion::parse("latest"), None);
        assert_eq!(PklVersion::parse("1.x"), None);
    }

    #[test]
    fn display_round_trips() {
        let v = PklVersion::new(0, 27, 1);
        assert_eq!(PklVersion::parse(&v.to_string()), Some(v));
    }
}
