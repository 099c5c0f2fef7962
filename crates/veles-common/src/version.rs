//! Client build version handling.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// A client build number, e.g. `3.3.5.12340`.
///
/// Versions order lexicographically by `(expansion, major, minor, build)`,
/// which matches how the client compares builds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GameVersion {
    pub expansion: u16,
    pub major: u16,
    pub minor: u16,
    pub build: u32,
}

impl GameVersion {
    pub const fn new(expansion: u16, major: u16, minor: u16, build: u32) -> Self {
        Self {
            expansion,
            major,
            minor,
            build,
        }
    }

    /// Parse a version string, returning `None` when malformed.
    pub fn from_string(value: &str) -> Option<Self> {
        value.parse().ok()
    }
}

impl FromStr for GameVersion {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let invalid = || Error::InvalidVersion(value.to_string());

        let mut parts = value.split('.');
        let expansion = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let major = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let minor = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let build = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;

        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self::new(expansion, major, minor, build))
    }
}

impl fmt::Display for GameVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.expansion, self.major, self.minor, self.build
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        let version = GameVersion::from_string("3.3.5.12340").unwrap();
        assert_eq!(version, GameVersion::new(3, 3, 5, 12340));
        assert_eq!(version.to_string(), "3.3.5.12340");
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(GameVersion::from_string("3.3.5").is_none());
        assert!(GameVersion::from_string("3.3.5.12340.1").is_none());
        assert!(GameVersion::from_string("a.b.c.d").is_none());
        assert!(GameVersion::from_string("").is_none());
    }

    #[test]
    fn test_ordering() {
        let vanilla = GameVersion::new(1, 12, 1, 5875);
        let tbc = GameVersion::new(2, 4, 3, 8606);
        let wotlk = GameVersion::new(3, 3, 5, 12340);

        assert!(vanilla < tbc);
        assert!(tbc < wotlk);
        assert!(wotlk <= GameVersion::new(3, 3, 5, 12340));
        assert!(GameVersion::new(2, 1, 0, 6692) > GameVersion::new(2, 0, 3, 6299));
    }
}
