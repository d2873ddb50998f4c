//! Three-component version numbers (`major.minor.patch` with an ignored suffix)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VersionParseError;

/// A parsed `major.minor.patch` triple.
///
/// Ordering is lexicographic on (major, minor, patch), which is exactly the
/// field order the derive uses.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct VersionNumber {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl VersionNumber {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a version number.
    ///
    /// Digits accumulate into the current component and `.` moves to the next
    /// one. Once the patch component is reached, the first non-digit ends
    /// parsing and the rest of the string is ignored (`2022.3.10f1` is
    /// `2022.3.10`, `1.2.0.1` is `1.2.0`). Any other character before the
    /// patch component is an error. Missing components are zero.
    pub fn parse(version: &str) -> Result<Self, VersionParseError> {
        let mut slots = [0u32; 3];
        let mut index = 0;

        for c in version.chars() {
            if let Some(digit) = c.to_digit(10) {
                slots[index] = slots[index]
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(digit))
                    .ok_or_else(|| VersionParseError::Overflow(version.to_string()))?;
            } else if index == 2 {
                break;
            } else if c == '.' {
                index += 1;
            } else {
                return Err(VersionParseError::UnexpectedCharacter {
                    version: version.to_string(),
                    found: c,
                });
            }
        }

        Ok(Self::new(slots[0], slots[1], slots[2]))
    }
}

impl FromStr for VersionNumber {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
