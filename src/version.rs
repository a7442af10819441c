use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::errors::LauncherError;

/// Content version published next to the archive, `major.minor.patch`.
///
/// Field order gives the derived `Ord` its lexicographic meaning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl Version {
    /// Sentinel for "nothing installed".
    pub const ZERO: Version = Version::new(0, 0, 0);

    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Any component mismatch counts; direction does not matter.
    pub fn is_different(&self, other: &Version) -> bool {
        self != other
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn parse_segment(raw: &str, input: &str) -> Result<u16, LauncherError> {
    if raw.is_empty() || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(LauncherError::Parse(format!(
            "version segment '{raw}' in '{input}' is not numeric"
        )));
    }
    raw.parse::<u16>().map_err(|_| {
        LauncherError::Parse(format!(
            "version segment '{raw}' in '{input}' is out of range"
        ))
    })
}

impl FromStr for Version {
    type Err = LauncherError;

    /// Surrounding whitespace (a trailing newline in `Version.txt`) is ignored;
    /// anything else that is not `\d+\.\d+\.\d+` fails.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let segments: Vec<&str> = trimmed.split('.').collect();
        if segments.len() != 3 {
            return Err(LauncherError::Parse(format!(
                "expected major.minor.patch, got '{trimmed}'"
            )));
        }
        Ok(Version {
            major: parse_segment(segments[0], trimmed)?,
            minor: parse_segment(segments[1], trimmed)?,
            patch: parse_segment(segments[2], trimmed)?,
        })
    }
}
