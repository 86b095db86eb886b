//! Typed ID wrappers for owners and videos.
//!
//! Both ids are plain unsigned integers on the wire and on disk. Parsing from a
//! request path only accepts ASCII digits, so a parsed id can never contain a
//! path separator or a parent reference.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of the account that owns a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(u64);

impl OwnerId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Identifier of a single uploaded video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(u64);

impl VideoId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Error returned when a string is not a valid id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid id: {0:?}")]
pub struct ParseIdError(String);

fn parse_digits(s: &str) -> Result<u64, ParseIdError> {
    // u64::from_str accepts a leading '+', which would give two spellings of
    // the same directory.
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseIdError(s.to_string()));
    }
    s.parse().map_err(|_| ParseIdError(s.to_string()))
}

macro_rules! id_impls {
    ($ty:ident) => {
        impl FromStr for $ty {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_digits(s).map(Self)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $ty {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

id_impls!(OwnerId);
id_impls!(VideoId);
