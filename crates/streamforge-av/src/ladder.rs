//! The bitrate ladder: the fixed list of renditions every upload is encoded to.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{Error, Result};

/// Version of the built-in ladder. Bump when the default rungs change.
pub const LADDER_VERSION: u32 = 1;

/// One bitrate/resolution variant of the encoded video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rendition {
    /// Identifier used in intermediate file names; must be a plain file name.
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub bitrate_kbps: u32,
}

impl Rendition {
    pub fn new(name: impl Into<String>, width: u32, height: u32, bitrate_kbps: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            bitrate_kbps,
        }
    }

    /// Conventional `WxH_Bk` name.
    pub fn conventional_name(width: u32, height: u32, bitrate_kbps: u32) -> String {
        format!("{width}x{height}_{bitrate_kbps}k")
    }

    fn rung(width: u32, height: u32, bitrate_kbps: u32) -> Self {
        Self::new(
            Self::conventional_name(width, height, bitrate_kbps),
            width,
            height,
            bitrate_kbps,
        )
    }
}

/// Versioned list of renditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitrateLadder {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_renditions")]
    pub renditions: Vec<Rendition>,
}

fn default_version() -> u32 {
    LADDER_VERSION
}

fn default_renditions() -> Vec<Rendition> {
    vec![
        Rendition::rung(160, 90, 250),
        Rendition::rung(320, 180, 500),
        Rendition::rung(640, 360, 750),
        Rendition::rung(640, 360, 1000),
        Rendition::rung(1280, 720, 1500),
    ]
}

impl Default for BitrateLadder {
    fn default() -> Self {
        Self {
            version: default_version(),
            renditions: default_renditions(),
        }
    }
}

impl BitrateLadder {
    pub fn len(&self) -> usize {
        self.renditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renditions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rendition> {
        self.renditions.iter()
    }

    /// Check that the ladder can be turned into unique, safe file names.
    pub fn validate(&self) -> Result<()> {
        if self.renditions.is_empty() {
            return Err(Error::InvalidInput("bitrate ladder is empty".into()));
        }

        let mut seen = HashSet::new();
        for r in &self.renditions {
            if streamforge_common::layout::validate_component(&r.name).is_err()
                || r.name.starts_with('.')
            {
                return Err(Error::InvalidInput(format!(
                    "rendition name {:?} is not a plain file name",
                    r.name
                )));
            }
            if !seen.insert(r.name.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "duplicate rendition name {:?}",
                    r.name
                )));
            }
            if r.width == 0 || r.height == 0 || r.bitrate_kbps == 0 {
                return Err(Error::InvalidInput(format!(
                    "rendition {:?} has a zero dimension or bitrate",
                    r.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ladder_has_five_rungs() {
        let ladder = BitrateLadder::default();
        assert_eq!(ladder.version, LADDER_VERSION);
        let dims: Vec<_> = ladder
            .iter()
            .map(|r| (r.width, r.height, r.bitrate_kbps))
            .collect();
        assert_eq!(
            dims,
            vec![
                (160, 90, 250),
                (320, 180, 500),
                (640, 360, 750),
                (640, 360, 1000),
                (1280, 720, 1500)
            ]
        );
        assert_eq!(ladder.renditions[2].name, "640x360_750k");
        ladder.validate().unwrap();
    }

    #[test]
    fn rejects_empty_ladder() {
        let ladder = BitrateLadder {
            version: 1,
            renditions: vec![],
        };
        assert!(ladder.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_names() {
        let ladder = BitrateLadder {
            version: 1,
            renditions: vec![
                Rendition::new("a", 1, 1, 1),
                Rendition::new("a", 2, 2, 2),
            ],
        };
        assert!(ladder.validate().is_err());
    }

    #[test]
    fn rejects_unsafe_names_and_zero_values() {
        for bad in ["../x", "a/b", "", ".hidden"] {
            let ladder = BitrateLadder {
                version: 1,
                renditions: vec![Rendition::new(bad, 1, 1, 1)],
            };
            assert!(ladder.validate().is_err(), "accepted {bad:?}");
        }
        let ladder = BitrateLadder {
            version: 1,
            renditions: vec![Rendition::new("a", 0, 1, 1)],
        };
        assert!(ladder.validate().is_err());
    }
}
