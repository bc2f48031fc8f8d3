use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Coarse aspect category of a video, used as the storage folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
    Other,
}

impl Orientation {
    /// Wider than tall is landscape, taller than wide is portrait, square is other.
    pub fn classify(width: u32, height: u32) -> Self {
        use std::cmp::Ordering;

        match width.cmp(&height) {
            Ordering::Greater => Orientation::Landscape,
            Ordering::Less => Orientation::Portrait,
            Ordering::Equal => Orientation::Other,
        }
    }

    pub fn folder(&self) -> &'static str {
        match self {
            Orientation::Landscape => "landscape",
            Orientation::Portrait => "portrait",
            Orientation::Other => "other",
        }
    }
}

impl Display for Orientation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.folder())
    }
}
