use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::GalleryError;

/// Opaque handle of a camera-upload asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(pub u64);

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MediaId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(MediaId)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: MediaId,
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    /// Capture time in epoch milliseconds.
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub parent: Option<MediaId>,
    #[serde(skip)]
    pub selected: bool,
}

impl MediaItem {
    pub fn new(id: u64, name: impl Into<String>, timestamp: Option<i64>) -> Self {
        MediaItem {
            id: MediaId(id),
            name: name.into(),
            mime_type: String::new(),
            timestamp,
            thumbnail: None,
            parent: None,
            selected: false,
        }
    }

    /// Capture time, treating a zero timestamp or one outside the
    /// representable calendar range the same as a missing one.
    pub fn capture_millis(&self) -> Option<i64> {
        self.timestamp
            .filter(|&ts| ts != 0 && DateTime::<Utc>::from_timestamp_millis(ts).is_some())
    }

    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        self.capture_millis().and_then(DateTime::<Utc>::from_timestamp_millis)
    }

    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    All,
    Days,
    Months,
    Years,
}

impl ViewMode {
    pub const ALL: [ViewMode; 4] = [ViewMode::All, ViewMode::Days, ViewMode::Months, ViewMode::Years];

    pub fn granularity(self) -> Option<crate::Granularity> {
        match self {
            ViewMode::All => None,
            ViewMode::Days => Some(crate::Granularity::Day),
            ViewMode::Months => Some(crate::Granularity::Month),
            ViewMode::Years => Some(crate::Granularity::Year),
        }
    }

    /// The mode a card click drills down into.
    pub fn finer(self) -> Option<ViewMode> {
        match self {
            ViewMode::All => None,
            ViewMode::Days => Some(ViewMode::All),
            ViewMode::Months => Some(ViewMode::Days),
            ViewMode::Years => Some(ViewMode::Months),
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViewMode::All => "Camera uploads",
            ViewMode::Days => "Days",
            ViewMode::Months => "Months",
            ViewMode::Years => "Years",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ViewMode {
    type Err = GalleryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(ViewMode::All),
            "days" | "day" => Ok(ViewMode::Days),
            "months" | "month" => Ok(ViewMode::Months),
            "years" | "year" => Ok(ViewMode::Years),
            other => Err(GalleryError::InvalidViewMode(other.to_string())),
        }
    }
}
