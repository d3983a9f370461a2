use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtworkId(pub String);

impl RoomId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ArtworkId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ArtworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRecord {
    pub key: RoomId,
    pub title: String,
    /// Words that route a visitor to this room. A single word matches any token it prefixes,
    /// a multi-word keyword must appear as a phrase.
    pub keywords: Vec<String>,
    /// Rank used when an utterance names more than one room; lower wins.
    pub priority: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtworkRecord {
    pub key: ArtworkId,
    pub title: String,
    pub artist: String,
    pub room: RoomId,
    pub image_ref: String,
    /// Alias and typo token sets. Every token of a set must be present in an utterance.
    pub aliases: Vec<Vec<String>>,
}

impl ArtworkRecord {
    pub fn byline(&self) -> String {
        format!("{} by {}", self.title, self.artist)
    }
}
