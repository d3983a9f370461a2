//! Read-only museum catalog: rooms and artworks, with exact and fuzzy lookup by free text.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::config::KnowledgeConfig;
use crate::domain::catalog::{ArtworkId, ArtworkRecord, RoomId, RoomRecord};

/// Catalog shipped with the binary, used when no catalog path is configured.
pub const BUILTIN_CATALOG: &str = include_str!("../data/museum.json");

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("could not read catalog file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("catalog invariant violation: {0}")]
    Invariant(String),
}

#[derive(Clone, Debug)]
pub struct KnowledgeBase {
    rooms: BTreeMap<RoomId, RoomRecord>,
    artworks: BTreeMap<ArtworkId, ArtworkRecord>,
    routing_order: Vec<RoomId>,
}

impl KnowledgeBase {
    pub fn builtin() -> Result<Self, KnowledgeError> {
        Self::from_json_str(BUILTIN_CATALOG)
    }

    pub fn load(path: &Path) -> Result<Self, KnowledgeError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| KnowledgeError::ReadFile { path: path.to_path_buf(), source })?;
        Self::from_json_str(&raw)
    }

    /// The configured catalog file, or the built-in catalog when none is set.
    pub fn from_config(config: &KnowledgeConfig) -> Result<Self, KnowledgeError> {
        match &config.path {
            Some(path) => Self::load(path),
            None => Self::builtin(),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, KnowledgeError> {
        let file = serde_json::from_str::<CatalogFile>(raw)?;
        Self::from_records(file.rooms(), file.artworks())
    }

    pub fn from_records(
        rooms: Vec<RoomRecord>,
        artworks: Vec<ArtworkRecord>,
    ) -> Result<Self, KnowledgeError> {
        if rooms.is_empty() {
            return Err(KnowledgeError::Invariant("catalog must define at least one room".into()));
        }

        let mut routing_order =
            rooms.iter().map(|room| (room.priority, room.key.clone())).collect::<Vec<_>>();
        routing_order.sort();
        let routing_order = routing_order.into_iter().map(|(_, key)| key).collect();

        let rooms = rooms
            .into_iter()
            .map(|room| (room.key.clone(), room))
            .collect::<BTreeMap<_, _>>();

        let mut indexed = BTreeMap::new();
        for artwork in artworks {
            if !rooms.contains_key(&artwork.room) {
                return Err(KnowledgeError::Invariant(format!(
                    "artwork `{}` references unknown room `{}`",
                    artwork.key, artwork.room
                )));
            }
            indexed.insert(artwork.key.clone(), artwork);
        }

        Ok(Self { rooms, artworks: indexed, routing_order })
    }

    pub fn room(&self, id: &RoomId) -> Option<&RoomRecord> {
        self.rooms.get(id)
    }

    pub fn artwork(&self, id: &ArtworkId) -> Option<&ArtworkRecord> {
        self.artworks.get(id)
    }

    /// Exact lookup by a free-text key such as one scraped from model output.
    pub fn artwork_by_key(&self, key: &str) -> Option<&ArtworkRecord> {
        let wanted = normalize_text(key);
        if wanted.is_empty() {
            return None;
        }
        self.artworks.values().find(|artwork| {
            normalize_text(artwork.key.as_str()) == wanted || normalize_text(&artwork.title) == wanted
        })
    }

    pub fn room_by_key(&self, key: &str) -> Option<&RoomRecord> {
        let wanted = key.trim().to_ascii_lowercase();
        self.rooms.values().find(|room| room.key.as_str().to_ascii_lowercase() == wanted)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &RoomRecord> {
        self.rooms.values()
    }

    pub fn artworks(&self) -> impl Iterator<Item = &ArtworkRecord> {
        self.artworks.values()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn artwork_count(&self) -> usize {
        self.artworks.len()
    }

    pub fn room_title<'a>(&'a self, id: &'a RoomId) -> &'a str {
        self.room(id).map(|room| room.title.as_str()).unwrap_or(id.as_str())
    }

    /// Finds the artwork an utterance refers to. Keys and titles are matched as whole-word
    /// phrases, longest first; alias token sets are the fallback.
    pub fn find_artwork(&self, text: &str) -> Option<&ArtworkRecord> {
        let query = normalize_text(text);
        if query.is_empty() {
            return None;
        }
        let padded = format!(" {query} ");

        let by_phrase = self
            .artworks
            .values()
            .filter_map(|artwork| {
                [normalize_text(artwork.key.as_str()), normalize_text(&artwork.title)]
                    .into_iter()
                    .filter(|phrase| !phrase.is_empty() && padded.contains(&format!(" {phrase} ")))
                    .map(|phrase| phrase.len())
                    .max()
                    .map(|length| (length, artwork))
            })
            .max_by_key(|(length, _)| *length)
            .map(|(_, artwork)| artwork);
        if by_phrase.is_some() {
            return by_phrase;
        }

        let tokens = query.split_whitespace().collect::<BTreeSet<_>>();
        self.artworks.values().find(|artwork| {
            artwork.aliases.iter().any(|alias| {
                !alias.is_empty() && alias.iter().all(|token| tokens.contains(token.as_str()))
            })
        })
    }

    /// Finds the room an utterance asks for, by room key or routing keyword. When several
    /// rooms match, the one with the lowest priority wins.
    pub fn find_room(&self, text: &str) -> Option<&RoomRecord> {
        let query = normalize_text(text);
        if query.is_empty() {
            return None;
        }
        let padded = format!(" {query} ");
        let tokens = query.split_whitespace().collect::<Vec<_>>();

        self.routing_order.iter().filter_map(|key| self.rooms.get(key)).find(|room| {
            std::iter::once(room.key.as_str())
                .chain(room.keywords.iter().map(String::as_str))
                .map(normalize_text)
                .filter(|keyword| !keyword.is_empty())
                .any(|keyword| {
                    if keyword.contains(' ') {
                        padded.contains(&format!(" {keyword} "))
                    } else {
                        tokens.iter().any(|token| token.starts_with(keyword.as_str()))
                    }
                })
        })
    }
}

/// Lower-cases, drops apostrophes, and turns every other non-alphanumeric run into one space.
pub fn normalize_text(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    for character in text.chars() {
        if matches!(character, '\'' | '\u{2019}') {
            continue;
        }
        if character.is_alphanumeric() {
            normalized.extend(character.to_lowercase());
        } else {
            normalized.push(' ');
        }
    }
    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    rooms: BTreeMap<String, RoomEntry>,
    #[serde(default)]
    artworks: BTreeMap<String, ArtworkEntry>,
}

#[derive(Debug, Deserialize)]
struct RoomEntry {
    title: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    priority: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ArtworkEntry {
    title: String,
    artist: String,
    room: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    aliases: Vec<String>,
}

impl CatalogFile {
    fn rooms(&self) -> Vec<RoomRecord> {
        self.rooms
            .iter()
            .map(|(key, entry)| RoomRecord {
                key: RoomId::new(key.trim().to_ascii_lowercase()),
                title: entry.title.clone(),
                keywords: entry.keywords.iter().map(|keyword| normalize_text(keyword)).collect(),
                priority: entry.priority.unwrap_or(u32::MAX),
            })
            .collect()
    }

    fn artworks(&self) -> Vec<ArtworkRecord> {
        self.artworks
            .iter()
            .map(|(key, entry)| ArtworkRecord {
                key: ArtworkId::new(normalize_text(key)),
                title: entry.title.clone(),
                artist: entry.artist.clone(),
                room: RoomId::new(entry.room.trim().to_ascii_lowercase()),
                image_ref: entry.image.clone().unwrap_or_default(),
                aliases: entry
                    .aliases
                    .iter()
                    .map(|alias| {
                        normalize_text(alias).split_whitespace().map(str::to_string).collect()
                    })
                    .filter(|tokens: &Vec<String>| !tokens.is_empty())
                    .collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::{normalize_text, KnowledgeBase, KnowledgeError};
    use crate::config::KnowledgeConfig;
    use crate::domain::catalog::{ArtworkId, RoomId};

    fn catalog() -> KnowledgeBase {
        KnowledgeBase::builtin().expect("builtin catalog is valid")
    }

    #[test]
    fn builtin_catalog_links_every_artwork_to_a_room() {
        let knowledge = catalog();
        assert_eq!(knowledge.room_count(), 5);
        assert_eq!(knowledge.artwork_count(), 12);
        for artwork in knowledge.artworks() {
            assert!(knowledge.room(&artwork.room).is_some(), "{} has a room", artwork.key);
        }
    }

    #[test]
    fn normalization_strips_punctuation_and_apostrophes() {
        assert_eq!(normalize_text("  Let\u{2019}s see   The SCREAM!! "), "lets see the scream");
        assert_eq!(normalize_text("I'm here."), "im here");
    }

    #[test]
    fn finds_artwork_by_key_title_and_alias() {
        let knowledge = catalog();
        let by_key = knowledge.find_artwork("show me Starry Night").map(|a| a.key.clone());
        assert_eq!(by_key, Some(ArtworkId::new("starry night")));

        let by_title = knowledge.find_artwork("what about The Birth of Venus?").map(|a| a.room.clone());
        assert_eq!(by_title, Some(RoomId::new("classic")));

        let by_alias = knowledge.find_artwork("the one with the earring and a pearl");
        assert_eq!(by_alias.map(|a| a.key.as_str()), Some("girl with a pearl earring"));
    }

    #[test]
    fn alias_tokens_are_word_bounded() {
        let knowledge = catalog();
        assert!(knowledge.find_artwork("I love screaming children").is_none());
        assert!(knowledge.find_artwork("anything by munch?").is_some());
    }

    #[test]
    fn longest_phrase_wins() {
        let knowledge = catalog();
        let found = knowledge.find_artwork("tell me about the night watch");
        assert_eq!(found.map(|a| a.key.as_str()), Some("the night watch"));
    }

    #[test]
    fn finds_rooms_by_keyword_prefix_and_phrase() {
        let knowledge = catalog();
        assert_eq!(knowledge.find_room("any sculptures?").map(|r| r.key.as_str()), Some("sculpture"));
        assert_eq!(knowledge.find_room("back to the main hall").map(|r| r.key.as_str()), Some("entrance"));
        assert_eq!(knowledge.find_room("renaissance please").map(|r| r.key.as_str()), Some("classic"));
        assert!(knowledge.find_room("the hall of mirrors").is_none());
        assert!(knowledge.find_room("gold frames").is_none());
    }

    #[test]
    fn ambiguous_room_requests_follow_routing_priority() {
        let knowledge = catalog();
        let route = |text: &str| knowledge.find_room(text).map(|room| room.key.as_str().to_string());

        assert_eq!(route("show me modern or classic art").as_deref(), Some("modern"));
        assert_eq!(route("take me home from the modern wing").as_deref(), Some("modern"));
        assert_eq!(route("I want landscape or sculpture").as_deref(), Some("sculpture"));
        assert_eq!(route("old statues").as_deref(), Some("classic"));
    }

    #[test]
    fn rooms_without_priority_route_in_key_order() {
        let knowledge = KnowledgeBase::from_json_str(
            r#"{"rooms": {"west": {"title": "West", "keywords": ["wing"]},
                          "east": {"title": "East", "keywords": ["wing"]}}}"#,
        )
        .expect("catalog parses");
        assert_eq!(knowledge.find_room("the wing").map(|room| room.key.as_str()), Some("east"));
    }

    #[test]
    fn exact_key_lookup_tolerates_case_and_spacing() {
        let knowledge = catalog();
        assert!(knowledge.artwork_by_key("  MONA   lisa ").is_some());
        assert!(knowledge.artwork_by_key("the mona lisa").is_none());
        assert!(knowledge.room_by_key("Modern").is_some());
    }

    #[test]
    fn artwork_with_unknown_room_is_rejected() {
        let error = KnowledgeBase::from_json_str(
            r#"{"rooms": {"entrance": {"title": "Hall"}},
                "artworks": {"x": {"title": "X", "artist": "Y", "room": "attic"}}}"#,
        )
        .expect_err("unknown room must be rejected");
        assert!(matches!(error, KnowledgeError::Invariant(message) if message.contains("attic")));
    }

    #[test]
    fn loads_catalog_from_file() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("museum.json");
        fs::write(
            &path,
            r#"{"rooms": {"Atrium": {"title": "Atrium", "keywords": ["atrium"]}},
                "artworks": {"Sunflowers": {"title": "Sunflowers", "artist": "Vincent van Gogh",
                             "room": "atrium", "image": "/img/sun.jpg", "aliases": ["sun flowers"]}}}"#,
        )
        .expect("write catalog");

        let knowledge = KnowledgeBase::load(&path).expect("catalog loads");
        let artwork = knowledge.find_artwork("the sun flowers painting").expect("alias match");
        assert_eq!(artwork.key, ArtworkId::new("sunflowers"));
        assert_eq!(artwork.room, RoomId::new("atrium"));
        assert_eq!(artwork.image_ref, "/img/sun.jpg");
    }

    #[test]
    fn configured_path_replaces_builtin_catalog() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("small.json");
        fs::write(&path, r#"{"rooms": {"entrance": {"title": "Hall"}}}"#).expect("write catalog");

        let configured =
            KnowledgeBase::from_config(&KnowledgeConfig { path: Some(path) }).expect("loads");
        assert_eq!(configured.room_count(), 1);
        assert_eq!(configured.artwork_count(), 0);

        let builtin = KnowledgeBase::from_config(&KnowledgeConfig::default()).expect("builtin");
        assert_eq!(builtin.artwork_count(), 12);
    }

    #[test]
    fn missing_catalog_file_reports_its_path() {
        let error = KnowledgeBase::from_config(&KnowledgeConfig {
            path: Some("/nonexistent/museum.json".into()),
        })
        .expect_err("missing file");
        assert!(error.to_string().contains("/nonexistent/museum.json"));
    }
}
