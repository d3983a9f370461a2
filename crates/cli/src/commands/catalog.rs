use docent_core::knowledge::KnowledgeBase;
use serde::Serialize;

use crate::commands::{load_config, CommandResult};

#[derive(Debug, Serialize)]
struct RoomListing<'a> {
    key: &'a str,
    title: &'a str,
    artworks: Vec<ArtworkListing<'a>>,
}

#[derive(Debug, Serialize)]
struct ArtworkListing<'a> {
    key: &'a str,
    title: &'a str,
    artist: &'a str,
}

pub fn run(json_output: bool) -> CommandResult {
    let config = match load_config("catalog") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let knowledge = match KnowledgeBase::from_config(&config.knowledge) {
        Ok(knowledge) => knowledge,
        Err(error) => return CommandResult::failure("catalog", "catalog_load", error.to_string(), 3),
    };

    let listings = listings(&knowledge);
    if json_output {
        let message =
            format!("{} rooms, {} artworks", knowledge.room_count(), knowledge.artwork_count());
        return CommandResult::success_with("catalog", message, serde_json::to_value(&listings).ok());
    }

    let mut lines = Vec::new();
    for room in &listings {
        lines.push(format!("{} ({})", room.title, room.key));
        if room.artworks.is_empty() {
            lines.push("  (no artworks)".to_string());
        }
        for artwork in &room.artworks {
            lines.push(format!("  - {} by {} [{}]", artwork.title, artwork.artist, artwork.key));
        }
    }
    CommandResult::plain(lines.join("\n"))
}

fn listings(knowledge: &KnowledgeBase) -> Vec<RoomListing<'_>> {
    knowledge
        .rooms()
        .map(|room| RoomListing {
            key: room.key.as_str(),
            title: &room.title,
            artworks: knowledge
                .artworks()
                .filter(|artwork| artwork.room == room.key)
                .map(|artwork| ArtworkListing {
                    key: artwork.key.as_str(),
                    title: &artwork.title,
                    artist: &artwork.artist,
                })
                .collect(),
        })
        .collect()
}
