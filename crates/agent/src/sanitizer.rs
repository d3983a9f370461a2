use std::sync::{Arc, OnceLock};

use docent_core::domain::catalog::{ArtworkId, RoomId};
use docent_core::knowledge::KnowledgeBase;
use regex::Regex;
use tracing::warn;

use crate::llm::{CompletionOutput, StructuredDirectives};

pub const EMPTY_REPLY: &str = "Okay.";

fn room_tag() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\[ROOM:\s*([^\]]*?)\s*\]").expect("valid regex"))
}

fn artwork_tag() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\[ARTWORK:\s*([^\]]*?)\s*\]").expect("valid regex"))
}

fn strip_patterns() -> &'static [Regex; 4] {
    static PATTERNS: OnceLock<[Regex; 4]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"!\[.*?\]\(.*?\)").expect("valid regex"),
            Regex::new(r"(?i)\bhttps?://\S+").expect("valid regex"),
            Regex::new(r"(?i)\[ROOM:[^\]]*\]").expect("valid regex"),
            Regex::new(r"(?i)\[ARTWORK:[^\]]*\]").expect("valid regex"),
        ]
    })
}

fn whitespace_run() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s{2,}").expect("valid regex"))
}

/// Visible text plus the directive tags scraped from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SanitizedOutput {
    pub clean_text: String,
    /// Only set when the tag names a known room.
    pub directive_room: Option<RoomId>,
    /// Trimmed, lower-cased tag payload. Not yet validated.
    pub directive_artwork: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedDirectives {
    pub room: Option<RoomId>,
    pub artwork: Option<ArtworkId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extraction {
    pub clean_text: String,
    pub directives: ResolvedDirectives,
}

#[derive(Clone, Debug)]
pub struct OutputSanitizer {
    knowledge: Arc<KnowledgeBase>,
}

impl OutputSanitizer {
    pub fn new(knowledge: Arc<KnowledgeBase>) -> Self {
        Self { knowledge }
    }

    pub fn process(&self, raw: &str) -> SanitizedOutput {
        let directive_room = first_capture(room_tag(), raw)
            .and_then(|key| self.knowledge.room_by_key(&key))
            .map(|room| room.key.clone());
        let directive_artwork = first_capture(artwork_tag(), raw);

        SanitizedOutput { clean_text: clean_text(raw), directive_room, directive_artwork }
    }

    /// Sanitizes a completion and resolves its directives. Structured fields win over tags.
    pub fn extract(&self, output: &CompletionOutput) -> Extraction {
        let sanitized = self.process(&output.text);
        let directives = match &output.directives {
            Some(structured) => self.resolve_structured(structured),
            None => self.resolve(sanitized.directive_room.clone(), sanitized.directive_artwork.as_deref()),
        };
        Extraction { clean_text: sanitized.clean_text, directives }
    }

    fn resolve_structured(&self, structured: &StructuredDirectives) -> ResolvedDirectives {
        let room = structured
            .room
            .as_deref()
            .and_then(|key| self.knowledge.room_by_key(key))
            .map(|room| room.key.clone());
        let artwork = structured.artwork.as_deref().map(|key| key.trim().to_lowercase());
        self.resolve(room, artwork.as_deref())
    }

    /// Validates the artwork against the catalog and infers its room when no room was given.
    pub fn resolve(&self, room: Option<RoomId>, artwork: Option<&str>) -> ResolvedDirectives {
        let artwork = artwork.filter(|key| !key.is_empty()).and_then(|key| {
            let found = self.knowledge.artwork_by_key(key);
            if found.is_none() {
                warn!(
                    event_name = "sanitizer.unknown_directive",
                    artwork = key,
                    "ignoring artwork directive that is not in the catalog"
                );
            }
            found
        });

        ResolvedDirectives {
            room: room.or_else(|| artwork.map(|artwork| artwork.room.clone())),
            artwork: artwork.map(|artwork| artwork.key.clone()),
        }
    }
}

fn first_capture(pattern: &Regex, raw: &str) -> Option<String> {
    pattern
        .captures(raw)
        .and_then(|captures| captures.get(1))
        .map(|value| value.as_str().trim().to_lowercase())
        .filter(|value| !value.is_empty())
}

/// Strips markup, links and directive tags until nothing changes, so the result is stable
/// under repeated application.
pub fn clean_text(raw: &str) -> String {
    let mut current = raw.to_string();
    loop {
        let next = strip_once(&current);
        if next == current {
            break;
        }
        current = next;
    }

    if current.is_empty() {
        EMPTY_REPLY.to_string()
    } else {
        current
    }
}

fn strip_once(text: &str) -> String {
    let mut stripped = text.to_string();
    for pattern in strip_patterns() {
        stripped = pattern.replace_all(&stripped, "").into_owned();
    }
    whitespace_run().replace_all(&stripped, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use docent_core::domain::catalog::{ArtworkId, RoomId};
    use docent_core::knowledge::KnowledgeBase;

    use super::{clean_text, OutputSanitizer, EMPTY_REPLY};
    use crate::llm::{CompletionOutput, StructuredDirectives};

    fn sanitizer() -> OutputSanitizer {
        OutputSanitizer::new(Arc::new(KnowledgeBase::builtin().expect("builtin catalog")))
    }

    #[test]
    fn strips_images_links_and_tags() {
        let output = sanitizer().process(
            "Here it is ![starry](https://img.example/starry.png)  see https://example.org/x \
             [ROOM: modern] [ARTWORK: Starry Night]",
        );

        assert_eq!(output.clean_text, "Here it is see");
        assert_eq!(output.directive_room, Some(RoomId::new("modern")));
        assert_eq!(output.directive_artwork.as_deref(), Some("starry night"));
    }

    #[test]
    fn unknown_room_tag_is_stripped_and_ignored() {
        let output = sanitizer().process("Follow me. [room: attic]");
        assert_eq!(output.clean_text, "Follow me.");
        assert_eq!(output.directive_room, None);
    }

    #[test]
    fn malformed_tags_are_stripped() {
        assert_eq!(clean_text("Sure [ROOM:] thing [ARTWORK:   ]"), "Sure thing");
    }

    #[test]
    fn empty_output_becomes_okay() {
        assert_eq!(sanitizer().process("[ROOM: classic]").clean_text, EMPTY_REPLY);
        assert_eq!(clean_text("   "), EMPTY_REPLY);
    }

    #[test]
    fn sanitizing_is_idempotent() {
        let samples = [
            "Look ![a](b) here https://x.y [ROOM: modern]",
            "[ARTWORK: the [ROOM: modern] kiss] done",
            "![![x](y)](z) nested",
            "plain   text\n\nwith   gaps",
            "",
        ];
        for raw in samples {
            let once = clean_text(raw);
            assert_eq!(clean_text(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn artwork_directive_implies_its_room() {
        let sanitizer = sanitizer();
        let extraction = sanitizer.extract(&CompletionOutput::text("Sure. [ARTWORK: mona lisa]"));

        assert_eq!(extraction.clean_text, "Sure.");
        assert_eq!(extraction.directives.artwork, Some(ArtworkId::new("mona lisa")));
        assert_eq!(extraction.directives.room, Some(RoomId::new("classic")));
    }

    #[test]
    fn explicit_room_is_kept_over_implied_room() {
        let extraction = sanitizer()
            .extract(&CompletionOutput::text("Here. [ROOM: entrance] [ARTWORK: the scream]"));
        assert_eq!(extraction.directives.room, Some(RoomId::new("entrance")));
        assert_eq!(extraction.directives.artwork, Some(ArtworkId::new("the scream")));
    }

    #[test]
    fn unknown_artwork_directive_is_ignored_but_text_survives() {
        let extraction =
            sanitizer().extract(&CompletionOutput::text("A lovely piece. [ARTWORK: sunflowers]"));
        assert_eq!(extraction.clean_text, "A lovely piece.");
        assert_eq!(extraction.directives.artwork, None);
        assert_eq!(extraction.directives.room, None);
    }

    #[test]
    fn structured_directives_take_precedence_over_tags() {
        let output = CompletionOutput {
            text: "Right this way. [ARTWORK: the scream]".to_string(),
            directives: Some(StructuredDirectives {
                room: None,
                artwork: Some(" Water Lilies ".to_string()),
            }),
        };
        let extraction = sanitizer().extract(&output);

        assert_eq!(extraction.clean_text, "Right this way.");
        assert_eq!(extraction.directives.artwork, Some(ArtworkId::new("water lilies")));
        assert_eq!(extraction.directives.room, Some(RoomId::new("landscape")));
    }
}
