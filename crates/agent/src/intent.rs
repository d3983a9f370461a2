use std::sync::{Arc, OnceLock};

use docent_core::domain::catalog::{ArtworkId, RoomId};
use docent_core::domain::conversation::Persona;
use docent_core::domain::session::SessionState;
use docent_core::flows::NegotiationEvent;
use docent_core::knowledge::{normalize_text, KnowledgeBase};
use regex::Regex;

/// Closed set of visitor intents, in classification priority order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    Affirmative,
    Negative,
    /// An utterance received mid-negotiation that is neither yes nor no.
    Other,
    NameDeclaration(String),
    Greeting,
    Thanks,
    ArtworkRequest(ArtworkId),
    RoomRequest(RoomId),
    Fallback,
}

impl Intent {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Affirmative => "affirmative",
            Self::Negative => "negative",
            Self::Other => "other",
            Self::NameDeclaration(_) => "name_declaration",
            Self::Greeting => "greeting",
            Self::Thanks => "thanks",
            Self::ArtworkRequest(_) => "artwork_request",
            Self::RoomRequest(_) => "room_request",
            Self::Fallback => "fallback",
        }
    }

    pub fn negotiation_event(&self) -> NegotiationEvent {
        match self {
            Self::Affirmative => NegotiationEvent::Affirmative,
            Self::Negative => NegotiationEvent::Negative,
            Self::ArtworkRequest(artwork) => NegotiationEvent::ArtworkRequested(artwork.clone()),
            _ => NegotiationEvent::Other,
        }
    }
}

const AFFIRMATIVE_PHRASES: &[&str] = &[
    "y",
    "yes",
    "yeah",
    "yep",
    "yup",
    "yea",
    "sure",
    "ok",
    "okay",
    "alright",
    "absolutely",
    "of course",
    "please do",
    "go ahead",
    "take me",
    "lets go",
    "sounds good",
    "why not",
];

const NEGATIVE_PHRASES: &[&str] = &[
    "n",
    "no",
    "nope",
    "nah",
    "not now",
    "not really",
    "cancel",
    "stop",
    "never mind",
    "nevermind",
    "dont",
    "maybe later",
    "skip",
];

const GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "hiya",
    "howdy",
    "yo",
    "salam",
    "salaam",
    "greetings",
    "hi there",
    "hello there",
    "hey there",
    "good morning",
    "good afternoon",
    "good evening",
];

const GRATITUDE_TOKENS: &[&str] =
    &["thanks", "thank", "thx", "ty", "cheers", "appreciate", "appreciated", "grateful"];

/// Words that follow "I am" / "I'm" without being a name.
const NOT_A_NAME: &[&str] = &[
    "a", "an", "the", "in", "at", "on", "from", "here", "back", "just", "so", "very", "really",
    "not", "also", "still", "looking", "interested", "curious", "wondering", "trying", "going",
    "ready", "done", "good", "fine", "great", "lost", "new", "excited", "happy", "sorry",
    "thinking", "tired", "confused", "glad", "feeling", "bored", "hungry", "visiting", "ok",
    "okay", "sure", "please",
];

const NAVIGATION_PHRASES: &[&str] =
    &["show me", "take me", "go", "navigate", "where is", "how do i get", "back to"];

const ART_INFO_PHRASES: &[&str] = &[
    "tell me about",
    "describe",
    "who painted",
    "when was",
    "style",
    "meaning",
    "analysis",
    "context",
    "history",
];

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(i\s*am|i['’]?\s*m|my\s+name\s+is)\s+([A-Za-z][\w-]*)\b")
            .expect("valid regex")
    })
}

fn bare_word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z][\w-]*$").expect("valid regex"))
}

/// Deterministic, ordered-rule intent classification. The first matching rule wins.
#[derive(Clone, Debug)]
pub struct IntentClassifier {
    knowledge: Arc<KnowledgeBase>,
}

impl IntentClassifier {
    pub fn new(knowledge: Arc<KnowledgeBase>) -> Self {
        Self { knowledge }
    }

    pub fn classify(&self, utterance: &str, session: &SessionState) -> Intent {
        let normalized = normalize_text(utterance);

        if !session.is_idle() {
            return if is_negative(&normalized) {
                Intent::Negative
            } else if is_affirmative(&normalized) {
                Intent::Affirmative
            } else {
                Intent::Other
            };
        }

        if session.visitor_name.is_none() {
            if let Some(name) = self.declared_name(utterance) {
                return Intent::NameDeclaration(name);
            }
        }

        if is_pure_greeting(&normalized) {
            return Intent::Greeting;
        }

        if contains_any_token(&normalized, GRATITUDE_TOKENS) {
            return Intent::Thanks;
        }

        if let Some(artwork) = self.knowledge.find_artwork(utterance) {
            return Intent::ArtworkRequest(artwork.key.clone());
        }

        if let Some(room) = self.knowledge.find_room(utterance) {
            return Intent::RoomRequest(room.key.clone());
        }

        Intent::Fallback
    }

    fn declared_name(&self, utterance: &str) -> Option<String> {
        let trimmed = utterance.trim();

        if let Some(captures) = name_pattern().captures(trimmed) {
            let candidate = captures.get(2)?.as_str();
            return self.acceptable_name(candidate).then(|| candidate.to_string());
        }

        if bare_word_pattern().is_match(trimmed) && self.acceptable_name(trimmed) {
            return Some(trimmed.to_string());
        }

        None
    }

    fn acceptable_name(&self, candidate: &str) -> bool {
        let word = normalize_text(candidate);
        if word.is_empty() || NOT_A_NAME.contains(&word.as_str()) {
            return false;
        }

        let vocabulary = [AFFIRMATIVE_PHRASES, NEGATIVE_PHRASES, GREETINGS, GRATITUDE_TOKENS];
        if vocabulary.iter().any(|list| list.contains(&word.as_str())) {
            return false;
        }

        self.knowledge.find_room(&word).is_none()
            && self.knowledge.find_artwork(&word).is_none()
            && self.knowledge.artwork_by_key(&word).is_none()
    }
}

/// Picks the persona for a turn that is not consumed by a negotiation.
pub fn select_responder(utterance: &str, intent: &Intent, last_responder: Persona) -> Persona {
    match intent {
        Intent::Greeting
        | Intent::Thanks
        | Intent::NameDeclaration(_)
        | Intent::RoomRequest(_)
        | Intent::ArtworkRequest(_) => return Persona::Nav,
        _ => {}
    }

    let normalized = normalize_text(utterance);
    if is_affirmative(&normalized) || contains_any_phrase(&normalized, NAVIGATION_PHRASES) {
        return Persona::Nav;
    }
    if contains_any_phrase(&normalized, ART_INFO_PHRASES) {
        return Persona::Art;
    }

    last_responder.other()
}

pub fn is_affirmative(normalized: &str) -> bool {
    starts_with_any_phrase(normalized, AFFIRMATIVE_PHRASES)
}

/// Any refusal word anywhere in the reply wins over a leading "ok" or "please".
pub fn is_negative(normalized: &str) -> bool {
    contains_any_phrase(normalized, NEGATIVE_PHRASES)
}

fn is_pure_greeting(normalized: &str) -> bool {
    GREETINGS.contains(&normalized)
}

fn starts_with_any_phrase(normalized: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| {
        normalized
            .strip_prefix(phrase)
            .map(|rest| rest.is_empty() || rest.starts_with(' '))
            .unwrap_or(false)
    })
}

fn contains_any_token(normalized: &str, tokens: &[&str]) -> bool {
    normalized.split_whitespace().any(|token| tokens.contains(&token))
}

fn contains_any_phrase(normalized: &str, phrases: &[&str]) -> bool {
    let padded = format!(" {normalized} ");
    phrases.iter().any(|phrase| padded.contains(&format!(" {phrase} ")))
}
