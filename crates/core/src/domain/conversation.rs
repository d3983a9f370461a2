use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_HISTORY_WINDOW: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    /// Tour guide: navigation and confirmations only.
    Nav,
    /// Art guide: artwork descriptions only.
    Art,
}

impl Persona {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Nav => "Tour Guide",
            Self::Art => "Art Guide",
        }
    }

    pub fn other(&self) -> Self {
        match self {
            Self::Nav => Self::Art,
            Self::Art => Self::Nav,
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Visitor,
    Nav,
    Art,
}

impl Speaker {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Visitor => "Visitor",
            Self::Nav => Persona::Nav.label(),
            Self::Art => Persona::Art.label(),
        }
    }
}

impl From<Persona> for Speaker {
    fn from(persona: Persona) -> Self {
        match persona {
            Persona::Nav => Self::Nav,
            Persona::Art => Self::Art,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub speaker: Speaker,
    pub text: String,
}

/// Trailing window of conversation turns. Pushing past the window drops the oldest turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundedHistory {
    window: usize,
    turns: VecDeque<ConversationTurn>,
}

impl Default for BoundedHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

impl BoundedHistory {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self { window, turns: VecDeque::with_capacity(window) }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn push(&mut self, speaker: impl Into<Speaker>, text: impl Into<String>) {
        if self.turns.len() == self.window {
            self.turns.pop_front();
        }
        self.turns.push_back(ConversationTurn { speaker: speaker.into(), text: text.into() });
    }

    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn has_persona_turns(&self) -> bool {
        self.turns.iter().any(|turn| turn.speaker != Speaker::Visitor)
    }

    pub fn render(&self) -> String {
        self.turns
            .iter()
            .map(|turn| format!("{}: {}", turn.speaker.label(), turn.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::{BoundedHistory, Persona, Speaker};

    #[test]
    fn history_drops_oldest_turns_beyond_window() {
        let mut history = BoundedHistory::new(3);
        history.push(Speaker::Visitor, "one");
        history.push(Persona::Nav, "two");
        history.push(Persona::Art, "three");
        history.push(Speaker::Visitor, "four");

        let texts = history.turns().map(|turn| turn.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["two", "three", "four"]);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn render_labels_each_speaker() {
        let mut history = BoundedHistory::new(4);
        history.push(Speaker::Visitor, "hello");
        history.push(Persona::Nav, "Welcome!");

        assert_eq!(history.render(), "Visitor: hello\nTour Guide: Welcome!");
        assert!(history.has_persona_turns());
    }

    #[test]
    fn zero_window_is_clamped_to_one() {
        let mut history = BoundedHistory::new(0);
        history.push(Speaker::Visitor, "a");
        history.push(Speaker::Visitor, "b");
        assert_eq!(history.window(), 1);
        assert_eq!(history.render(), "Visitor: b");
    }

    #[test]
    fn personas_alternate() {
        assert_eq!(Persona::Nav.other(), Persona::Art);
        assert_eq!(Persona::Art.other(), Persona::Nav);
    }
}
