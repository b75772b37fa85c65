//! Conversation modes and the transitions between them.

use serde::{Deserialize, Serialize};

/// Conversation mode. Each mode has its own rule set and engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Default,
    Fight,
    Oracle,
}

impl Mode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "default" | "deal" => Some(Self::Default),
            "fight" => Some(Self::Fight),
            "oracle" | "bible" => Some(Self::Oracle),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Fight => "fight",
            Self::Oracle => "oracle",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the caller must do with its conversational context after a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "kind", content = "mode", rename_all = "snake_case")]
pub enum Transition {
    /// Stay in the current mode
    #[default]
    Stay,
    /// Switch to another mode
    To(Mode),
    /// The conversation is over
    End,
}

impl Transition {
    pub fn target(&self) -> Option<Mode> {
        match self {
            Transition::To(mode) => Some(*mode),
            _ => None,
        }
    }
}

impl From<Option<Mode>> for Transition {
    fn from(mode: Option<Mode>) -> Self {
        mode.map(Transition::To).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_str() {
        assert_eq!(Mode::from_str("default"), Some(Mode::Default));
        assert_eq!(Mode::from_str("Fight"), Some(Mode::Fight));
        assert_eq!(Mode::from_str(" oracle "), Some(Mode::Oracle));
        assert_eq!(Mode::from_str("bible"), Some(Mode::Oracle));
        assert_eq!(Mode::from_str("sleep"), None);
    }

    #[test]
    fn test_transition_from_option() {
        assert_eq!(Transition::from(None), Transition::Stay);
        assert_eq!(
            Transition::from(Some(Mode::Default)),
            Transition::To(Mode::Default)
        );
        assert_eq!(Transition::To(Mode::Fight).target(), Some(Mode::Fight));
        assert_eq!(Transition::End.target(), None);
    }
}
