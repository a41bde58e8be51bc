//! Reserved marker tokens.

use serde::{Deserialize, Serialize};

/// One of the four control tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Marker {
    /// `>` opens a command
    Start,
    /// `!` selects the friendly message
    Friendly,
    /// `#` selects the tool payload
    Tool,
    /// `END` closes the command
    End,
}

impl Marker {
    /// Match a fragment against the markers.
    ///
    /// Surrounding whitespace is ignored; anything else must match exactly.
    #[must_use]
    pub fn parse(fragment: &str) -> Option<Self> {
        match fragment.trim() {
            ">" => Some(Self::Start),
            "!" => Some(Self::Friendly),
            "#" => Some(Self::Tool),
            "END" => Some(Self::End),
            _ => None,
        }
    }

    /// Token text
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Start => ">",
            Self::Friendly => "!",
            Self::Tool => "#",
            Self::End => "END",
        }
    }
}

impl std::fmt::Display for Marker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}
