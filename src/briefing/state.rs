//! Session phases and the transitions between them.

use serde::{Deserialize, Serialize};

/// The phases of a briefing session.
///
/// Idle → Interviewing → Extracting → Reviewing → Submitted. Extraction
/// failure rolls back to Interviewing; reset returns to Idle from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Interviewing,
    Extracting,
    Reviewing,
    /// Reviewing, after the record was dispatched to the spreadsheet.
    Submitted,
}

impl SessionPhase {
    /// Check if an event may move the session from `self` to `target`.
    ///
    /// Reset (anything → Idle) and start (anything → Interviewing) are
    /// always allowed and handled by the controller directly.
    pub fn can_transition_to(&self, target: SessionPhase) -> bool {
        use SessionPhase::*;
        matches!(
            (self, target),
            (Idle, Interviewing)
                | (Interviewing, Extracting)
                | (Extracting, Reviewing)
                | (Extracting, Interviewing)
                | (Reviewing, Submitted)
        )
    }

    /// Whether the structured record is on screen.
    pub fn is_reviewing(&self) -> bool {
        matches!(self, Self::Reviewing | Self::Submitted)
    }

    /// Whether a record must exist in this phase.
    pub fn holds_record(&self) -> bool {
        self.is_reviewing()
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Interviewing => "interviewing",
            Self::Extracting => "extracting",
            Self::Reviewing => "reviewing",
            Self::Submitted => "submitted",
        };
        write!(f, "{s}")
    }
}
