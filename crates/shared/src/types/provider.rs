use serde::{Deserialize, Serialize};
use std::fmt;

/// External calendar provider family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "calendar_provider", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Google,
    Microsoft,
    Apple,
    Caldav,
}

impl ProviderKind {
    /// All recognized provider kinds
    pub fn all() -> [ProviderKind; 4] {
        [
            ProviderKind::Google,
            ProviderKind::Microsoft,
            ProviderKind::Apple,
            ProviderKind::Caldav,
        ]
    }

    /// Human-readable name for user-facing messages
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Google => "Google Calendar",
            ProviderKind::Microsoft => "Microsoft Outlook",
            ProviderKind::Apple => "Apple Calendar",
            ProviderKind::Caldav => "CalDAV",
        }
    }

    /// Check if this provider authenticates with OAuth tokens
    pub fn is_oauth(&self) -> bool {
        matches!(self, ProviderKind::Google | ProviderKind::Microsoft)
    }

    /// Check if this provider speaks the CalDAV protocol
    pub fn is_caldav(&self) -> bool {
        matches!(self, ProviderKind::Apple | ProviderKind::Caldav)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Google => write!(f, "google"),
            ProviderKind::Microsoft => write!(f, "microsoft"),
            ProviderKind::Apple => write!(f, "apple"),
            ProviderKind::Caldav => write!(f, "caldav"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(ProviderKind::Google),
            "microsoft" | "outlook" => Ok(ProviderKind::Microsoft),
            "apple" | "icloud" => Ok(ProviderKind::Apple),
            "caldav" => Ok(ProviderKind::Caldav),
            other => Err(format!("unknown calendar provider: {}", other)),
        }
    }
}
