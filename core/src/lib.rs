use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Mods

pub mod history;
pub mod process;
pub mod pwd;
pub mod tracer;

// Consts

pub const DEFAULT_HISTORY_LIMIT: usize = 10;
pub const DEFAULT_LENGTH: usize = 16;
pub const MAX_LENGTH: usize = 4096;

// Options

/// Character classes enabled for one generation.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct CharacterClasses {
    pub lowercase: bool,
    pub numbers: bool,
    pub symbols: bool,
    pub uppercase: bool,
}

impl CharacterClasses {
    pub fn all() -> Self {
        Self {
            lowercase: true,
            numbers: true,
            symbols: true,
            uppercase: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.lowercase || self.numbers || self.symbols || self.uppercase)
    }
}

// Records

/// An entry of the history log.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub password: String,
}

impl HistoryRecord {
    pub fn generated(password: String) -> Self {
        Self {
            created_at: Utc::now(),
            id: Uuid::new_v4(),
            kind: RecordKind::Generated,
            password,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordKind {
    Generated,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generated => "generated",
        }
    }

    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "generated" => Some(Self::Generated),
            _ => None,
        }
    }
}

// Tests
