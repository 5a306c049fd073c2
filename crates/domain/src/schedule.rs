//! Read-only view of the local daily schedule and its time blocks

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::types::{BlockId, ScheduleId, TimeRange, UserId};

/// What kind of work a block holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Focus,
    Task,
    Habit,
    Meeting,
}

impl BlockKind {
    /// Label used when rendering a block into a remote event description
    pub fn label(&self) -> &'static str {
        match self {
            BlockKind::Focus => "Focus",
            BlockKind::Task => "Task",
            BlockKind::Habit => "Habit",
            BlockKind::Meeting => "Meeting",
        }
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockKind::Focus => write!(f, "focus"),
            BlockKind::Task => write!(f, "task"),
            BlockKind::Habit => write!(f, "habit"),
            BlockKind::Meeting => write!(f, "meeting"),
        }
    }
}

impl std::str::FromStr for BlockKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "focus" => Ok(BlockKind::Focus),
            "task" => Ok(BlockKind::Task),
            "habit" => Ok(BlockKind::Habit),
            "meeting" => Ok(BlockKind::Meeting),
            other => Err(format!("unknown block kind: {}", other)),
        }
    }
}

/// A scheduled block of time, carrying just enough state to render a
/// remote calendar event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeBlock {
    pub id: BlockId,
    pub title: String,
    pub kind: BlockKind,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub completed: bool,
    pub missed: bool,
}

impl TimeBlock {
    pub fn range(&self) -> TimeRange {
        TimeRange {
            start: self.start_time,
            end: self.end_time,
        }
    }
}

/// One day's schedule for a user, with its blocks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub user_id: UserId,
    pub date: NaiveDate,
    pub blocks: Vec<TimeBlock>,
}

impl Schedule {
    pub fn find_block(&self, id: BlockId) -> Option<&TimeBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }
}
