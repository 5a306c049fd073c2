//! Row models for the schedule tables (read-only to the sync core)

use chrono::{DateTime, NaiveDate, Utc};
use domain::{BlockKind, Schedule, TimeBlock};
use shared::types::{BlockId, ScheduleId, UserId};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct ScheduleRow {
    pub id: ScheduleId,
    pub user_id: UserId,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, FromRow)]
pub struct ScheduleBlockRow {
    pub id: BlockId,
    pub schedule_id: ScheduleId,
    pub title: String,
    pub kind: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub completed: bool,
    pub missed: bool,
}

impl ScheduleBlockRow {
    pub fn into_domain(self) -> Result<TimeBlock, String> {
        Ok(TimeBlock {
            id: self.id,
            title: self.title,
            kind: self.kind.parse::<BlockKind>()?,
            start_time: self.start_time,
            end_time: self.end_time,
            completed: self.completed,
            missed: self.missed,
        })
    }
}

/// Assemble schedules from their rows and blocks
pub fn assemble_schedules(
    rows: Vec<ScheduleRow>,
    mut blocks: Vec<ScheduleBlockRow>,
) -> Vec<Schedule> {
    let mut schedules: Vec<Schedule> = rows
        .into_iter()
        .map(|row| Schedule {
            id: row.id,
            user_id: row.user_id,
            date: row.date,
            blocks: Vec::new(),
        })
        .collect();

    blocks.sort_by_key(|b| b.start_time);
    for block_row in blocks {
        let schedule_id = block_row.schedule_id;
        // Unparseable kinds are skipped rather than failing the whole read
        if let Ok(block) = block_row.into_domain() {
            if let Some(schedule) = schedules.iter_mut().find(|s| s.id == schedule_id) {
                schedule.blocks.push(block);
            }
        }
    }
    schedules
}
