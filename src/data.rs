use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::AllocationError;

// Type aliases for clarity
pub type RoomId = String;
pub type Year = u8;
pub type BenchNo = u32;

pub const MIN_YEAR: Year = 1;
pub const MAX_YEAR: Year = 3;
/// Largest room accepted, in benches.
pub const MAX_BENCHES_PER_ROOM: u32 = 10_000;

/// A validated exam candidate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub roll: String,
    pub name: String,
    pub year: Year,
    pub section: char,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

impl Student {
    pub fn group_key(&self) -> GroupKey {
        GroupKey::new(self.year, self.section)
    }
}

/// Identifies one (year, section) queue. Orders by year first, then section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GroupKey {
    pub year: Year,
    pub section: char,
}

impl GroupKey {
    pub const fn new(year: Year, section: char) -> Self {
        Self { year, section }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Y{}-{}", self.year, self.section)
    }
}

/// An exam hall laid out as `rows` x `cols` two-seat benches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Room {
    pub id: RoomId,
    pub rows: u32,
    pub cols: u32,
}

impl Room {
    /// Callers must pass rooms through [`AllocationRequest::validate`] first;
    /// it bounds `rows * cols` by [`MAX_BENCHES_PER_ROOM`].
    pub fn benches(&self) -> u32 {
        self.rows * self.cols
    }

    pub fn seats(&self) -> u32 {
        self.benches() * 2
    }

    /// Maps a 1-based bench number to its 1-based `(row, column)`.
    /// Benches are numbered column by column.
    pub fn bench_coordinates(&self, bench_no: BenchNo) -> (u32, u32) {
        let column = (bench_no - 1) / self.rows + 1;
        let row = (bench_no - 1) % self.rows + 1;
        (row, column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatPosition {
    Left,
    Right,
}

impl SeatPosition {
    pub fn mirrored(self) -> Self {
        match self {
            SeatPosition::Left => SeatPosition::Right,
            SeatPosition::Right => SeatPosition::Left,
        }
    }
}

/// Display letter attached to every bench of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum BenchType {
    A,
    B,
    C,
}

impl BenchType {
    const CYCLE: [BenchType; 3] = [BenchType::A, BenchType::B, BenchType::C];

    pub fn for_room(room_index: usize) -> Self {
        Self::CYCLE[room_index % Self::CYCLE.len()]
    }
}

impl fmt::Display for BenchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            BenchType::A => "A",
            BenchType::B => "B",
            BenchType::C => "C",
        };
        f.write_str(letter)
    }
}

/// How students are ordered inside their group before seating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionStrategy {
    /// Keep roll-number order.
    Cycle,
    /// Shuffle within each half of the group.
    #[default]
    Block,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown distribution strategy `{0}`, expected `cycle` or `block`")]
pub struct UnknownStrategy(pub String);

impl FromStr for DistributionStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cycle" => Ok(DistributionStrategy::Cycle),
            "block" => Ok(DistributionStrategy::Block),
            other => Err(UnknownStrategy(other.to_string())),
        }
    }
}

/// Per-run knobs supplied with a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationConfig {
    #[serde(default)]
    pub strategy: Option<DistributionStrategy>,
    #[serde(default)]
    pub seed: Option<u64>,
    /// Mirror left/right seats when rendering. Never affects placement.
    #[serde(default)]
    pub flip_lr: bool,
}

/// The complete input for one allocation pass.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationRequest {
    pub students: Vec<Student>,
    /// Rooms in the order they should be filled.
    pub rooms: Vec<Room>,
    #[serde(default)]
    pub config: AllocationConfig,
}

impl AllocationRequest {
    /// Rejects the whole request on the first malformed student or room.
    pub fn validate(&self) -> Result<(), AllocationError> {
        for student in &self.students {
            let invalid = |reason: String| AllocationError::InvalidStudent {
                roll: student.roll.clone(),
                reason,
            };
            if student.roll.trim().is_empty() {
                return Err(invalid("roll is empty".to_string()));
            }
            if !(MIN_YEAR..=MAX_YEAR).contains(&student.year) {
                return Err(invalid(format!(
                    "year {} is outside {}..={}",
                    student.year, MIN_YEAR, MAX_YEAR
                )));
            }
            if !student.section.is_ascii_uppercase() {
                return Err(invalid(format!(
                    "section `{}` must be a single uppercase letter",
                    student.section
                )));
            }
        }

        for room in &self.rooms {
            let invalid = |reason: &str| AllocationError::InvalidRoom {
                room: room.id.clone(),
                reason: reason.to_string(),
            };
            if room.id.trim().is_empty() {
                return Err(invalid("room id is empty"));
            }
            if room.rows == 0 {
                return Err(invalid("rows must be positive"));
            }
            if room.cols == 0 {
                return Err(invalid("cols must be positive"));
            }
            let benches = room.rows.checked_mul(room.cols);
            if benches.is_none_or(|b| b > MAX_BENCHES_PER_ROOM) {
                return Err(invalid("room is too large"));
            }
        }

        Ok(())
    }
}

/// One occupied seat. Empty seats are never materialized.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatAssignment {
    pub room_id: RoomId,
    pub bench_no: BenchNo,
    pub row: u32,
    pub column: u32,
    pub position: SeatPosition,
    pub bench_type: BenchType,
    pub student: Student,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationSummary {
    pub total_students: usize,
    pub total_seats_filled: usize,
    pub rooms_processed: usize,
    /// Students left without a seat because the rooms ran out.
    pub unseated: usize,
    pub seated_per_year: BTreeMap<Year, usize>,
}

/// The final output of the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationOutput {
    pub assignments: Vec<SeatAssignment>,
    pub summary: AllocationSummary,
}
