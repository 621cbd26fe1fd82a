use crate::data::{BenchNo, BenchType, Room, RoomId, SeatAssignment, SeatPosition, Year};
use itertools::Itertools;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// One bench as it should be drawn. Seats hold roll numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchView {
    pub bench_no: BenchNo,
    pub row: u32,
    pub column: u32,
    pub left: Option<String>,
    pub right: Option<String>,
}

/// Occupancy summary and bench layout of one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomReport {
    pub room_id: RoomId,
    /// `None` for rooms that received nobody.
    pub bench_type: Option<BenchType>,
    pub capacity: u32,
    pub assigned: usize,
    pub empty_seats: usize,
    pub per_year: BTreeMap<Year, usize>,
    pub benches: Vec<BenchView>,
}

/// Builds one report per room, in room order.
///
/// `flip_lr` mirrors seats in the layout only; the assignments are untouched.
pub fn build_report(
    rooms: &[Room],
    assignments: &[SeatAssignment],
    flip_lr: bool,
) -> Vec<RoomReport> {
    let by_room: HashMap<&str, Vec<&SeatAssignment>> = assignments
        .iter()
        .into_group_map_by(|a| a.room_id.as_str());

    rooms
        .iter()
        .map(|room| {
            let seats = by_room.get(room.id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            room_report(room, seats, flip_lr)
        })
        .collect()
}

fn room_report(room: &Room, seats: &[&SeatAssignment], flip_lr: bool) -> RoomReport {
    let mut benches: Vec<BenchView> = (1..=room.benches())
        .map(|bench_no| {
            let (row, column) = room.bench_coordinates(bench_no);
            BenchView {
                bench_no,
                row,
                column,
                left: None,
                right: None,
            }
        })
        .collect();

    for seat in seats {
        let slot_index = (seat.bench_no as usize).checked_sub(1);
        let Some(bench) = slot_index.and_then(|i| benches.get_mut(i)) else {
            continue;
        };
        let position = if flip_lr {
            seat.position.mirrored()
        } else {
            seat.position
        };
        let slot = match position {
            SeatPosition::Left => &mut bench.left,
            SeatPosition::Right => &mut bench.right,
        };
        *slot = Some(seat.student.roll.clone());
    }

    let per_year = seats
        .iter()
        .map(|s| s.student.year)
        .counts()
        .into_iter()
        .collect();

    RoomReport {
        room_id: room.id.clone(),
        bench_type: seats.first().map(|s| s.bench_type),
        capacity: room.seats(),
        assigned: seats.len(),
        empty_seats: (room.seats() as usize).saturating_sub(seats.len()),
        per_year,
        benches,
    }
}
