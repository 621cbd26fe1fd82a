use crate::data::{BenchNo, BenchType, Room, SeatAssignment, SeatPosition, Student};
use std::collections::VecDeque;

/// Soft per-room estimates: `(students_per_room, max_per_group_in_room)`.
pub fn pre_allocation_metrics(total_students: usize, num_rooms: usize) -> (usize, usize) {
    if num_rooms == 0 {
        return (0, 0);
    }
    let students_per_room = total_students.div_ceil(num_rooms);
    (students_per_room, students_per_room.div_ceil(2))
}

/// Seats drawn from each side by [`allocate_paired`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairedFill {
    pub assignments: Vec<SeatAssignment>,
    pub left_used: usize,
    pub right_used: usize,
}

fn seat(
    room: &Room,
    bench_no: BenchNo,
    position: SeatPosition,
    bench_type: BenchType,
    student: Student,
) -> SeatAssignment {
    let (row, column) = room.bench_coordinates(bench_no);
    SeatAssignment {
        room_id: room.id.clone(),
        bench_no,
        row,
        column,
        position,
        bench_type,
        student,
    }
}

/// One student per bench on the left seat, benches in column-major order.
///
/// Draws from `supply` in order, moving to the next queue once one drains, and stops
/// after `limit` students or when the room is full. Right seats stay empty.
pub fn allocate_single(
    room: &Room,
    supply: &mut [&mut VecDeque<Student>],
    bench_type: BenchType,
    limit: usize,
) -> (Vec<SeatAssignment>, usize) {
    let mut assignments = Vec::new();
    let mut source = 0;

    for bench_no in 1..=room.benches() {
        if assignments.len() >= limit {
            break;
        }
        while source < supply.len() && supply[source].is_empty() {
            source += 1;
        }
        let Some(student) = supply.get_mut(source).and_then(|q| q.pop_front()) else {
            break;
        };
        assignments.push(seat(room, bench_no, SeatPosition::Left, bench_type, student));
    }

    let used = assignments.len();
    (assignments, used)
}

/// Left seats from `left`, right seats from `right`, bench by bench.
///
/// Each side stops independently at its limit (clamped to what its queue holds),
/// so a bench can end up with only its left seat filled. Iteration ends once both
/// sides are done or the room is full.
pub fn allocate_paired(
    room: &Room,
    left: &mut VecDeque<Student>,
    right: &mut VecDeque<Student>,
    bench_type: BenchType,
    left_limit: usize,
    right_limit: usize,
) -> PairedFill {
    let left_limit = left_limit.min(left.len());
    let right_limit = right_limit.min(right.len());
    let mut fill = PairedFill::default();

    for bench_no in 1..=room.benches() {
        if fill.left_used >= left_limit && fill.right_used >= right_limit {
            break;
        }

        if fill.left_used < left_limit {
            if let Some(student) = left.pop_front() {
                fill.assignments
                    .push(seat(room, bench_no, SeatPosition::Left, bench_type, student));
                fill.left_used += 1;
            }
        }

        if fill.right_used < right_limit {
            if let Some(student) = right.pop_front() {
                fill.assignments
                    .push(seat(room, bench_no, SeatPosition::Right, bench_type, student));
                fill.right_used += 1;
            }
        }
    }

    fill
}
