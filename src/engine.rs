use crate::allocator::{allocate_paired, allocate_single, pre_allocation_metrics};
use crate::data::{
    AllocationOutput, AllocationRequest, AllocationSummary, BenchType, GroupKey, Room,
    SeatAssignment, Year,
};
use crate::error::AllocationError;
use crate::grouping::{GroupQueue, group_students, split_groups};
use crate::pairing::{Pairing, build_pairings, years_of};
use crate::store::SeatStore;
use itertools::Itertools;
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

/// Seats every student of `request`, room by room, until students or rooms run out.
///
/// Validates the request first and has no side effects.
pub fn allocate(request: &AllocationRequest) -> Result<AllocationOutput, AllocationError> {
    let start_time = Instant::now();
    request.validate()?;

    let total_students = request.students.len();
    let num_rooms = request.rooms.len();
    if total_students == 0 || num_rooms == 0 {
        warn!("No students or rooms; nothing to allocate.");
        return Ok(AllocationOutput {
            assignments: Vec::new(),
            summary: AllocationSummary {
                total_students,
                unseated: total_students,
                ..AllocationSummary::default()
            },
        });
    }

    let (students_per_room, max_per_group_in_room) =
        pre_allocation_metrics(total_students, num_rooms);
    info!(
        "Allocating {} students over {} rooms: students_per_room={}, max_per_group_in_room={}",
        total_students, num_rooms, students_per_room, max_per_group_in_room
    );

    let strategy = request.config.strategy.unwrap_or_default();
    let grouped = group_students(&request.students, strategy, request.config.seed);
    let run = AllocationRun::new(split_groups(grouped));
    let (assignments, rooms_processed) = run.execute(&request.rooms)?;

    let seated_per_year: BTreeMap<Year, usize> = assignments
        .iter()
        .map(|a| a.student.year)
        .counts()
        .into_iter()
        .collect();
    let summary = AllocationSummary {
        total_students,
        total_seats_filled: assignments.len(),
        rooms_processed,
        unseated: total_students - assignments.len(),
        seated_per_year,
    };

    info!(
        "Allocated {} seats across {} rooms in {:.2?} ({} unseated)",
        summary.total_seats_filled,
        summary.rooms_processed,
        start_time.elapsed(),
        summary.unseated
    );
    Ok(AllocationOutput {
        assignments,
        summary,
    })
}

/// Runs [`allocate`] and replaces the stored seats of `allocation_id` with the result.
///
/// Nothing is written unless the whole allocation succeeds.
pub fn allocate_and_store(
    store: &dyn SeatStore,
    allocation_id: &str,
    request: &AllocationRequest,
) -> Result<AllocationOutput, AllocationError> {
    let output = allocate(request)?;
    store.replace_allocation(allocation_id, output.assignments.clone())?;
    debug!(
        "Stored {} seats for allocation {}",
        output.assignments.len(),
        allocation_id
    );
    Ok(output)
}

/// State of one allocation pass. Built fresh per call, never shared.
pub struct AllocationRun {
    groups: BTreeMap<GroupKey, GroupQueue>,
    /// Next pairing to try in multi-year rooms.
    pairing_idx: usize,
    /// Next group to try in single-year rooms.
    group_idx: usize,
}

impl AllocationRun {
    pub fn new(groups: BTreeMap<GroupKey, GroupQueue>) -> Self {
        Self {
            groups,
            pairing_idx: 0,
            group_idx: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.groups.values().map(GroupQueue::remaining).sum()
    }

    fn has_students(&self, key: &GroupKey) -> bool {
        self.groups.get(key).is_some_and(|g| !g.is_empty())
    }

    fn available_groups(&self) -> BTreeSet<GroupKey> {
        self.groups
            .iter()
            .filter(|(_, g)| !g.is_empty())
            .map(|(key, _)| *key)
            .collect()
    }

    /// Fills `rooms` in order. Returns the seats and the number of rooms that got any.
    pub fn execute(
        mut self,
        rooms: &[Room],
    ) -> Result<(Vec<SeatAssignment>, usize), AllocationError> {
        let mut assignments = Vec::new();
        let mut rooms_processed = 0;

        for (room_index, room) in rooms.iter().enumerate() {
            if self.remaining() == 0 {
                info!(
                    "No students remaining; stopping allocation after {} rooms",
                    rooms_processed
                );
                break;
            }

            // groups drain as rooms fill, so pairings are rebuilt for every room
            let available = self.available_groups();
            let years = years_of(&available);
            let pairings = build_pairings(&available);
            debug!(
                "Room {}: available groups [{}], years {:?}, {} pairings",
                room.id,
                available.iter().join(", "),
                years,
                pairings.len()
            );

            let bench_type = BenchType::for_room(room_index);
            let room_assignments = if years.len() == 1 {
                self.fill_single_year(room, bench_type, &available)?
            } else {
                self.fill_paired(room, bench_type, &pairings, &years)?
            };

            if room_assignments.is_empty() {
                info!("Room {}: no assignments made, skipping", room.id);
                continue;
            }
            assignments.extend(room_assignments);
            rooms_processed += 1;
        }

        Ok((assignments, rooms_processed))
    }

    /// One group per room, one student per bench.
    fn fill_single_year(
        &mut self,
        room: &Room,
        bench_type: BenchType,
        available: &BTreeSet<GroupKey>,
    ) -> Result<Vec<SeatAssignment>, AllocationError> {
        let no_group = || AllocationError::NoGroupAvailable {
            room: room.id.clone(),
        };
        let order: Vec<GroupKey> = available.iter().copied().collect();

        let mut selected = None;
        for _ in 0..order.len() {
            let candidate = order[self.group_idx % order.len()];
            self.group_idx += 1;
            if self.has_students(&candidate) {
                selected = Some(candidate);
                break;
            }
        }
        let key = selected.ok_or_else(no_group)?;
        let group = self.groups.get_mut(&key).ok_or_else(no_group)?;
        let half = group.pick_half(group.next_half).ok_or_else(no_group)?;
        let limit = group.remaining();

        info!(
            "Room {}: single year group {}, half {:?}, bench type {}, remaining {}",
            room.id, key, half, bench_type, limit
        );

        let preferred_len = group.half(half).len();
        let (assignments, used) =
            allocate_single(room, &mut group.halves_mut(half), bench_type, limit);
        // a spill into the other half makes that the half this room ended on
        let ended_on = if used > preferred_len { half.other() } else { half };
        group.next_half = ended_on.other();
        Ok(assignments)
    }

    /// Next pairing with students on both sides, left and right from complementary halves.
    fn fill_paired(
        &mut self,
        room: &Room,
        bench_type: BenchType,
        pairings: &[Pairing],
        years: &[Year],
    ) -> Result<Vec<SeatAssignment>, AllocationError> {
        let no_pairing = || AllocationError::NoPairingAvailable {
            room: room.id.clone(),
            years: years.to_vec(),
        };

        let n = pairings.len();
        let selected = (0..n)
            .map(|i| (self.pairing_idx + i) % n)
            .find(|&idx| {
                self.has_students(&pairings[idx].left) && self.has_students(&pairings[idx].right)
            })
            .ok_or_else(no_pairing)?;
        self.pairing_idx = (selected + 1) % n;
        let pairing = pairings[selected];

        // taken out of the map so both groups can be borrowed mutably
        let mut right_group = self.groups.remove(&pairing.right).ok_or_else(no_pairing)?;
        let fill = self.groups.get_mut(&pairing.left).and_then(|left_group| {
            let left_pref = left_group.next_half;
            let left_half = left_group.pick_half(left_pref)?;
            let right_half = right_group.pick_half(left_pref.other())?;

            let left_queue = left_group.half_mut(left_half);
            let right_queue = right_group.half_mut(right_half);
            let (left_limit, right_limit) = (left_queue.len(), right_queue.len());

            info!(
                "Room {}: pairing {} ({:?}, {}) + {} ({:?}, {}), bench type {}",
                room.id,
                pairing.left,
                left_half,
                left_limit,
                pairing.right,
                right_half,
                right_limit,
                bench_type
            );

            let fill = allocate_paired(
                room,
                left_queue,
                right_queue,
                bench_type,
                left_limit,
                right_limit,
            );
            left_group.next_half = left_half.other();
            right_group.next_half = right_half.other();
            Some(fill)
        });
        self.groups.insert(pairing.right, right_group);

        let fill = fill.ok_or_else(no_pairing)?;
        debug!(
            "Room {}: seated {} left and {} right",
            room.id, fill.left_used, fill.right_used
        );
        Ok(fill.assignments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AllocationConfig, DistributionStrategy, SeatPosition, Student};
    use crate::grouping::Half;
    use std::collections::HashSet;

    fn student(roll: &str, year: Year, section: char) -> Student {
        Student {
            roll: roll.to_string(),
            name: format!("Student {roll}"),
            year,
            section,
            department: None,
        }
    }

    fn group(year: Year, section: char, n: usize) -> Vec<Student> {
        (1..=n)
            .map(|i| student(&format!("{year}{section}{i:03}"), year, section))
            .collect()
    }

    fn room(id: &str, rows: u32, cols: u32) -> Room {
        Room {
            id: id.to_string(),
            rows,
            cols,
        }
    }

    fn request(
        students: Vec<Student>,
        rooms: Vec<Room>,
        strategy: DistributionStrategy,
        seed: Option<u64>,
    ) -> AllocationRequest {
        AllocationRequest {
            students,
            rooms,
            config: AllocationConfig {
                strategy: Some(strategy),
                seed,
                flip_lr: false,
            },
        }
    }

    fn in_room<'a>(output: &'a AllocationOutput, room_id: &str) -> Vec<&'a SeatAssignment> {
        output
            .assignments
            .iter()
            .filter(|a| a.room_id == room_id)
            .collect()
    }

    #[test]
    fn single_year_group_fills_one_room_and_stops() {
        let req = request(
            group(1, 'A', 5),
            vec![room("R1", 3, 2), room("R2", 3, 2)],
            DistributionStrategy::Cycle,
            None,
        );
        let output = allocate(&req).unwrap();

        let seats = in_room(&output, "R1");
        assert_eq!(seats.len(), 5);
        assert!(seats.iter().all(|a| a.position == SeatPosition::Left));
        assert_eq!(
            seats.iter().map(|a| a.bench_no).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
        assert_eq!(
            seats.iter().map(|a| a.student.roll.as_str()).collect::<Vec<_>>(),
            vec!["1A001", "1A002", "1A003", "1A004", "1A005"]
        );
        assert!(in_room(&output, "R2").is_empty());
        assert_eq!(output.summary.rooms_processed, 1);
        assert_eq!(output.summary.total_seats_filled, 5);
        assert_eq!(output.summary.unseated, 0);
    }

    #[test]
    fn single_year_groups_take_rooms_in_turn() {
        let students = [group(1, 'A', 4), group(1, 'B', 4)].concat();
        let rooms: Vec<Room> = (1..=4).map(|i| room(&format!("R{i}"), 2, 1)).collect();
        let output =
            allocate(&request(students, rooms, DistributionStrategy::Cycle, None)).unwrap();

        let expected = [
            ["1A001", "1A002"],
            ["1B001", "1B002"],
            ["1A003", "1A004"],
            ["1B003", "1B004"],
        ];
        for (i, rolls) in expected.iter().enumerate() {
            let seats = in_room(&output, &format!("R{}", i + 1));
            assert!(seats.iter().all(|a| a.position == SeatPosition::Left));
            assert_eq!(
                seats.iter().map(|a| a.student.roll.as_str()).collect::<Vec<_>>(),
                rolls.to_vec(),
                "room R{}",
                i + 1
            );
        }
        assert_eq!(output.summary.rooms_processed, 4);
        assert_eq!(output.summary.unseated, 0);
    }

    #[test]
    fn single_year_spill_toggles_from_the_half_it_ended_on() {
        let grouped = group_students(&group(1, 'A', 5), DistributionStrategy::Cycle, None);
        let mut run = AllocationRun::new(split_groups(grouped));
        let key = GroupKey::new(1, 'A');
        let available = BTreeSet::from([key]);

        // 4 benches: the 3-student first half, then one from the second
        let seats = run
            .fill_single_year(&room("R1", 4, 1), BenchType::A, &available)
            .unwrap();
        assert_eq!(seats.len(), 4);
        assert_eq!(run.groups[&key].next_half, Half::First);

        let grouped = group_students(&group(1, 'A', 5), DistributionStrategy::Cycle, None);
        let mut run = AllocationRun::new(split_groups(grouped));
        run.fill_single_year(&room("R1", 2, 1), BenchType::A, &available)
            .unwrap();
        assert_eq!(run.groups[&key].next_half, Half::Second);
    }

    #[test]
    fn three_years_consume_pairings_round_robin() {
        let mut students = Vec::new();
        for year in 1..=3 {
            for section in ['A', 'B'] {
                students.extend(group(year, section, 8));
            }
        }
        // no group drains within six rooms, so the pairing list never shrinks
        let rooms: Vec<Room> = (1..=6).map(|i| room(&format!("R{i}"), 2, 1)).collect();
        let output =
            allocate(&request(students, rooms, DistributionStrategy::Cycle, None)).unwrap();

        let expected = [
            ((1, 'A'), (2, 'B')),
            ((2, 'B'), (3, 'A')),
            ((3, 'A'), (1, 'B')),
            ((1, 'B'), (2, 'A')),
            ((2, 'A'), (3, 'B')),
            ((3, 'B'), (1, 'A')),
        ];
        for (i, (left, right)) in expected.iter().enumerate() {
            let seats = in_room(&output, &format!("R{}", i + 1));
            assert_eq!(seats.len(), 4, "room R{}", i + 1);
            for seat in seats {
                let key = (seat.student.year, seat.student.section);
                match seat.position {
                    SeatPosition::Left => assert_eq!(key, *left),
                    SeatPosition::Right => assert_eq!(key, *right),
                }
            }
        }
        assert_eq!(output.summary.rooms_processed, 6);
        assert_eq!(output.summary.total_seats_filled, 24);
        assert_eq!(output.summary.unseated, 24);
        assert_eq!(
            output.summary.seated_per_year,
            BTreeMap::from([(1, 8), (2, 8), (3, 8)])
        );
    }

    #[test]
    fn paired_groups_draw_complementary_halves() {
        let students = [group(1, 'A', 6), group(2, 'A', 6)].concat();
        let output = allocate(&request(
            students,
            vec![room("R1", 10, 1)],
            DistributionStrategy::Cycle,
            None,
        ))
        .unwrap();

        let rolls = |pos: SeatPosition| -> Vec<String> {
            output
                .assignments
                .iter()
                .filter(|a| a.position == pos)
                .map(|a| a.student.roll.clone())
                .collect()
        };
        assert_eq!(rolls(SeatPosition::Left), vec!["1A001", "1A002", "1A003"]);
        assert_eq!(rolls(SeatPosition::Right), vec!["2A004", "2A005", "2A006"]);
        assert_eq!(output.summary.unseated, 6);
    }

    #[test]
    fn leftover_single_year_follows_multi_year_rooms() {
        let students = [group(1, 'A', 2), group(2, 'A', 6)].concat();
        let output = allocate(&request(
            students,
            vec![room("R1", 4, 1), room("R2", 4, 1), room("R3", 4, 1)],
            DistributionStrategy::Cycle,
            None,
        ))
        .unwrap();

        // R1 pairs 1A (first half) with 2A (second half)
        assert_eq!(in_room(&output, "R1").len(), 4);
        // R2 still has both years: 1A second half with 2A first half
        assert_eq!(in_room(&output, "R2").len(), 4);
        assert_eq!(output.summary.total_seats_filled, 8);
        assert!(in_room(&output, "R3").is_empty());
    }

    #[test]
    fn capacity_shortfall_reports_unseated() {
        let students = [group(1, 'A', 10), group(2, 'B', 10)].concat();
        let output = allocate(&request(
            students,
            vec![room("R1", 2, 2)],
            DistributionStrategy::Block,
            Some(3),
        ))
        .unwrap();

        assert_eq!(output.summary.total_seats_filled, 8);
        assert_eq!(output.summary.unseated, 12);
    }

    #[test]
    fn no_student_is_placed_twice_and_no_bench_shares_a_year() {
        let mut students = Vec::new();
        for (year, section, n) in [(1, 'A', 13), (1, 'B', 7), (2, 'A', 9), (3, 'B', 11)] {
            students.extend(group(year, section, n));
        }
        let rooms = vec![
            room("R1", 3, 3),
            room("R2", 4, 2),
            room("R3", 2, 5),
            room("R4", 5, 5),
        ];
        let output =
            allocate(&request(students, rooms, DistributionStrategy::Block, Some(11))).unwrap();

        let mut seen = HashSet::new();
        for seat in &output.assignments {
            assert!(
                seen.insert(seat.student.roll.clone()),
                "{} seated twice",
                seat.student.roll
            );
        }
        let benches = output
            .assignments
            .iter()
            .into_group_map_by(|a| (a.room_id.clone(), a.bench_no));
        for seats in benches.values() {
            assert!(seats.len() <= 2);
            if let [a, b] = seats.as_slice() {
                assert_ne!(a.student.year, b.student.year);
            }
        }
        assert_eq!(output.summary.total_seats_filled + output.summary.unseated, 40);
    }

    #[test]
    fn cycle_places_each_half_in_roll_order() {
        let students = [group(1, 'A', 9), group(2, 'B', 7), group(3, 'A', 8)].concat();
        let rooms: Vec<Room> = (1..=24).map(|i| room(&format!("R{i}"), 2, 1)).collect();
        let output =
            allocate(&request(students, rooms, DistributionStrategy::Cycle, None)).unwrap();
        assert_eq!(output.summary.unseated, 0);

        for (key, size) in [((1, 'A'), 9usize), ((2, 'B'), 7), ((3, 'A'), 8)] {
            let placed: Vec<&str> = output
                .assignments
                .iter()
                .filter(|a| (a.student.year, a.student.section) == key)
                .map(|a| a.student.roll.as_str())
                .collect();
            let split = size.div_ceil(2);
            let expected = group(key.0, key.1, size);
            let (first, second): (Vec<&str>, Vec<&str>) = placed
                .into_iter()
                .partition(|roll| expected[..split].iter().any(|s| s.roll == *roll));
            let expected_rolls: Vec<&str> = expected.iter().map(|s| s.roll.as_str()).collect();
            assert_eq!(first, expected_rolls[..split]);
            assert_eq!(second, expected_rolls[split..]);
        }
    }

    #[test]
    fn block_is_reproducible_with_seed_and_cycle_ignores_it() {
        let students = [group(1, 'A', 12), group(2, 'A', 12), group(2, 'B', 5)].concat();
        let rooms = vec![room("R1", 3, 2), room("R2", 3, 2), room("R3", 3, 2)];

        let run = |strategy, seed| {
            allocate(&request(students.clone(), rooms.clone(), strategy, seed)).unwrap()
        };

        assert_eq!(
            run(DistributionStrategy::Block, Some(5)),
            run(DistributionStrategy::Block, Some(5))
        );
        assert_eq!(
            run(DistributionStrategy::Cycle, Some(1)),
            run(DistributionStrategy::Cycle, Some(2))
        );
    }

    #[test]
    fn empty_inputs_produce_empty_summary() {
        let output = allocate(&request(
            group(1, 'A', 3),
            Vec::new(),
            DistributionStrategy::Cycle,
            None,
        ))
        .unwrap();
        assert!(output.assignments.is_empty());
        assert_eq!(output.summary.unseated, 3);
        assert_eq!(output.summary.rooms_processed, 0);

        let output = allocate(&request(
            Vec::new(),
            vec![room("R1", 2, 2)],
            DistributionStrategy::Cycle,
            None,
        ))
        .unwrap();
        assert_eq!(output.summary, AllocationSummary::default());
    }

    #[test]
    fn invalid_room_rejects_before_seating() {
        let err = allocate(&request(
            group(1, 'A', 3),
            vec![room("R1", 2, 0)],
            DistributionStrategy::Cycle,
            None,
        ))
        .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn failed_run_leaves_stored_seats_untouched() {
        use crate::store::InMemorySeatStore;

        let store = InMemorySeatStore::new();
        let good = request(
            group(1, 'A', 3),
            vec![room("R1", 2, 2)],
            DistributionStrategy::Cycle,
            None,
        );
        allocate_and_store(&store, "exam", &good).unwrap();

        let bad = request(
            group(1, 'A', 5),
            vec![room("R1", 0, 2)],
            DistributionStrategy::Cycle,
            None,
        );
        assert!(allocate_and_store(&store, "exam", &bad).is_err());
        assert_eq!(store.load_allocation("exam").unwrap().map(|s| s.len()), Some(3));
    }

    #[test]
    fn missing_pairing_with_two_years_is_fatal() {
        let grouped = group_students(
            &[group(1, 'A', 2), group(2, 'A', 2)].concat(),
            DistributionStrategy::Cycle,
            None,
        );
        let mut run = AllocationRun::new(split_groups(grouped));
        let err = run
            .fill_paired(&room("R1", 2, 2), BenchType::A, &[], &[1, 2])
            .unwrap_err();
        assert!(matches!(err, AllocationError::NoPairingAvailable { .. }));
        assert!(err.to_string().contains("no students available for remaining pairing"));
    }

    #[test]
    fn exhausted_pairing_is_fatal_instead_of_guessing() {
        let grouped = group_students(&group(1, 'A', 2), DistributionStrategy::Cycle, None);
        let mut run = AllocationRun::new(split_groups(grouped));
        let ghost = Pairing::new(GroupKey::new(1, 'A'), GroupKey::new(2, 'B'));
        let err = run
            .fill_paired(&room("R1", 2, 2), BenchType::A, &[ghost], &[1, 2])
            .unwrap_err();
        assert!(matches!(err, AllocationError::NoPairingAvailable { .. }));
        assert_eq!(run.remaining(), 2);
    }
}
