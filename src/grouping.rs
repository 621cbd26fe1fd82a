use crate::data::{DistributionStrategy, GroupKey, Student};
use itertools::Itertools;
use log::{debug, trace};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, VecDeque};

/// Number of students that land in the first half of a group of `len`.
pub fn first_half_len(len: usize) -> usize {
    len.div_ceil(2)
}

/// Groups students by (year, section) after sorting them by roll.
///
/// `Cycle` keeps roll order. `Block` shuffles the two halves of every group
/// independently; a seed makes the shuffle reproducible. Groups are visited in
/// key order so one RNG stream gives the same result for the same input.
pub fn group_students(
    students: &[Student],
    strategy: DistributionStrategy,
    seed: Option<u64>,
) -> BTreeMap<GroupKey, Vec<Student>> {
    let mut grouped: BTreeMap<GroupKey, Vec<Student>> = students
        .iter()
        .sorted_by(|a, b| a.roll.cmp(&b.roll))
        .map(|s| (s.group_key(), s.clone()))
        .into_group_map()
        .into_iter()
        .collect();

    if strategy == DistributionStrategy::Block {
        let mut rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::seed_from_u64(rand::rng().random()),
        };
        for (key, queue) in grouped.iter_mut() {
            let half = first_half_len(queue.len());
            let (first, second) = queue.split_at_mut(half);
            first.shuffle(&mut rng);
            second.shuffle(&mut rng);
            trace!("Shuffled {} within halves of {} and {}", key, first.len(), second.len());
        }
    }

    debug!(
        "Grouped {} students into {} queues ({:?} distribution)",
        students.len(),
        grouped.len(),
        strategy
    );
    grouped
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Half {
    First,
    Second,
}

impl Half {
    pub fn other(self) -> Self {
        match self {
            Half::First => Half::Second,
            Half::Second => Half::First,
        }
    }
}

/// One group's students split into two drainable halves.
#[derive(Debug, Clone)]
pub struct GroupQueue {
    first: VecDeque<Student>,
    second: VecDeque<Student>,
    /// Half to offer the next time this group is drawn from.
    pub next_half: Half,
}

impl GroupQueue {
    /// `ceil(n/2)` students go to the first half, the rest to the second.
    pub fn split(mut students: Vec<Student>) -> Self {
        let second = students.split_off(first_half_len(students.len()));
        Self {
            first: students.into(),
            second: second.into(),
            next_half: Half::First,
        }
    }

    pub fn remaining(&self) -> usize {
        self.first.len() + self.second.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn half(&self, half: Half) -> &VecDeque<Student> {
        match half {
            Half::First => &self.first,
            Half::Second => &self.second,
        }
    }

    pub fn half_mut(&mut self, half: Half) -> &mut VecDeque<Student> {
        match half {
            Half::First => &mut self.first,
            Half::Second => &mut self.second,
        }
    }

    /// Both halves, `lead` first.
    pub fn halves_mut(&mut self, lead: Half) -> [&mut VecDeque<Student>; 2] {
        match lead {
            Half::First => [&mut self.first, &mut self.second],
            Half::Second => [&mut self.second, &mut self.first],
        }
    }

    /// The non-empty half to draw from, trying `preferred` first.
    pub fn pick_half(&self, preferred: Half) -> Option<Half> {
        [preferred, preferred.other()]
            .into_iter()
            .find(|&h| !self.half(h).is_empty())
    }
}

pub fn split_groups(grouped: BTreeMap<GroupKey, Vec<Student>>) -> BTreeMap<GroupKey, GroupQueue> {
    grouped
        .into_iter()
        .map(|(key, students)| (key, GroupQueue::split(students)))
        .collect()
}
