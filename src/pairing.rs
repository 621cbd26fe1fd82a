use crate::data::{GroupKey, Year};
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet};

/// Two groups allowed to share benches: `left` takes the left seat, `right` the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    pub left: GroupKey,
    pub right: GroupKey,
}

impl Pairing {
    pub const fn new(left: GroupKey, right: GroupKey) -> Self {
        Self { left, right }
    }
}

/// Years present in `groups`, ascending.
pub fn years_of(groups: &BTreeSet<GroupKey>) -> Vec<Year> {
    groups.iter().map(|g| g.year).dedup().collect()
}

/// Builds the bench pairings for the groups that still hold students.
///
/// - three years: the fixed six-step cycle 1A+2B, 2B+3A, 3A+1B, 1B+2A, 2A+3B,
///   3B+1A (over the actual year values), keeping only present groups. If none
///   survive, falls back to year pairs (y1,y2), (y2,y3), (y3,y1) on each year's
///   first section.
/// - two years: every section of the lower year with every section of the upper.
/// - one year or none: empty, single-year seating takes over.
pub fn build_pairings(groups: &BTreeSet<GroupKey>) -> Vec<Pairing> {
    // BTreeSet iteration is sorted, so sections come out ascending per year
    let sections: BTreeMap<Year, Vec<char>> = groups
        .iter()
        .map(|g| (g.year, g.section))
        .into_group_map()
        .into_iter()
        .collect();
    let years: Vec<Year> = sections.keys().copied().collect();

    match years.as_slice() {
        &[y1, y2, y3] => {
            let preferred = [
                ((y1, 'A'), (y2, 'B')),
                ((y2, 'B'), (y3, 'A')),
                ((y3, 'A'), (y1, 'B')),
                ((y1, 'B'), (y2, 'A')),
                ((y2, 'A'), (y3, 'B')),
                ((y3, 'B'), (y1, 'A')),
            ];
            let pairings: Vec<Pairing> = preferred
                .into_iter()
                .map(|((ly, ls), (ry, rs))| {
                    Pairing::new(GroupKey::new(ly, ls), GroupKey::new(ry, rs))
                })
                .filter(|p| groups.contains(&p.left) && groups.contains(&p.right))
                .collect();
            if !pairings.is_empty() {
                return pairings;
            }

            // unusual section labels
            [(y1, y2), (y2, y3), (y3, y1)]
                .into_iter()
                .filter_map(|(ly, ry)| {
                    let ls = sections.get(&ly)?.first()?;
                    let rs = sections.get(&ry)?.first()?;
                    Some(Pairing::new(GroupKey::new(ly, *ls), GroupKey::new(ry, *rs)))
                })
                .collect()
        }
        &[y1, y2] => sections[&y1]
            .iter()
            .cartesian_product(sections[&y2].iter())
            .map(|(&ls, &rs)| Pairing::new(GroupKey::new(y1, ls), GroupKey::new(y2, rs)))
            .collect(),
        _ => Vec::new(),
    }
}
