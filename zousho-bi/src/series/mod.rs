//! Series volume grouping
//!
//! Splits the editions returned for one series search into ordered runs of
//! consecutive volumes. Records are placed one at a time against the groups
//! built so far; each candidate placement is scored with [`rules::RULES`].
//!
//! Group 0 is the ungrouped bucket: records with no volume number that matched
//! nothing. It is reported last, and only when non-empty.

pub mod rules;
pub mod volume;

use serde::{Deserialize, Serialize};
use tracing::trace;
use zousho_common::BookRecord;

pub use rules::{score_breakdown, score_pair, title_matches, ScoringRule, RULES};
pub use volume::{volume_number, UNKNOWN_VOLUME};

/// A record and the volume number it was placed under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedBook {
    pub record: BookRecord,
    pub volume: i64,
}

/// One run of consecutive volumes, or the ungrouped bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesGroup {
    pub books: Vec<GroupedBook>,
    /// True for the bucket of records that could not be placed
    #[serde(default)]
    pub ungrouped: bool,
}

impl SeriesGroup {
    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Volume numbers in group order
    pub fn volumes(&self) -> Vec<i64> {
        self.books.iter().map(|b| b.volume).collect()
    }
}

const BUCKET: usize = 0;

#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: i32,
    group: usize,
    item: usize,
}

/// Group same-series records into ordered volume runs
///
/// Pure: the result depends only on `records` and their order.
pub fn group_by_volume(records: &[BookRecord]) -> Vec<SeriesGroup> {
    let mut groups: Vec<Vec<GroupedBook>> = vec![Vec::new()];

    for record in records {
        place(&mut groups, record);
    }

    let bucket = std::mem::take(&mut groups[BUCKET]);
    let mut output: Vec<SeriesGroup> = groups
        .into_iter()
        .skip(1)
        .map(|books| SeriesGroup {
            books,
            ungrouped: false,
        })
        .collect();
    if !bucket.is_empty() {
        output.push(SeriesGroup {
            books: bucket,
            ungrouped: true,
        });
    }
    output
}

fn candidates(groups: &[Vec<GroupedBook>], record: &BookRecord, volume: i64) -> Vec<Candidate> {
    let mut found = Vec::new();
    for (group, members) in groups.iter().enumerate() {
        let considered = if group == BUCKET {
            0..members.len()
        } else {
            members.len().saturating_sub(1)..members.len()
        };
        for item in considered {
            let member = &members[item];
            if volume::continues(member.volume, volume) {
                found.push(Candidate {
                    score: score_pair(&member.record, record),
                    group,
                    item,
                });
            }
        }
    }
    found
}

fn place(groups: &mut Vec<Vec<GroupedBook>>, record: &BookRecord) {
    let volume = volume_number(record);
    let found = candidates(groups, record, volume);

    let best = found
        .iter()
        .copied()
        .max_by_key(|c| (c.score, c.group, c.item));

    let Some(best) = best.filter(|c| c.score > 0) else {
        let entry = GroupedBook {
            record: record.clone(),
            volume,
        };
        if volume == UNKNOWN_VOLUME {
            groups[BUCKET].push(entry);
        } else {
            groups.push(vec![entry]);
        }
        return;
    };

    let placed = GroupedBook {
        record: record.clone(),
        volume: if volume == UNKNOWN_VOLUME { 1 } else { volume },
    };

    if best.group == BUCKET {
        // Every maximal candidate is in the bucket (ties prefer higher groups)
        let mut graduating: Vec<usize> = found
            .iter()
            .filter(|c| c.score == best.score && c.group == BUCKET)
            .map(|c| c.item)
            .collect();
        graduating.sort_unstable();

        trace!(
            title = %record.display_title(),
            count = graduating.len(),
            "Promoting ungrouped records into a new group"
        );

        let mut group: Vec<GroupedBook> = Vec::with_capacity(graduating.len() + 1);
        for &item in graduating.iter().rev() {
            let mut member = groups[BUCKET].remove(item);
            member.volume = 1;
            group.push(member);
        }
        group.reverse();
        group.push(placed);
        groups.push(group);
        return;
    }

    groups[best.group].push(placed);
}
