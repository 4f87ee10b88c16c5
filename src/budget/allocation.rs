//! Greedy assignment of postings to budget rule occurrences.
//!
//! Everything here works on integer cents. Purposes are settled first, then
//! categories; whatever a posting has left after both stages is unbudgeted.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Scope {
    Purpose(i64),
    Category(i64),
}

/// One due instance of a budget rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Occurrence {
    pub rule_id: i64,
    pub scope: Scope,
    pub due: NaiveDate,
    pub amount: i64,
}

/// A posting that may be allocated.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub posting_id: i64,
    pub booking_date: NaiveDate,
    pub valuta_date: NaiveDate,
    pub amount: i64,
    pub purpose_id: Option<i64>,
    pub category_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    /// Index into the occurrence slice passed to [`allocate`].
    pub occurrence: usize,
    pub posting_id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unbudgeted {
    pub posting_id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    pub matches: Vec<Match>,
    /// Remaining amount per occurrence, parallel to the input slice.
    pub remaining: Vec<i64>,
    pub unbudgeted: Vec<Unbudgeted>,
}

struct Ledger<'a> {
    occurrences: &'a [Occurrence],
    postings: &'a [Candidate],
    occ_left: Vec<i64>,
    post_left: Vec<i64>,
    matches: Vec<Match>,
}

impl Ledger<'_> {
    fn book(&mut self, occ: usize, post: usize, amount: i64) {
        self.occ_left[occ] -= amount;
        self.post_left[post] -= amount;
        self.matches.push(Match {
            occurrence: occ,
            posting_id: self.postings[post].posting_id,
            amount,
        });
    }

    /// Settle one purpose or category. `occs` is ordered by due date,
    /// `posts` by booking date, valuta date and amount.
    fn settle(&mut self, occs: &[usize], posts: &[usize]) {
        // Exact pass
        for &p in posts {
            let want = self.post_left[p];
            if want == 0 {
                continue;
            }
            if let Some(&o) = occs.iter().find(|&&o| self.occ_left[o] == want) {
                self.book(o, p, want);
            }
        }

        // Split pass
        for &p in posts {
            while self.post_left[p] != 0 {
                let left = self.post_left[p];
                let pick = if left > 0 {
                    occs.iter()
                        .copied()
                        .filter(|&o| self.occ_left[o] > 0)
                        .fold(None, |best: Option<usize>, o| match best {
                            Some(b) if self.occ_left[b] >= self.occ_left[o] => Some(b),
                            _ => Some(o),
                        })
                } else {
                    occs.iter()
                        .copied()
                        .filter(|&o| self.occ_left[o] < 0)
                        .fold(None, |best: Option<usize>, o| match best {
                            Some(b) if self.occ_left[b] <= self.occ_left[o] => Some(b),
                            _ => Some(o),
                        })
                };
                let Some(o) = pick else { break };
                let step = left.abs().min(self.occ_left[o].abs()) * left.signum();
                self.book(o, p, step);
            }
        }
    }

    fn stage(&mut self, order: &[usize], scope_ids: &BTreeSet<i64>, purpose: bool) {
        for &id in scope_ids {
            let scope = if purpose { Scope::Purpose(id) } else { Scope::Category(id) };
            let mut occs: Vec<usize> = (0..self.occurrences.len())
                .filter(|&o| self.occurrences[o].scope == scope)
                .collect();
            occs.sort_by_key(|&o| (self.occurrences[o].due, o));
            let posts: Vec<usize> = order
                .iter()
                .copied()
                .filter(|&p| {
                    let c = &self.postings[p];
                    let owner = if purpose { c.purpose_id } else { c.category_id };
                    owner == Some(id) && self.post_left[p] != 0
                })
                .collect();
            if !posts.is_empty() {
                self.settle(&occs, &posts);
            }
        }
    }
}

pub fn allocate(occurrences: &[Occurrence], postings: &[Candidate]) -> Allocation {
    let mut order: Vec<usize> = (0..postings.len()).collect();
    order.sort_by_key(|&p| {
        let c = &postings[p];
        (c.booking_date, c.valuta_date, c.amount, p)
    });

    let mut purposes = BTreeSet::new();
    let mut categories = BTreeSet::new();
    for occ in occurrences {
        match occ.scope {
            Scope::Purpose(id) => purposes.insert(id),
            Scope::Category(id) => categories.insert(id),
        };
    }

    let mut ledger = Ledger {
        occurrences,
        postings,
        occ_left: occurrences.iter().map(|o| o.amount).collect(),
        post_left: postings.iter().map(|p| p.amount).collect(),
        matches: Vec::new(),
    };
    ledger.stage(&order, &purposes, true);
    ledger.stage(&order, &categories, false);

    let unbudgeted = order
        .iter()
        .filter(|&&p| ledger.post_left[p] != 0)
        .map(|&p| Unbudgeted {
            posting_id: postings[p].posting_id,
            amount: ledger.post_left[p],
        })
        .collect();

    Allocation {
        matches: ledger.matches,
        remaining: ledger.occ_left,
        unbudgeted,
    }
}
