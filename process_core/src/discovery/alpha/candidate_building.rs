use std::collections::{BTreeMap, BTreeSet, HashSet};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::dfg::dfg_struct::DirectlyFollowsGraph;

/// Place candidate `(A, B)` of sorted activity indices: every `a ∈ A` is causally followed by
/// every `b ∈ B`
pub type AlphaPair = (Vec<usize>, Vec<usize>);

///
/// Footprint relations of a [`DirectlyFollowsGraph`] over sorted activity indices
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlphaAbstraction {
    /// Activities (sorted), indexed by position
    pub activities: Vec<String>,
    /// Start activities
    pub start_activities: BTreeSet<usize>,
    /// End activities
    pub end_activities: BTreeSet<usize>,
    /// Directly-follows relations with a positive frequency
    pub dfg: BTreeSet<(usize, usize)>,
    /// `(a, b)` with `a > b` but not `b > a`
    pub causal: BTreeSet<(usize, usize)>,
    /// `(a, b)` with both `a > b` and `b > a`
    pub parallel: BTreeSet<(usize, usize)>,
}

impl AlphaAbstraction {
    /// Compute the footprint relations of `dfg`
    pub fn from_dfg(dfg: &DirectlyFollowsGraph) -> Self {
        let mut activities: Vec<String> = dfg.activities.keys().cloned().collect();
        for ((a, b), w) in &dfg.directly_follows_relations {
            if *w > 0 {
                activities.push(a.clone());
                activities.push(b.clone());
            }
        }
        activities.sort();
        activities.dedup();
        let index_of = |a: &str| activities.binary_search_by(|x| x.as_str().cmp(a)).ok();

        let df: BTreeSet<(usize, usize)> = dfg
            .directly_follows_relations
            .iter()
            .filter(|(_, w)| **w > 0)
            .filter_map(|((a, b), _)| Some((index_of(a)?, index_of(b)?)))
            .collect();
        let causal = df
            .iter()
            .filter(|(a, b)| !df.contains(&(*b, *a)))
            .copied()
            .collect();
        let parallel = df
            .iter()
            .filter(|(a, b)| df.contains(&(*b, *a)))
            .copied()
            .collect();
        let collect_acts = |m: &BTreeMap<String, u64>| -> BTreeSet<usize> {
            m.iter()
                .filter(|(_, w)| **w > 0)
                .filter_map(|(a, _)| index_of(a))
                .collect()
        };
        let start_activities = collect_acts(&dfg.start_activities);
        let end_activities = collect_acts(&dfg.end_activities);
        Self {
            activities,
            start_activities,
            end_activities,
            dfg: df,
            causal,
            parallel,
        }
    }

    /// Activity names of activity indices
    pub fn acts_to_names(&self, acts: &[usize]) -> Vec<&str> {
        acts.iter().map(|a| self.activities[*a].as_str()).collect()
    }

    /// Whether `a` and `b` never directly follow each other (in both directions)
    pub fn unrelated(&self, a: usize, b: usize) -> bool {
        !self.dfg.contains(&(a, b)) && !self.dfg.contains(&(b, a))
    }

    ///
    /// Whether `(A, B)` is a valid place candidate
    ///
    /// All pairs of `A × B` are causal and the activities within `A` (and within `B`) are pairwise
    /// unrelated, including themselves (no self-loops).
    pub fn is_valid_pair(&self, a: &[usize], b: &[usize]) -> bool {
        a.iter()
            .all(|x| b.iter().all(|y| self.causal.contains(&(*x, *y))))
            && a.iter().all(|x| a.iter().all(|y| self.unrelated(*x, *y)))
            && b.iter().all(|x| b.iter().all(|y| self.unrelated(*x, *y)))
    }
}

fn is_subset(small: &[usize], large: &[usize]) -> bool {
    small.iter().all(|x| large.binary_search(x).is_ok())
}

fn merge(left: &[usize], right: &[usize]) -> Vec<usize> {
    let mut merged = [left, right].concat();
    merged.sort_unstable();
    merged.dedup();
    merged
}

///
/// Build all place candidates as a fix-point
///
/// Seeds are the causal pairs of activities without self-loops. Two candidates
/// `(A₁, B₁)`, `(A₂, B₂)` with `A₁ ⊆ A₂` or `B₁ ⊆ B₂` are merged into `(A₁ ∪ A₂, B₁ ∪ B₂)` if the
/// result is a valid pair. Only newly found candidates are combined in the next round, so the
/// computation stops once a round adds nothing. The result does not depend on enumeration order.
pub fn build_candidates(abstraction: &AlphaAbstraction) -> HashSet<AlphaPair> {
    let mut cnds: HashSet<AlphaPair> = abstraction
        .causal
        .iter()
        .filter(|(a, b)| {
            !abstraction.parallel.contains(&(*a, *a)) && !abstraction.parallel.contains(&(*b, *b))
        })
        .map(|(a, b)| (vec![*a], vec![*b]))
        .collect();

    let mut new_cnds: Vec<AlphaPair> = cnds.iter().cloned().collect();
    while !new_cnds.is_empty() {
        let all_cnds: Vec<&AlphaPair> = cnds.iter().collect();
        let added: HashSet<AlphaPair> = new_cnds
            .par_iter()
            .flat_map(|(a1, b1)| {
                all_cnds
                    .par_iter()
                    .filter_map(|(a2, b2)| {
                        let comparable = is_subset(a1, a2)
                            || is_subset(a2, a1)
                            || is_subset(b1, b2)
                            || is_subset(b2, b1);
                        if !comparable {
                            return None;
                        }
                        let pair = (merge(a1, a2), merge(b1, b2));
                        if cnds.contains(&pair) || !abstraction.is_valid_pair(&pair.0, &pair.1) {
                            return None;
                        }
                        Some(pair)
                    })
                    .collect::<HashSet<AlphaPair>>()
            })
            .collect();
        cnds.extend(added.iter().cloned());
        new_cnds = added.into_iter().collect();
    }
    cnds
}

///
/// Keep only the maximal candidates
///
/// `(A, B)` is dropped if another candidate `(A', B')` with `A ⊆ A'` and `B ⊆ B'` exists.
/// The result is sorted.
pub fn maximal_pairs(cnds: &HashSet<AlphaPair>) -> Vec<AlphaPair> {
    let mut maximal: Vec<AlphaPair> = cnds
        .par_iter()
        .filter(|(a, b)| {
            !cnds
                .iter()
                .any(|(a2, b2)| (a2 != a || b2 != b) && is_subset(a, a2) && is_subset(b, b2))
        })
        .cloned()
        .collect();
    maximal.sort();
    maximal
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abstraction_of(traces: &[Vec<&str>]) -> AlphaAbstraction {
        AlphaAbstraction::from_dfg(&DirectlyFollowsGraph::from_activity_sequences(traces))
    }

    #[test]
    fn footprint_relations() {
        let abs = abstraction_of(&[vec!["a", "b", "c", "d"], vec!["a", "c", "b", "d"]]);
        assert_eq!(abs.activities, vec!["a", "b", "c", "d"]);
        assert_eq!(abs.dfg.len(), 6);
        assert_eq!(
            abs.parallel,
            [(1, 2), (2, 1)].into_iter().collect::<BTreeSet<_>>()
        );
        assert_eq!(
            abs.causal,
            [(0, 1), (0, 2), (1, 3), (2, 3)].into_iter().collect::<BTreeSet<_>>()
        );
        assert_eq!(abs.start_activities, [0].into_iter().collect());
        assert_eq!(abs.end_activities, [3].into_iter().collect());
    }

    #[test]
    fn choice_pairs_are_merged() {
        // a then (b or c) then d
        let abs = abstraction_of(&[vec!["a", "b", "d"], vec!["a", "c", "d"]]);
        let cnds = build_candidates(&abs);
        assert!(cnds.contains(&(vec![0], vec![1, 2])));
        assert!(cnds.contains(&(vec![1, 2], vec![3])));
        assert_eq!(
            maximal_pairs(&cnds),
            vec![(vec![0], vec![1, 2]), (vec![1, 2], vec![3])]
        );
    }

    #[test]
    fn self_loops_are_not_seeded() {
        let abs = abstraction_of(&[vec!["a", "b", "b", "c"]]);
        let cnds = build_candidates(&abs);
        assert_eq!(
            cnds,
            HashSet::new(),
            "b is parallel to itself, so neither (a, b) nor (b, c) is a place"
        );
    }

    #[test]
    fn maximal_pairs_form_an_antichain() {
        let abs = abstraction_of(&[
            vec!["a", "b", "e"],
            vec!["a", "c", "e"],
            vec!["a", "d", "e"],
            vec!["a", "b", "f"],
        ]);
        let maximal = maximal_pairs(&build_candidates(&abs));
        for (i, (a1, b1)) in maximal.iter().enumerate() {
            for (j, (a2, b2)) in maximal.iter().enumerate() {
                if i != j {
                    assert!(!(is_subset(a1, a2) && is_subset(b1, b2)));
                }
            }
        }
    }
}
