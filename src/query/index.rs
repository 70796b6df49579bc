//! Raw query identifiers → dense ids and per-query partitions.
//!
//! Dense ids are assigned in order of first appearance, so the mapping is a
//! deterministic function of the input sequence. Within a group, sample
//! positions are ascending.

use std::collections::HashMap;
use std::hash::Hash;

/// Non-generic partition of sample positions by dense query id.
///
/// Invariant: `groups` is a disjoint cover of `0..dense.len()`, and
/// `groups[q]` contains exactly the positions `i` with `dense[i] == q`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryGroups {
    dense: Vec<usize>,
    groups: Vec<Vec<usize>>,
}

impl QueryGroups {
    /// Dense query id per sample.
    pub fn dense(&self) -> &[usize] {
        &self.dense
    }

    /// Sample positions per dense query id.
    pub fn groups(&self) -> &[Vec<usize>] {
        &self.groups
    }

    pub fn group(&self, query: usize) -> Option<&[usize]> {
        self.groups.get(query).map(Vec::as_slice)
    }

    pub fn query_of(&self, sample: usize) -> Option<usize> {
        self.dense.get(sample).copied()
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    pub fn query_count(&self) -> usize {
        self.groups.len()
    }

    pub fn group_sizes(&self) -> Vec<usize> {
        self.groups.iter().map(Vec::len).collect()
    }
}

/// Ordered bijection between raw query identifiers and dense ids, plus the
/// resulting partition.
#[derive(Debug, Clone)]
pub struct QueryIndex<Q> {
    raw: Vec<Q>,
    lookup: HashMap<Q, usize>,
    groups: QueryGroups,
}

impl<Q: Eq + Hash + Clone> QueryIndex<Q> {
    /// Build the index in a single pass over `qids`.
    pub fn new(qids: &[Q]) -> Self {
        let mut raw: Vec<Q> = Vec::new();
        let mut lookup: HashMap<Q, usize> = HashMap::with_capacity(qids.len());
        let mut dense = Vec::with_capacity(qids.len());
        let mut groups: Vec<Vec<usize>> = Vec::new();

        for (pos, qid) in qids.iter().enumerate() {
            let id = match lookup.get(qid) {
                Some(&id) => id,
                None => {
                    let id = raw.len();
                    raw.push(qid.clone());
                    lookup.insert(qid.clone(), id);
                    groups.push(Vec::new());
                    id
                }
            };
            dense.push(id);
            groups[id].push(pos);
        }

        Self {
            raw,
            lookup,
            groups: QueryGroups { dense, groups },
        }
    }

    /// Dense id for a raw identifier.
    pub fn dense_of(&self, qid: &Q) -> Option<usize> {
        self.lookup.get(qid).copied()
    }

    /// Raw identifier for a dense id.
    pub fn raw_of(&self, query: usize) -> Option<&Q> {
        self.raw.get(query)
    }

    /// Distinct raw identifiers in dense-id order.
    pub fn raw_ids(&self) -> &[Q] {
        &self.raw
    }

    pub fn groups(&self) -> &QueryGroups {
        &self.groups
    }

    pub fn into_groups(self) -> QueryGroups {
        self.groups
    }

    pub fn dense(&self) -> &[usize] {
        self.groups.dense()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn query_count(&self) -> usize {
        self.raw.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_ids_follow_first_appearance() {
        let index = QueryIndex::new(&["q7", "q2", "q7", "q9", "q2", "q2"]);
        assert_eq!(index.dense(), &[0, 1, 0, 2, 1, 1]);
        assert_eq!(index.raw_ids(), &["q7", "q2", "q9"]);
        assert_eq!(index.dense_of(&"q9"), Some(2));
        assert_eq!(index.raw_of(1), Some(&"q2"));
        assert_eq!(index.dense_of(&"missing"), None);
    }

    #[test]
    fn groups_are_a_disjoint_cover() {
        let qids = vec![3u32, 1, 3, 3, 1, 8];
        let index = QueryIndex::new(&qids);
        let groups = index.groups();
        assert_eq!(groups.groups(), &[vec![0, 2, 3], vec![1, 4], vec![5]]);
        assert_eq!(groups.group_sizes(), vec![3, 2, 1]);

        let mut seen: Vec<usize> = groups.groups().iter().flatten().copied().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..qids.len()).collect::<Vec<_>>());

        for (q, members) in groups.groups().iter().enumerate() {
            for &i in members {
                assert_eq!(groups.query_of(i), Some(q));
            }
        }
    }

    #[test]
    fn empty_input_gives_empty_index() {
        let index: QueryIndex<String> = QueryIndex::new(&[]);
        assert!(index.is_empty());
        assert_eq!(index.query_count(), 0);
        assert!(index.groups().groups().is_empty());
    }
}
