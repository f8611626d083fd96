use crate::alphabet::NUM_SYMBOLS;

/// An inclusive interval of vertex ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub lo: usize,
    pub hi: usize,
}

impl Interval {
    pub fn new(lo: usize, hi: usize) -> Self {
        debug_assert!(lo <= hi);
        Self { lo, hi }
    }

    pub fn len(&self) -> usize {
        self.hi - self.lo + 1
    }
}

// appends `interval` to an ascending list, merging adjacent and overlapping
// entries
fn append_merge(list: &mut Vec<Interval>, interval: Interval) {
    if let Some(last) = list.last_mut() {
        debug_assert!(interval.lo >= last.lo);
        if interval.lo <= last.hi + 1 {
            last.hi = last.hi.max(interval.hi);
            return;
        }
    }
    list.push(interval);
}

/// Sorts by lower bound and merges adjacent and overlapping intervals.
pub fn compact_intervals(mut intervals: Vec<Interval>) -> Vec<Interval> {
    intervals.sort_unstable_by_key(|interval| interval.lo);

    let mut compacted = Vec::with_capacity(intervals.len());
    for interval in intervals {
        append_merge(&mut compacted, interval);
    }
    compacted
}

/// A balanced segment tree over `[0, no_keys - 1]` whose every node holds the
/// compacted union of the interval lists stored beneath it.
///
/// A range query decomposes `[start, end]` into `O(log no_keys)` canonical
/// nodes and merges their lists, so the answer comes back as few, already
/// compacted intervals.
pub struct Imt {
    root: Node,
    no_keys: usize,
}

struct Node {
    lo: usize,
    hi: usize,
    intervals: Vec<Interval>,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

impl Imt {
    /// `leaf_intervals[j]` holds the (not necessarily compacted) interval
    /// list of key `j`.
    pub fn new(leaf_intervals: Vec<Vec<Interval>>) -> Self {
        let no_keys = leaf_intervals.len();
        assert!(no_keys > 0);

        let root = build_node(0, no_keys - 1, &leaf_intervals);
        Self { root, no_keys }
    }

    pub fn no_keys(&self) -> usize {
        self.no_keys
    }

    /// The compacted union of the interval lists of keys `start..=end`,
    /// truncated to at most `max_intervals` entries.
    pub fn query(&self, start: usize, end: usize, max_intervals: Option<usize>) -> Vec<Interval> {
        assert!(start <= end && end < self.no_keys);

        let mut merged = Vec::new();
        query_node(&self.root, start, end, max_intervals, &mut merged);

        if let Some(max) = max_intervals {
            merged.truncate(max);
        }
        merged
    }
}

fn build_node(lo: usize, hi: usize, leaf_intervals: &[Vec<Interval>]) -> Node {
    if lo == hi {
        return Node {
            lo,
            hi,
            intervals: compact_intervals(leaf_intervals[lo].clone()),
            left: None,
            right: None,
        };
    }

    let split = (lo + hi) / 2;
    let left = build_node(lo, split, leaf_intervals);
    let right = build_node(split + 1, hi, leaf_intervals);

    let mut intervals = left.intervals.clone();
    intervals.extend_from_slice(&right.intervals);

    Node {
        lo,
        hi,
        intervals: compact_intervals(intervals),
        left: Some(Box::new(left)),
        right: Some(Box::new(right)),
    }
}

// Canonical segment-tree descent. Collection stops once the merged list has
// grown past `max_intervals`: every interval arrives in ascending order, so
// later arrivals can only extend the last entry and the first
// `max_intervals` entries are already final.
fn query_node(
    node: &Node,
    lo: usize,
    hi: usize,
    max_intervals: Option<usize>,
    merged: &mut Vec<Interval>,
) {
    if let Some(max) = max_intervals {
        if merged.len() > max {
            return;
        }
    }

    if lo == node.lo && hi == node.hi {
        for &interval in &node.intervals {
            append_merge(merged, interval);
        }
        return;
    }

    let split = (node.lo + node.hi) / 2;
    let left = node.left.as_deref().expect("inner nodes have two children");
    let right = node.right.as_deref().expect("inner nodes have two children");

    if hi <= split {
        query_node(left, lo, hi, max_intervals, merged);
    } else if lo > split {
        query_node(right, lo, hi, max_intervals, merged);
    } else {
        query_node(left, lo, split, max_intervals, merged);
        query_node(right, split + 1, hi, max_intervals, merged);
    }
}

/// The ordered interval-merge tree: an [`Imt`] whose per-node lists are
/// additionally partitioned by the last label character of the vertex each
/// stored rank refers to.
///
/// This answers the one query backward search needs at vertex boundaries:
/// "over this range of keys, which stored ranks belong to vertices whose
/// label ends in `c`" — without surfacing predecessors that could never
/// extend the match.
pub struct Oimt {
    root: OimtNode,
    no_keys: usize,
}

struct OimtNode {
    lo: usize,
    hi: usize,
    buckets: Vec<Vec<Interval>>,
    left: Option<Box<OimtNode>>,
    right: Option<Box<OimtNode>>,
}

impl Oimt {
    /// Partitions every interval list of `imt` by `rank_last_char_enc`, the
    /// encoded last label character of the vertex at each rank.
    pub fn from_imt(imt: &Imt, rank_last_char_enc: &[u8]) -> Self {
        Self {
            root: partition_node(&imt.root, rank_last_char_enc),
            no_keys: imt.no_keys,
        }
    }

    pub fn no_keys(&self) -> usize {
        self.no_keys
    }

    /// Like [`Imt::query`], restricted to ranks whose vertex label ends in
    /// the symbol encoded as `enc`.
    pub fn query(
        &self,
        start: usize,
        end: usize,
        enc: u8,
        max_intervals: Option<usize>,
    ) -> Vec<Interval> {
        assert!(start <= end && end < self.no_keys);

        let mut merged = Vec::new();
        query_oimt_node(&self.root, start, end, enc, max_intervals, &mut merged);

        if let Some(max) = max_intervals {
            merged.truncate(max);
        }
        merged
    }
}

fn partition_node(node: &Node, rank_last_char_enc: &[u8]) -> OimtNode {
    let mut buckets = vec![Vec::new(); NUM_SYMBOLS];

    for interval in &node.intervals {
        for rank in interval.lo..=interval.hi {
            buckets[rank_last_char_enc[rank] as usize].push(Interval::new(rank, rank));
        }
    }
    for bucket in buckets.iter_mut() {
        *bucket = compact_intervals(std::mem::take(bucket));
    }

    OimtNode {
        lo: node.lo,
        hi: node.hi,
        buckets,
        left: node
            .left
            .as_deref()
            .map(|child| Box::new(partition_node(child, rank_last_char_enc))),
        right: node
            .right
            .as_deref()
            .map(|child| Box::new(partition_node(child, rank_last_char_enc))),
    }
}

fn query_oimt_node(
    node: &OimtNode,
    lo: usize,
    hi: usize,
    enc: u8,
    max_intervals: Option<usize>,
    merged: &mut Vec<Interval>,
) {
    if let Some(max) = max_intervals {
        if merged.len() > max {
            return;
        }
    }

    if lo == node.lo && hi == node.hi {
        for &interval in &node.buckets[enc as usize] {
            append_merge(merged, interval);
        }
        return;
    }

    let split = (node.lo + node.hi) / 2;
    let left = node.left.as_deref().expect("inner nodes have two children");
    let right = node.right.as_deref().expect("inner nodes have two children");

    if hi <= split {
        query_oimt_node(left, lo, hi, enc, max_intervals, merged);
    } else if lo > split {
        query_oimt_node(right, lo, hi, enc, max_intervals, merged);
    } else {
        query_oimt_node(left, lo, split, enc, max_intervals, merged);
        query_oimt_node(right, split + 1, hi, enc, max_intervals, merged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn compaction_merges_overlaps_and_adjacency() {
        let intervals = vec![
            Interval::new(7, 9),
            Interval::new(0, 2),
            Interval::new(3, 4),
            Interval::new(8, 11),
        ];

        assert_eq!(
            compact_intervals(intervals),
            vec![Interval::new(0, 4), Interval::new(7, 11)]
        );
    }

    #[test]
    fn imt_query_unions_leaf_lists() {
        let leaves = vec![
            vec![Interval::new(0, 1)],
            vec![Interval::new(5, 5)],
            vec![Interval::new(2, 3)],
            vec![],
        ];
        let imt = Imt::new(leaves);

        assert_eq!(
            imt.query(0, 3, None),
            vec![Interval::new(0, 3), Interval::new(5, 5)]
        );
        assert_eq!(imt.query(1, 1, None), vec![Interval::new(5, 5)]);
        assert_eq!(imt.query(3, 3, None), vec![]);
    }

    fn brute_force_oimt(
        leaves: &[Vec<Interval>],
        last_chars: &[u8],
        start: usize,
        end: usize,
        enc: u8,
        max_intervals: Option<usize>,
    ) -> Vec<Interval> {
        let mut singletons = Vec::new();
        for leaf in &leaves[start..=end] {
            for interval in leaf {
                for rank in interval.lo..=interval.hi {
                    if last_chars[rank] == enc {
                        singletons.push(Interval::new(rank, rank));
                    }
                }
            }
        }

        let mut compacted = compact_intervals(singletons);
        if let Some(max) = max_intervals {
            compacted.truncate(max);
        }
        compacted
    }

    proptest! {
        #[test]
        fn oimt_query_matches_brute_force(
            seed_leaves in prop::collection::vec(
                prop::collection::vec((0usize..32, 0usize..4), 0..4),
                1..24
            ),
            last_chars in prop::collection::vec(1u8..6, 32),
            queries in prop::collection::vec(
                (0usize..24, 0usize..24, 1u8..6, prop::option::of(0usize..6)),
                1..32
            )
        ) {
            let leaves: Vec<Vec<Interval>> = seed_leaves
                .iter()
                .map(|leaf| {
                    leaf.iter()
                        .map(|&(lo, len)| Interval::new(lo, (lo + len).min(31)))
                        .collect()
                })
                .collect();

            let imt = Imt::new(leaves.clone());
            let oimt = Oimt::from_imt(&imt, &last_chars);

            for &(start, end, enc, max_intervals) in &queries {
                let start = start.min(leaves.len() - 1);
                let end = end.min(leaves.len() - 1);
                let (start, end) = (start.min(end), start.max(end));

                let result = oimt.query(start, end, enc, max_intervals);
                let expected =
                    brute_force_oimt(&leaves, &last_chars, start, end, enc, max_intervals);

                prop_assert_eq!(result, expected);
            }
        }
    }
}
