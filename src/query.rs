use crate::alphabet;
use crate::encoded_graph::Walk;
use crate::{GraphIndex, Hit};

use std::ops::Range;

/// The raw result of a backward search: the emitted suffix-array intervals
/// of all surviving forks, plus fork statistics.
///
/// A row may be emitted by more than one fork when distinct walks share a
/// start position, so counting and locating operate on the union of the
/// intervals: a match is a distinct `(vid, offset)` start position admitting
/// at least one walk spelling the pattern.
#[derive(Debug, Clone)]
pub struct Matches {
    intervals: Vec<Range<usize>>,
    /// number of forks spawned at vertex boundaries
    pub no_forks: usize,
}

impl Matches {
    pub fn count(&self) -> usize {
        self.union().iter().map(|range| range.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.iter().all(|range| range.is_empty())
    }

    fn union(&self) -> Vec<Range<usize>> {
        let mut intervals = self.intervals.clone();
        intervals.sort_unstable_by_key(|range| range.start);

        let mut union: Vec<Range<usize>> = Vec::with_capacity(intervals.len());
        for range in intervals {
            match union.last_mut() {
                Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
                _ => union.push(range),
            }
        }
        union
    }
}

// a live backward-search state: rows [lo, hi) match pattern[pos..]
struct Fork {
    lo: usize,
    hi: usize,
    pos: usize,
}

impl GraphIndex {
    /// Backward search of `pattern` across the graph, forking at vertex
    /// boundaries.
    ///
    /// Each iteration pops a live fork and ranks both the next pattern
    /// character and the vertex-start marker over its interval in one
    /// superblock fetch. The character range continues the match inside the
    /// current vertex labels; the marker range collects the occurrences
    /// sitting at a label start, which are mapped through the boundary tree
    /// onto one new fork per predecessor rank interval.
    pub fn matches(&self, pattern: &[u8]) -> Matches {
        let mut matches = Matches {
            intervals: Vec::new(),
            no_forks: 0,
        };

        if pattern.is_empty() || !pattern.iter().all(|&c| alphabet::is_label_symbol(c)) {
            return matches;
        }

        let no_vertices = self.graph.vertex_count();

        // seed with the interval of the last pattern character
        let last_enc = alphabet::encode(pattern[pattern.len() - 1]);
        let lo = self.dfmi.f(last_enc);
        let hi = self.dfmi.f(last_enc) + self.dfmi.rank_enc(self.dfmi.text_len() - 1, last_enc);
        if hi <= lo {
            return matches;
        }

        let mut forks = vec![Fork {
            lo,
            hi,
            pos: pattern.len() - 1,
        }];

        while let Some(fork) = forks.pop() {
            if fork.pos == 0 {
                matches.intervals.push(fork.lo..fork.hi);
                continue;
            }

            let enc = alphabet::encode(pattern[fork.pos - 1]);

            let (char_rank_lo, marker_rank_lo) = if fork.lo == 0 {
                (0, 0)
            } else {
                self.dfmi
                    .double_rank_enc(fork.lo - 1, enc, alphabet::SYM_VERTEX_START)
            };
            let (char_rank_hi, marker_rank_hi) =
                self.dfmi
                    .double_rank_enc(fork.hi - 1, enc, alphabet::SYM_VERTEX_START);

            // occurrences at a label start: continue from every predecessor
            // whose label ends with the next pattern character
            if marker_rank_hi > marker_rank_lo {
                let predecessor_ranks =
                    self.oimt
                        .query(marker_rank_lo, marker_rank_hi - 1, enc, None);

                for interval in predecessor_ranks {
                    // the ) rows of these ranks, then one LF step with the
                    // pattern character every row is known to carry
                    let end_row_lo = 1 + no_vertices + interval.lo;
                    let end_row_hi = 1 + no_vertices + interval.hi + 1;

                    let rank_lo = self.dfmi.rank_enc(end_row_lo - 1, enc);
                    let rank_hi = self.dfmi.rank_enc(end_row_hi - 1, enc);
                    debug_assert_eq!(rank_hi - rank_lo, interval.len());

                    forks.push(Fork {
                        lo: self.dfmi.f(enc) + rank_lo,
                        hi: self.dfmi.f(enc) + rank_hi,
                        pos: fork.pos - 1,
                    });
                    matches.no_forks += 1;
                }
            }

            // in-vertex continuation
            let lo = self.dfmi.f(enc) + char_rank_lo;
            let hi = self.dfmi.f(enc) + char_rank_hi;
            if hi > lo {
                forks.push(Fork {
                    lo,
                    hi,
                    pos: fork.pos - 1,
                });
            }
        }

        matches
    }

    /// The number of distinct `(vid, offset)` positions from which `pattern`
    /// can be read as a walk through the graph.
    pub fn count(&self, pattern: &[u8]) -> usize {
        self.matches(pattern).count()
    }

    /// All match start positions, sorted by `(vid, offset)`.
    pub fn locate(&self, pattern: &[u8]) -> Vec<Hit> {
        self.locate_matches(&self.matches(pattern))
    }

    pub fn locate_matches(&self, matches: &Matches) -> Vec<Hit> {
        let mut hits: Vec<Hit> = matches
            .union()
            .into_iter()
            .flat_map(|range| range.map(|row| self.hit_at_row(row)))
            .collect();

        hits.sort_unstable();
        hits
    }

    fn hit_at_row(&self, row: usize) -> Hit {
        let position = self.dfmi.sa_value(row);
        let vid = self
            .vertex_offsets
            .partition_point(|&offset| offset <= position)
            - 1;

        Hit {
            vid,
            // skip the block's opening marker
            offset: (position - self.vertex_offsets[vid]) as usize - 1,
        }
    }

    /// All walks spelling `pattern`, enumerated from every match start in
    /// depth-first order.
    pub fn enumerate(&self, pattern: &[u8]) -> Vec<Walk> {
        self.enumerate_matches(&self.matches(pattern), pattern)
    }

    pub fn enumerate_matches(&self, matches: &Matches, pattern: &[u8]) -> Vec<Walk> {
        let hits = self.locate_matches(matches);

        let Some(encoded_pattern) = self.graph.encode_query(pattern) else {
            return Vec::new();
        };

        hits.iter()
            .flat_map(|hit| {
                self.graph
                    .walk_query(&encoded_pattern, pattern.len(), hit.vid, hit.offset)
            })
            .collect()
    }
}
