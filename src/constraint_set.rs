use crate::graph::Graph;

use std::collections::BTreeSet;

/// A prefix of length `1..=max_depth` readable by entering some vertex,
/// together with the sorted set of vertices it can be read from.
///
/// Vertices sharing a constraint would occupy adjacent rows in the ideal
/// Burrows-Wheeler order, so the annealing optimizer uses these sets as its
/// clustering objective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintSet {
    pub prefix: Vec<u8>,
    pub vertices: Vec<usize>,
}

// a partial forward read: started at `head`, currently at position `pos` of
// the label of `end`
#[derive(Debug, Clone, Copy)]
struct PrefixPath {
    head: usize,
    end: usize,
    pos: usize,
}

/// Enumerates all constraint sets of the graph up to `max_depth`.
///
/// With `multiple_vertex_span`, prefixes may continue across vertex
/// boundaries: a path whose current label is exhausted forks over every
/// outgoing neighbor before the next character is read.
///
/// The result is sorted by prefix length, ties broken lexicographically.
pub fn enumerate_constraint_sets(
    graph: &Graph,
    max_depth: usize,
    multiple_vertex_span: bool,
) -> Vec<ConstraintSet> {
    let mut char_set = BTreeSet::new();
    for vid in 0..graph.vertex_count() {
        char_set.extend(graph.label(vid).iter().copied());
    }
    let alphabet: Vec<u8> = char_set.into_iter().collect();

    let mut char_to_bucket = [usize::MAX; 256];
    for (i, &c) in alphabet.iter().enumerate() {
        char_to_bucket[c as usize] = i;
    }

    let paths = (0..graph.vertex_count())
        .map(|vid| PrefixPath {
            head: vid,
            end: vid,
            pos: 0,
        })
        .collect();

    let mut constraints = Vec::new();
    extract(
        graph,
        paths,
        &Vec::new(),
        &alphabet,
        &char_to_bucket,
        max_depth,
        multiple_vertex_span,
        &mut constraints,
    );

    constraints.sort_by(|a, b| {
        a.prefix
            .len()
            .cmp(&b.prefix.len())
            .then_with(|| a.prefix.cmp(&b.prefix))
    });
    constraints
}

#[allow(clippy::too_many_arguments)]
fn extract(
    graph: &Graph,
    paths: Vec<PrefixPath>,
    prefix: &[u8],
    alphabet: &[u8],
    char_to_bucket: &[usize; 256],
    max_depth: usize,
    multiple_vertex_span: bool,
    constraints: &mut Vec<ConstraintSet>,
) {
    let mut buckets: Vec<Vec<PrefixPath>> = vec![Vec::new(); alphabet.len()];

    for path in paths {
        let label = graph.label(path.end);
        if path.pos >= label.len() {
            if !multiple_vertex_span {
                continue;
            }
            // path exhausted, fork across every outgoing neighbor
            for &next in graph.outgoing(path.end) {
                let next_char = graph.label(next)[0];
                buckets[char_to_bucket[next_char as usize]].push(PrefixPath {
                    head: path.head,
                    end: next,
                    pos: 1,
                });
            }
        } else {
            buckets[char_to_bucket[label[path.pos] as usize]].push(PrefixPath {
                head: path.head,
                end: path.end,
                pos: path.pos + 1,
            });
        }
    }

    for (i, bucket) in buckets.into_iter().enumerate() {
        if bucket.is_empty() {
            continue;
        }

        let mut bucket_prefix = prefix.to_vec();
        bucket_prefix.push(alphabet[i]);

        let mut heads = BTreeSet::new();
        for path in &bucket {
            heads.insert(path.head);
        }

        let recurse = bucket_prefix.len() < max_depth;
        constraints.push(ConstraintSet {
            prefix: bucket_prefix.clone(),
            vertices: heads.into_iter().collect(),
        });

        if recurse {
            extract(
                graph,
                bucket,
                &bucket_prefix,
                alphabet,
                char_to_bucket,
                max_depth,
                multiple_vertex_span,
                constraints,
            );
        }
    }
}
