/*! This library indexes string-labelled directed graphs for substring
 * search: it builds a compact self-index over a text derived from the graph
 * and answers whether a pattern occurs as a contiguous walk through
 * concatenated vertex labels, with count, locate and enumerate semantics.
 *
 * The design targets pangenome-scale graphs. Its three tightly coupled
 * pieces are a cache-optimized [FM-Index](DnaFmIndex) over a DNA-restricted
 * alphabet (under 2 bytes per input character, O(1) rank), a simulated
 * [annealing](Annealing) optimizer that reorders vertices to reduce
 * branching during queries, and an ordered interval-merge tree ([`Oimt`])
 * that lets backward search continue across vertex boundaries.
 *
 * Suffix sorting is based on the [`libsais-rs`] crate.
 *
 * ## Usage
 *
 * ```
 * use graphdex::{Graph, GraphIndex, Hit};
 *
 * let mut graph = Graph::new();
 * graph.insert_vertex(0, b"ACCGTA".to_vec());
 * graph.insert_vertex(1, b"ACGTTA".to_vec());
 * graph.insert_edge(0, 1);
 *
 * let index = GraphIndex::new(&graph, None, 32).unwrap();
 *
 * // "TAAC" only occurs across the edge from vertex 0 into vertex 1
 * assert_eq!(index.count(b"TAAC"), 1);
 * assert_eq!(index.locate(b"TAAC"), vec![Hit { vid: 0, offset: 4 }]);
 * ```
 *
 * Vertex labels are restricted to the characters `A`, `C`, `G`, `T` and `N`.
 *
 * [`libsais-rs`]: https://github.com/feldroop/libsais-rs
 */

mod alphabet;
pub mod annealing;
mod bitstream;
pub mod constraint_set;
mod construction;
mod dna_fmi;
mod encoded_graph;
mod error;
mod graph;
mod interval_tree;
pub mod parse;
mod query;

#[doc(inline)]
pub use annealing::{Annealing, AnnealingConfig};
#[doc(inline)]
pub use bitstream::BitStream;
#[doc(inline)]
pub use constraint_set::{ConstraintSet, enumerate_constraint_sets};
#[doc(inline)]
pub use dna_fmi::DnaFmIndex;
#[doc(inline)]
pub use encoded_graph::{EncodedGraph, Walk, WalkNode};
#[doc(inline)]
pub use error::Error;
#[doc(inline)]
pub use graph::Graph;
#[doc(inline)]
pub use interval_tree::{Imt, Interval, Oimt};
#[doc(inline)]
pub use query::Matches;

use construction::DataStructures;

/// A substring self-index over a string-labelled directed graph.
///
/// See the [crate-level documentation](self) for an overview.
pub struct GraphIndex {
    pub(crate) graph: EncodedGraph,
    pub(crate) dfmi: DnaFmIndex,
    pub(crate) vertex_offsets: Vec<u64>,
    pub(crate) rank_to_vid: Vec<usize>,
    pub(crate) vid_to_rank: Vec<usize>,
    pub(crate) oimt: Oimt,
}

impl GraphIndex {
    /// Builds the index for `graph` under the given vertex permutation
    /// (identity when `None`).
    ///
    /// `isa_rate` is the suffix-array sampling rate: larger rates shrink the
    /// index and slow down locate queries proportionally.
    pub fn new(
        graph: &Graph,
        permutation: Option<&[usize]>,
        isa_rate: usize,
    ) -> Result<Self, Error> {
        let no_vertices = graph.vertex_count();
        if no_vertices == 0 {
            return Err(Error::Construction("the graph has no vertices".into()));
        }
        if !graph.is_complete() {
            return Err(Error::Construction(
                "an edge references a vertex that was never given a label".into(),
            ));
        }
        for vid in 0..no_vertices {
            if !graph.label(vid).iter().all(|&c| alphabet::is_label_symbol(c)) {
                return Err(Error::Unsupported(format!(
                    "label of vertex {} contains characters outside A, C, G, T, N",
                    vid
                )));
            }
        }

        let rank_of = match permutation {
            Some(permutation) => {
                if permutation.len() != no_vertices {
                    return Err(Error::Mismatch(format!(
                        "permutation has {} entries for {} vertices",
                        permutation.len(),
                        no_vertices
                    )));
                }

                let mut rank_of = vec![usize::MAX; no_vertices];
                for (rank, &vid) in permutation.iter().enumerate() {
                    if vid >= no_vertices || rank_of[vid] != usize::MAX {
                        return Err(Error::Mismatch(
                            "permutation is not a bijection over the vertex ids".into(),
                        ));
                    }
                    rank_of[vid] = rank;
                }
                rank_of
            }
            None => (0..no_vertices).collect(),
        };

        let encoded = EncodedGraph::from_graph(graph);
        let data = construction::create_data_structures(&encoded, &rank_of, isa_rate)?;

        Ok(Self::assemble(encoded, data))
    }

    fn assemble(graph: EncodedGraph, data: DataStructures) -> Self {
        Self {
            graph,
            dfmi: data.dfmi,
            vertex_offsets: data.vertex_offsets,
            rank_to_vid: data.rank_to_vid,
            vid_to_rank: data.vid_to_rank,
            oimt: data.oimt,
        }
    }

    /// Serializes the index: the encoded-graph section preceded by its byte
    /// length, followed by the raw FM-index buffer. Round-trips through
    /// [`from_buffer`](Self::from_buffer) byte-identically.
    pub fn to_buffer(&self) -> Vec<u8> {
        let graph_buf = self.graph.to_buffer();

        let mut buf = Vec::with_capacity(8 + graph_buf.len() + self.dfmi.size_in_bytes());
        buf.extend_from_slice(&(graph_buf.len() as u64).to_le_bytes());
        buf.extend_from_slice(&graph_buf);
        buf.extend_from_slice(&self.dfmi.to_buffer());
        buf
    }

    pub fn from_buffer(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < 8 {
            return Err(Error::Construction("index buffer is truncated".into()));
        }

        let graph_len = u64::from_le_bytes(buf[..8].try_into().unwrap()) as usize;
        if buf.len() < 8 + graph_len {
            return Err(Error::Construction(
                "index buffer is shorter than its graph section".into(),
            ));
        }

        let graph = EncodedGraph::from_buffer(&buf[8..8 + graph_len])?;
        let dfmi = DnaFmIndex::from_buffer(&buf[8 + graph_len..])?;
        let data = construction::derive_data_structures(&graph, dfmi)?;

        Ok(Self::assemble(graph, data))
    }

    pub fn save_to_writer(&self, writer: &mut impl std::io::Write) -> Result<(), Error> {
        writer.write_all(&self.to_buffer())?;
        Ok(())
    }

    pub fn load_from_reader(reader: &mut impl std::io::Read) -> Result<Self, Error> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Self::from_buffer(&buf)
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.vertex_count()
    }

    /// The vertex permutation the index was built with, position to vid.
    pub fn permutation(&self) -> &[usize] {
        &self.rank_to_vid
    }

    pub fn rank_of(&self, vid: usize) -> usize {
        self.vid_to_rank[vid]
    }

    pub fn encoded_graph(&self) -> &EncodedGraph {
        &self.graph
    }

    pub fn fm_index(&self) -> &DnaFmIndex {
        &self.dfmi
    }

    pub fn size_in_bytes(&self) -> usize {
        8 + self.graph.to_buffer().len() + self.dfmi.size_in_bytes()
    }
}

/// A match start position: `offset` characters into the label of `vid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hit {
    pub vid: usize,
    pub offset: usize,
}

pub(crate) fn ceil_log2(value: usize) -> usize {
    if value.is_power_of_two() {
        value.ilog2() as usize
    } else {
        value.ilog2() as usize + 1
    }
}
