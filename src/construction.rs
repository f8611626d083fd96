use crate::alphabet;
use crate::ceil_log2;
use crate::dna_fmi::DnaFmIndex;
use crate::encoded_graph::EncodedGraph;
use crate::error::Error;
use crate::interval_tree::{Imt, Interval, Oimt};

// The index text concatenates one block per vertex in vid order:
//
//   '(' label ')' permutation-code
//
// followed by a single terminator. The permutation code writes the vertex's
// rank in `ceil(log2 V)` fixed-width binary over {',' = 0, '.' = 1}, most
// significant bit first. The fixed width makes the codes distinct and
// order-preserving, which pins down the suffix order of the marker rows:
// row 0 is the terminator, rows [1, V+1) start at '(' (sorted by label,
// ties by rank), rows [V+1, 2V+1) start at ')' (sorted by rank).

pub(crate) struct DataStructures {
    pub(crate) dfmi: DnaFmIndex,
    /// text position of the `(` opening each vertex block, in vid order
    pub(crate) vertex_offsets: Vec<u64>,
    pub(crate) rank_to_vid: Vec<usize>,
    pub(crate) vid_to_rank: Vec<usize>,
    pub(crate) oimt: Oimt,
}

pub(crate) fn perm_code_width(no_vertices: usize) -> usize {
    ceil_log2(no_vertices)
}

pub(crate) fn build_index_text(graph: &EncodedGraph, rank_of: &[usize]) -> Vec<u8> {
    let no_vertices = graph.vertex_count();
    let width = perm_code_width(no_vertices);

    let mut text =
        Vec::with_capacity(graph.total_encoded_characters() + no_vertices * (2 + width) + 1);

    for vid in 0..no_vertices {
        text.push(b'(');
        for i in 0..graph.label_len(vid) {
            text.push(graph.label_char(vid, i));
        }
        text.push(b')');

        let rank = rank_of[vid];
        for bit in (0..width).rev() {
            text.push(if (rank >> bit) & 1 == 1 { b'.' } else { b',' });
        }
    }

    text.push(0);
    text
}

pub(crate) fn vertex_block_offsets(graph: &EncodedGraph) -> Vec<u64> {
    let width = perm_code_width(graph.vertex_count());

    let mut offsets = Vec::with_capacity(graph.vertex_count());
    let mut position = 0u64;
    for vid in 0..graph.vertex_count() {
        offsets.push(position);
        position += (2 + graph.label_len(vid) + width) as u64;
    }
    offsets
}

pub(crate) fn create_data_structures(
    graph: &EncodedGraph,
    rank_of: &[usize],
    isa_rate: usize,
) -> Result<DataStructures, Error> {
    let text = build_index_text(graph, rank_of);
    let dfmi = DnaFmIndex::build(&text, isa_rate)?;
    derive_data_structures(graph, dfmi)
}

/// Recovers everything the query engine needs around a (possibly freshly
/// deserialized) FM-index: the vertex order of the marker regions and the
/// boundary search tree.
///
/// All marker rows carry suffix-array samples, so this only reads `2V` stored
/// values and never walks the BWT.
pub(crate) fn derive_data_structures(
    graph: &EncodedGraph,
    dfmi: DnaFmIndex,
) -> Result<DataStructures, Error> {
    let no_vertices = graph.vertex_count();
    if no_vertices == 0 {
        return Err(Error::Construction("the graph has no vertices".into()));
    }
    if dfmi.vertex_marker_count() != no_vertices {
        return Err(Error::Mismatch(format!(
            "index has {} vertex markers but the graph has {} vertices",
            dfmi.vertex_marker_count(),
            no_vertices
        )));
    }
    for vid in 0..no_vertices {
        let label_ok = graph.label_len(vid) > 0
            && (0..graph.label_len(vid))
                .all(|i| alphabet::is_label_symbol(graph.label_char(vid, i)));
        if !label_ok {
            return Err(Error::Construction(format!(
                "label of vertex {} is empty or not restricted to A, C, G, T, N",
                vid
            )));
        }
    }

    let vertex_offsets = vertex_block_offsets(graph);

    let vid_at =
        |position: u64| vertex_offsets.partition_point(|&offset| offset <= position) - 1;

    let mut start_row_vids = Vec::with_capacity(no_vertices);
    for row in 1..no_vertices + 1 {
        let position = dfmi.sa_value(row);
        let vid = vid_at(position);
        if vertex_offsets[vid] != position {
            return Err(Error::Construction(
                "vertex-start marker row does not point at a block start".into(),
            ));
        }
        start_row_vids.push(vid);
    }

    let mut rank_to_vid = Vec::with_capacity(no_vertices);
    let mut vid_to_rank = vec![usize::MAX; no_vertices];
    for rank in 0..no_vertices {
        let position = dfmi.sa_value(no_vertices + 1 + rank);
        let vid = vid_at(position);
        if vertex_offsets[vid] + 1 + graph.label_len(vid) as u64 != position {
            return Err(Error::Construction(
                "vertex-end marker row does not point at a block end".into(),
            ));
        }
        rank_to_vid.push(vid);
        vid_to_rank[vid] = rank;
    }
    if vid_to_rank.contains(&usize::MAX) {
        return Err(Error::Construction(
            "vertex-end marker rows do not cover every vertex".into(),
        ));
    }

    let mut incoming = vec![Vec::new(); no_vertices];
    for vid in 0..no_vertices {
        for &destination in graph.outgoing(vid) {
            if destination >= no_vertices {
                return Err(Error::Construction(format!(
                    "edge target {} out of range",
                    destination
                )));
            }
            incoming[destination].push(vid);
        }
    }

    // leaf j: the ranks of all predecessors of the vertex whose block the
    // j-th `(` row opens
    let leaves: Vec<Vec<Interval>> = start_row_vids
        .iter()
        .map(|&vid| {
            let mut ranks: Vec<usize> =
                incoming[vid].iter().map(|&source| vid_to_rank[source]).collect();
            ranks.sort_unstable();
            ranks.dedup();
            ranks.into_iter().map(|rank| Interval::new(rank, rank)).collect()
        })
        .collect();

    let imt = Imt::new(leaves);

    let rank_last_char_enc: Vec<u8> = rank_to_vid
        .iter()
        .map(|&vid| alphabet::encode(graph.label_char(vid, graph.label_len(vid) - 1)))
        .collect();
    let oimt = Oimt::from_imt(&imt, &rank_last_char_enc);

    Ok(DataStructures {
        dfmi,
        vertex_offsets,
        rank_to_vid,
        vid_to_rank,
        oimt,
    })
}
