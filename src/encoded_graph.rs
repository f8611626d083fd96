use crate::bitstream::BitStream;
use crate::ceil_log2;
use crate::error::Error;
use crate::graph::Graph;

const ALPHABET_SIZE_BITS: usize = 64;
const TABLE_ENTRY_BITS: usize = 8;
const VID_BITS: usize = 64;
const LABEL_LEN_BITS: usize = 64;
const ADJ_LIST_LEN_BITS: usize = 64;

/// A graph with vertex labels re-encoded into `ceil(log2 |alphabet|)` bits
/// per character and adjacency copied into dense arrays.
///
/// This is the representation the walk matcher operates on, and the part of
/// the graph that is serialized into the index file so that locate and
/// enumerate queries can map matches back onto vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedGraph {
    alphabet_size: usize,
    alphabet_occ: [u8; 256],
    encoding_table: [u8; 256],
    decoding_table: [u8; 256],
    no_edges: usize,
    no_total_encoded_characters: usize,
    vertices: Vec<EncodedVertex>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedVertex {
    vid: usize,
    no_encoded_characters: usize,
    outgoing: Vec<usize>,
    label_bits: BitStream,
}

impl EncodedGraph {
    pub fn from_graph(graph: &Graph) -> Self {
        let mut alphabet_occ = [0u8; 256];
        for vid in 0..graph.vertex_count() {
            for &c in graph.label(vid) {
                alphabet_occ[c as usize] = 1;
            }
        }

        let mut encoding_table = [0u8; 256];
        let mut decoding_table = [0u8; 256];
        let mut alphabet_size = 0;
        for c in 0..256 {
            if alphabet_occ[c] != 0 {
                encoding_table[c] = alphabet_size as u8;
                decoding_table[alphabet_size] = c as u8;
                alphabet_size += 1;
            }
        }

        let bits_per_char = ceil_log2(alphabet_size);
        let mut no_edges = 0;
        let mut no_total_encoded_characters = 0;

        let vertices = (0..graph.vertex_count())
            .map(|vid| {
                let label = graph.label(vid);
                let no_words = (label.len() * bits_per_char).div_ceil(64).max(1);
                let mut label_bits = BitStream::with_word_capacity(no_words);

                let mut idx = 0;
                for &c in label {
                    label_bits.write(idx, encoding_table[c as usize] as u64, bits_per_char);
                    idx += bits_per_char;
                }

                no_edges += graph.outgoing(vid).len();
                no_total_encoded_characters += label.len();

                EncodedVertex {
                    vid,
                    no_encoded_characters: label.len(),
                    outgoing: graph.outgoing(vid).to_vec(),
                    label_bits,
                }
            })
            .collect();

        Self {
            alphabet_size,
            alphabet_occ,
            encoding_table,
            decoding_table,
            no_edges,
            no_total_encoded_characters,
            vertices,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.no_edges
    }

    pub fn total_encoded_characters(&self) -> usize {
        self.no_total_encoded_characters
    }

    pub fn alphabet_size(&self) -> usize {
        self.alphabet_size
    }

    pub fn bits_per_char(&self) -> usize {
        ceil_log2(self.alphabet_size)
    }

    pub fn label_len(&self, vid: usize) -> usize {
        self.vertices[vid].no_encoded_characters
    }

    pub fn outgoing(&self, vid: usize) -> &[usize] {
        &self.vertices[vid].outgoing
    }

    /// Decodes the character at position `idx` of the label of `vid`.
    pub fn label_char(&self, vid: usize, idx: usize) -> u8 {
        let bits_per_char = self.bits_per_char();
        let enc = self.vertices[vid]
            .label_bits
            .read(idx * bits_per_char, bits_per_char);
        self.decoding_table[enc as usize]
    }

    /// Re-encodes a query string into this graph's packed representation.
    /// Returns `None` if the query contains a character outside the alphabet.
    pub fn encode_query(&self, query: &[u8]) -> Option<BitStream> {
        let bits_per_char = self.bits_per_char();
        let no_words = (query.len() * bits_per_char).div_ceil(64).max(1);
        let mut bits = BitStream::with_word_capacity(no_words);

        let mut idx = 0;
        for &c in query {
            if self.alphabet_occ[c as usize] == 0 {
                return None;
            }
            bits.write(idx, self.encoding_table[c as usize] as u64, bits_per_char);
            idx += bits_per_char;
        }

        Some(bits)
    }

    /// Enumerates all walks through the graph whose concatenated labels,
    /// starting at offset `offset` into the label of `vid`, spell the query.
    ///
    /// The query must already be packed with [`encode_query`](Self::encode_query).
    /// Matching compares whole 64-bit chunks plus a residual partial word.
    /// Walks are produced in depth-first pre-order of the branch decisions,
    /// with outgoing edges explored in adjacency order.
    pub fn walk_query(
        &self,
        query: &BitStream,
        query_len: usize,
        vid: usize,
        offset: usize,
    ) -> Vec<Walk> {
        let mut walks = Vec::new();
        let mut current = vec![WalkNode {
            vid,
            string_lo: 0,
            string_hi: 0,
            graph_lo: offset,
            graph_hi: offset,
        }];

        self.extend_walk(query, query_len, &mut current, &mut walks);
        walks
    }

    fn extend_walk(
        &self,
        query: &BitStream,
        query_len: usize,
        current: &mut Vec<WalkNode>,
        walks: &mut Vec<Walk>,
    ) {
        let bits_per_char = self.bits_per_char();
        let last = *current.last().expect("walk is never empty");
        let vertex = &self.vertices[last.vid];

        let no_chars_to_match =
            (query_len - last.string_hi).min(vertex.no_encoded_characters - last.graph_hi);

        let match_bits = no_chars_to_match * bits_per_char;
        let no_words = match_bits / 64;
        let no_slack_bits = match_bits % 64;
        let mut string_idx = last.string_hi * bits_per_char;
        let mut graph_idx = last.graph_hi * bits_per_char;

        for _ in 0..no_words {
            if query.read(string_idx, 64) != vertex.label_bits.read(graph_idx, 64) {
                return;
            }
            string_idx += 64;
            graph_idx += 64;
        }
        if no_slack_bits != 0
            && query.read(string_idx, no_slack_bits)
                != vertex.label_bits.read(graph_idx, no_slack_bits)
        {
            return;
        }

        let node = current.last_mut().expect("walk is never empty");
        node.string_hi += no_chars_to_match;
        node.graph_hi += no_chars_to_match;
        let string_hi = node.string_hi;

        let string_exhausted = string_hi == query_len;
        let vertex_exhausted = node.graph_hi == vertex.no_encoded_characters;

        if string_exhausted {
            walks.push(Walk {
                nodes: current.clone(),
            });
        } else if vertex_exhausted {
            for i in 0..vertex.outgoing.len() {
                current.push(WalkNode {
                    vid: self.vertices[last.vid].outgoing[i],
                    string_lo: string_hi,
                    string_hi,
                    graph_lo: 0,
                    graph_hi: 0,
                });
                self.extend_walk(query, query_len, current, walks);
                current.pop();
            }
        }
    }

    /// Serializes into the exact bit layout of the on-disk graph section.
    pub fn to_buffer(&self) -> Vec<u8> {
        let mut bits = BitStream::new();
        let mut idx = 0;

        bits.write(idx, self.alphabet_size as u64, ALPHABET_SIZE_BITS);
        idx += ALPHABET_SIZE_BITS;

        for table in [&self.alphabet_occ, &self.encoding_table, &self.decoding_table] {
            for &entry in table.iter() {
                bits.write(idx, entry as u64, TABLE_ENTRY_BITS);
                idx += TABLE_ENTRY_BITS;
            }
        }

        bits.write(idx, self.vertices.len() as u64, VID_BITS);
        idx += VID_BITS;
        bits.write(idx, self.no_edges as u64, VID_BITS);
        idx += VID_BITS;
        bits.write(idx, self.no_total_encoded_characters as u64, LABEL_LEN_BITS);
        idx += LABEL_LEN_BITS;

        let bits_per_char = self.bits_per_char();
        for vertex in &self.vertices {
            bits.write(idx, vertex.vid as u64, VID_BITS);
            idx += VID_BITS;
            bits.write(idx, vertex.no_encoded_characters as u64, LABEL_LEN_BITS);
            idx += LABEL_LEN_BITS;
            bits.write(idx, vertex.outgoing.len() as u64, ADJ_LIST_LEN_BITS);
            idx += ADJ_LIST_LEN_BITS;

            for &destination in &vertex.outgoing {
                bits.write(idx, destination as u64, VID_BITS);
                idx += VID_BITS;
            }

            let no_label_words = (vertex.no_encoded_characters * bits_per_char)
                .div_ceil(64)
                .max(1);
            for j in 0..no_label_words {
                bits.write(idx, vertex.label_bits.read(j * 64, 64), 64);
                idx += 64;
            }

            // align the next vertex record to a word boundary
            idx = idx.div_ceil(64) * 64;
        }

        bits.fit(idx);
        let words = bits.detach();
        bytemuck::cast_slice(&words).to_vec()
    }

    /// The exact inverse of [`to_buffer`](Self::to_buffer).
    pub fn from_buffer(buf: &[u8]) -> Result<Self, Error> {
        if buf.is_empty() {
            return Err(Error::Construction("empty graph buffer".into()));
        }

        let bits = BitStream::from_bytes(buf);
        let mut idx = 0;

        let alphabet_size = bits.read(idx, ALPHABET_SIZE_BITS) as usize;
        idx += ALPHABET_SIZE_BITS;
        if alphabet_size == 0 || alphabet_size > 256 {
            return Err(Error::Construction(format!(
                "implausible alphabet size {}",
                alphabet_size
            )));
        }

        let mut alphabet_occ = [0u8; 256];
        let mut encoding_table = [0u8; 256];
        let mut decoding_table = [0u8; 256];
        for table in [&mut alphabet_occ, &mut encoding_table, &mut decoding_table] {
            for entry in table.iter_mut() {
                *entry = bits.read(idx, TABLE_ENTRY_BITS) as u8;
                idx += TABLE_ENTRY_BITS;
            }
        }

        let no_vertices = bits.read(idx, VID_BITS) as usize;
        idx += VID_BITS;
        let no_edges = bits.read(idx, VID_BITS) as usize;
        idx += VID_BITS;
        let no_total_encoded_characters = bits.read(idx, LABEL_LEN_BITS) as usize;
        idx += LABEL_LEN_BITS;

        let total_bits = bits.capacity_in_words() * 64;
        let truncated = || Error::Construction("graph buffer is truncated".into());

        // every vertex record starts with three whole words
        if no_vertices > total_bits / (3 * 64) {
            return Err(truncated());
        }

        let bits_per_char = ceil_log2(alphabet_size);
        let mut vertices = vec![None; no_vertices];

        for _ in 0..no_vertices {
            if idx + 3 * 64 > total_bits {
                return Err(truncated());
            }

            let vid = bits.read(idx, VID_BITS) as usize;
            idx += VID_BITS;
            if vid >= no_vertices {
                return Err(Error::Construction(format!("vertex id {} out of range", vid)));
            }

            let no_encoded_characters = bits.read(idx, LABEL_LEN_BITS) as usize;
            idx += LABEL_LEN_BITS;
            let no_outgoing = bits.read(idx, ADJ_LIST_LEN_BITS) as usize;
            idx += ADJ_LIST_LEN_BITS;

            let no_label_words = (no_encoded_characters * bits_per_char).div_ceil(64).max(1);
            if no_outgoing
                .checked_add(no_label_words)
                .and_then(|words| (idx / 64).checked_add(words))
                .is_none_or(|end_word| end_word > total_bits / 64)
            {
                return Err(truncated());
            }

            let mut outgoing = Vec::with_capacity(no_outgoing);
            for _ in 0..no_outgoing {
                outgoing.push(bits.read(idx, VID_BITS) as usize);
                idx += VID_BITS;
            }

            let mut label_bits = BitStream::with_word_capacity(no_label_words);
            for j in 0..no_label_words {
                label_bits.write(j * 64, bits.read(idx, 64), 64);
                idx += 64;
            }
            idx = idx.div_ceil(64) * 64;

            vertices[vid] = Some(EncodedVertex {
                vid,
                no_encoded_characters,
                outgoing,
                label_bits,
            });
        }

        let vertices: Vec<_> = vertices
            .into_iter()
            .map(|v| v.ok_or_else(|| Error::Construction("missing vertex record".into())))
            .collect::<Result<_, _>>()?;

        let graph = Self {
            alphabet_size,
            alphabet_occ,
            encoding_table,
            decoding_table,
            no_edges,
            no_total_encoded_characters,
            vertices,
        };

        let char_total: usize = graph.vertices.iter().map(|v| v.no_encoded_characters).sum();
        let edge_total: usize = graph.vertices.iter().map(|v| v.outgoing.len()).sum();
        if char_total != graph.no_total_encoded_characters || edge_total != graph.no_edges {
            return Err(Error::Construction(
                "graph buffer totals do not match vertex records".into(),
            ));
        }

        Ok(graph)
    }
}

/// One matched stretch of a walk: `string_lo..string_hi` of the query was
/// matched against `graph_lo..graph_hi` of the label of `vid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WalkNode {
    pub vid: usize,
    pub string_lo: usize,
    pub string_hi: usize,
    pub graph_lo: usize,
    pub graph_hi: usize,
}

/// A matched walk through the graph, compared node by node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Walk {
    pub nodes: Vec<WalkNode>,
}
