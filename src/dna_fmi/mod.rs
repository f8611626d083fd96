mod layout;

use layout::{
    F_WORDS, HEADER_WORDS, Header, L_SUPERBLOCK_CHARS, L_SUPERBLOCK_WORDS,
    SA_OCC_SUPERBLOCK_CHARS, SA_OCC_SUPERBLOCK_WORDS, UINT40_BYTES, l_set_symbol, l_symbol,
    low_mask_inclusive, uint40_read, uint40_write, wavelet,
};

use crate::alphabet::{self, NUM_RANKED_SYMBOLS};
use crate::bitstream::fnv1a;
use crate::error::Error;

use num_traits::NumCast;

use std::ops::Range;

/// A cache-optimized FM-Index over the ten-symbol graph-text alphabet.
///
/// Only the six symbols that backward search ever ranks (`A`, `C`, `G`, `T`,
/// `N` and the vertex-start marker) are present in the L-column bitvectors;
/// the remaining four are accounted for in the F column only. Rank is O(1)
/// with at most two cache lines touched, locate walks at most
/// `isa_rate - 1` LF steps to a sampled suffix-array entry.
///
/// The whole index lives in a single contiguous little-endian word buffer
/// (layout in [`layout`]); serialization is a plain copy of that buffer.
#[derive(Debug)]
pub struct DnaFmIndex {
    words: Vec<u64>,
    header: Header,
    // word offsets of the buffer regions
    f_base: usize,
    l_base: usize,
    sa_occ_base: usize,
    sa_base: usize,
}

struct RegionLayout {
    f_base: usize,
    l_base: usize,
    sa_occ_base: usize,
    sa_base: usize,
    total_words: usize,
}

fn region_layout(no_chars: usize, no_sa_values: usize) -> RegionLayout {
    let f_base = HEADER_WORDS;
    let l_base = f_base + F_WORDS;
    let sa_occ_base = l_base + no_chars.div_ceil(L_SUPERBLOCK_CHARS) * L_SUPERBLOCK_WORDS;
    let sa_base =
        sa_occ_base + no_chars.div_ceil(SA_OCC_SUPERBLOCK_CHARS) * SA_OCC_SUPERBLOCK_WORDS;
    let total_words = sa_base + (no_sa_values * UINT40_BYTES).div_ceil(8);

    RegionLayout {
        f_base,
        l_base,
        sa_occ_base,
        sa_base,
        total_words,
    }
}

impl DnaFmIndex {
    /// Builds the index over `text`, which must be terminated by a single
    /// `\0` byte and otherwise consist of index-alphabet characters.
    ///
    /// `isa_rate` controls suffix-array sampling: vertex marker rows are
    /// always sampled, permutation marker rows never, and the remaining rows
    /// whenever their text position is divisible by the rate.
    pub fn build(text: &[u8], isa_rate: usize) -> Result<Self, Error> {
        assert!(isa_rate > 0);

        let no_chars = text.len();
        if no_chars == 0 || text[no_chars - 1] != 0 {
            return Err(Error::Construction(
                "index text must end with the terminator".into(),
            ));
        }
        if no_chars >= 1 << 40 {
            return Err(Error::Construction(
                "index text exceeds the 40-bit address space".into(),
            ));
        }
        if text[..no_chars - 1]
            .iter()
            .any(|&c| c == 0 || alphabet::encode(c) == alphabet::INVALID_ENCODING)
        {
            return Err(Error::Construction(
                "index text contains characters outside the index alphabet".into(),
            ));
        }

        let mut suffix_array = vec![0i64; no_chars];
        libsais::SuffixArrayConstruction::for_text(text)
            .in_borrowed_buffer(suffix_array.as_mut_slice())
            .single_threaded()
            .run()
            .map_err(|err| {
                Error::Construction(format!("libsais suffix array construction: {:?}", err))
            })?;

        let mut bwt = vec![0u8; no_chars];
        let mut str_term_pos = 0;
        let mut no_vertex_markers = 0;
        let mut no_perm_markers = 0;

        for (i, &sa_value) in suffix_array.iter().enumerate() {
            let sa_value = <usize as NumCast>::from(sa_value).unwrap();
            bwt[i] = if sa_value > 0 {
                text[sa_value - 1]
            } else {
                str_term_pos = i;
                0
            };
            no_vertex_markers += (bwt[i] == b'(') as usize;
            no_perm_markers += (bwt[i] == b',' || bwt[i] == b'.') as usize;
        }

        // marker rows are sampled unconditionally, permutation rows never,
        // so the sample count has to be tallied from the suffix array itself
        let always_sampled = 2 * no_vertex_markers + 1;
        let mut no_sa_values = always_sampled;
        for &sa_value in &suffix_array[always_sampled + no_perm_markers..] {
            if <usize as NumCast>::from(sa_value).unwrap() % isa_rate == 0 {
                no_sa_values += 1;
            }
        }

        let regions = region_layout(no_chars, no_sa_values);
        let mut words = vec![0u64; regions.total_words];

        let header = Header {
            fmi_size_in_bytes: (regions.total_words * 8) as u64,
            no_chars: no_chars as u64,
            isa_rate: isa_rate as u64,
            str_term_pos: str_term_pos as u64,
            no_vertex_markers: no_vertex_markers as u64,
            no_sa_values: no_sa_values as u64,
        };

        // suffix array samples and their occupancy bitvector
        {
            let mut sample_idx = 0;
            let mut store_sample = |words: &mut Vec<u64>, row: usize, sa_value: i64| {
                let word =
                    &mut words[regions.sa_occ_base + (row / SA_OCC_SUPERBLOCK_CHARS) * 8 + 2
                        + (row % SA_OCC_SUPERBLOCK_CHARS) / 64];
                *word |= 1 << (row % 64);

                let bytes: &mut [u8] = bytemuck::cast_slice_mut(words);
                uint40_write(
                    bytes,
                    regions.sa_base * 8 + sample_idx * UINT40_BYTES,
                    <u64 as NumCast>::from(sa_value).unwrap(),
                );
                sample_idx += 1;
            };

            for row in 0..always_sampled {
                store_sample(&mut words, row, suffix_array[row]);
            }
            for row in always_sampled + no_perm_markers..no_chars {
                if <usize as NumCast>::from(suffix_array[row]).unwrap() % isa_rate == 0 {
                    store_sample(&mut words, row, suffix_array[row]);
                }
            }
        }

        // L column bitvectors
        for (i, &c) in bwt.iter().enumerate() {
            let enc = alphabet::encode(c);
            if (enc as usize) < NUM_RANKED_SYMBOLS {
                l_set_symbol(&mut words[regions.l_base..], i, enc);
            }
        }

        // cumulative rank caches at superblock and block boundaries
        {
            let mut totals = [0u64; alphabet::NUM_SYMBOLS];
            let mut in_superblock = [0u64; alphabet::NUM_SYMBOLS];
            let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut words);
            let l_byte_base = regions.l_base * 8;

            for (i, &c) in bwt.iter().enumerate() {
                let s = i / L_SUPERBLOCK_CHARS;
                let b = (i % L_SUPERBLOCK_CHARS) / 64;
                let superblock_byte = l_byte_base + s * L_SUPERBLOCK_WORDS * 8;

                if i % L_SUPERBLOCK_CHARS == 0 {
                    for enc in 0..NUM_RANKED_SYMBOLS {
                        uint40_write(bytes, superblock_byte + enc * UINT40_BYTES, totals[enc]);
                    }
                    in_superblock = [0; alphabet::NUM_SYMBOLS];
                }
                if i % 64 == 0 {
                    for enc in 0..NUM_RANKED_SYMBOLS {
                        bytes[superblock_byte + 32 + 32 * b + enc] = in_superblock[enc] as u8;
                    }
                }

                let enc = alphabet::encode(c) as usize;
                totals[enc] += 1;
                in_superblock[enc] += 1;
            }

            // F column: cumulative starts per rank symbol in lexicographic
            // text order; the four non-ranked symbols are folded into the
            // bases of the symbols that follow them
            let term = totals[alphabet::SYM_TERMINATOR as usize];
            let mut f = [0u64; F_WORDS];
            f[alphabet::SYM_VERTEX_START as usize] = term;
            f[alphabet::SYM_A as usize] = term
                + totals[alphabet::SYM_VERTEX_START as usize]
                + totals[alphabet::SYM_VERTEX_END as usize]
                + totals[alphabet::SYM_PERM_ZERO as usize]
                + totals[alphabet::SYM_PERM_ONE as usize];
            f[alphabet::SYM_C as usize] =
                f[alphabet::SYM_A as usize] + totals[alphabet::SYM_A as usize];
            f[alphabet::SYM_G as usize] =
                f[alphabet::SYM_C as usize] + totals[alphabet::SYM_C as usize];
            f[alphabet::SYM_N as usize] =
                f[alphabet::SYM_G as usize] + totals[alphabet::SYM_G as usize];
            f[alphabet::SYM_T as usize] =
                f[alphabet::SYM_N as usize] + totals[alphabet::SYM_N as usize];

            words[regions.f_base..regions.f_base + F_WORDS].copy_from_slice(&f);
        }

        // occupancy popcount caches
        {
            let no_sao_superblocks = no_chars.div_ceil(SA_OCC_SUPERBLOCK_CHARS);
            let mut popcount_total = 0u64;

            for s in 0..no_sao_superblocks {
                let word_base = regions.sa_occ_base + s * SA_OCC_SUPERBLOCK_WORDS;
                let bitvectors: Vec<u64> = words[word_base + 2..word_base + 8].to_vec();

                let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut words);
                let byte_base = word_base * 8;
                uint40_write(bytes, byte_base, popcount_total);

                let mut in_superblock = 0u64;
                for b in 0..5 {
                    in_superblock += bitvectors[b].count_ones() as u64;
                    let cache = (in_superblock as u16).to_le_bytes();
                    bytes[byte_base + UINT40_BYTES + 2 * b] = cache[0];
                    bytes[byte_base + UINT40_BYTES + 2 * b + 1] = cache[1];
                }
                popcount_total += in_superblock + bitvectors[5].count_ones() as u64;
            }
        }

        header.write_to(&mut words[..HEADER_WORDS]);

        Ok(Self {
            words,
            header,
            f_base: regions.f_base,
            l_base: regions.l_base,
            sa_occ_base: regions.sa_occ_base,
            sa_base: regions.sa_base,
        })
    }

    /// The number of occurrences of `c` in `L[0..=pos]`, in O(1).
    ///
    /// Ranking a character without rank support is a caller bug; it is
    /// reported on the error log and answered with a `usize::MAX` sentinel.
    pub fn rank(&self, pos: usize, c: u8) -> usize {
        let enc = alphabet::encode(c);
        if enc as usize >= NUM_RANKED_SYMBOLS {
            log::error!("rank queried for character {:#04x} without rank support", c);
            return usize::MAX;
        }
        self.rank_enc(pos, enc)
    }

    pub(crate) fn rank_enc(&self, pos: usize, enc: u8) -> usize {
        debug_assert!(pos < self.header.no_chars as usize);

        let s = pos / L_SUPERBLOCK_CHARS;
        let b = (pos % L_SUPERBLOCK_CHARS) / 64;
        let m = pos % 64;

        let bytes: &[u8] = bytemuck::cast_slice(&self.words);
        let superblock_byte = (self.l_base + s * L_SUPERBLOCK_WORDS) * 8;

        let superblock_count = uint40_read(bytes, superblock_byte + enc as usize * UINT40_BYTES);
        let block_count = bytes[superblock_byte + 32 + 32 * b + enc as usize] as u64;
        let indicator = wavelet(enc, &self.block_bitvectors(s, b));

        (superblock_count + block_count) as usize
            + (indicator & low_mask_inclusive(m)).count_ones() as usize
    }

    /// Ranks two characters at the same position with a single superblock
    /// fetch. Backward search with boundary forks calls this on every
    /// iteration, once for the pattern character and once for `(`.
    pub fn double_rank(&self, pos: usize, c1: u8, c2: u8) -> (usize, usize) {
        let enc1 = alphabet::encode(c1);
        let enc2 = alphabet::encode(c2);
        if enc1 as usize >= NUM_RANKED_SYMBOLS || enc2 as usize >= NUM_RANKED_SYMBOLS {
            log::error!(
                "double rank queried for characters {:#04x}, {:#04x} without rank support",
                c1,
                c2
            );
            return (usize::MAX, usize::MAX);
        }
        self.double_rank_enc(pos, enc1, enc2)
    }

    pub(crate) fn double_rank_enc(&self, pos: usize, enc1: u8, enc2: u8) -> (usize, usize) {
        debug_assert!(pos < self.header.no_chars as usize);

        let s = pos / L_SUPERBLOCK_CHARS;
        let b = (pos % L_SUPERBLOCK_CHARS) / 64;
        let m = pos % 64;

        let bytes: &[u8] = bytemuck::cast_slice(&self.words);
        let superblock_byte = (self.l_base + s * L_SUPERBLOCK_WORDS) * 8;
        let bitvectors = self.block_bitvectors(s, b);
        let mask = low_mask_inclusive(m);

        let mut ranks = [0; 2];
        for (rank, &enc) in ranks.iter_mut().zip([enc1, enc2].iter()) {
            let superblock_count =
                uint40_read(bytes, superblock_byte + enc as usize * UINT40_BYTES);
            let block_count = bytes[superblock_byte + 32 + 32 * b + enc as usize] as u64;
            let indicator = wavelet(enc, &bitvectors);
            *rank = (superblock_count + block_count) as usize
                + (indicator & mask).count_ones() as usize;
        }

        (ranks[0], ranks[1])
    }

    fn block_bitvectors(&self, s: usize, b: usize) -> [u64; 3] {
        let base = self.l_base + layout::l_bitvector_word(s, b);
        [self.words[base], self.words[base + 1], self.words[base + 2]]
    }

    /// The suffix-array value of row `i`, via LF steps to the nearest
    /// sampled row.
    pub fn sa_value(&self, mut i: usize) -> u64 {
        let mut hops = 0u64;

        loop {
            if self.sa_occ_bit(i) {
                let sample_idx = self.sa_occ_rank(i) - 1;
                return self.sa_sample(sample_idx) + hops;
            }

            let enc = l_symbol(&self.words[self.l_base..], i)
                .expect("unsampled rows always hold a rank-supported character");
            i = self.f(enc) + self.rank_enc(i, enc) - 1;
            hops += 1;
        }
    }

    fn sa_occ_bit(&self, i: usize) -> bool {
        let word = self.words[self.sa_occ_base
            + (i / SA_OCC_SUPERBLOCK_CHARS) * SA_OCC_SUPERBLOCK_WORDS
            + 2
            + (i % SA_OCC_SUPERBLOCK_CHARS) / 64];
        (word >> (i % 64)) & 1 == 1
    }

    // number of occupancy bits set in [0..=i]
    fn sa_occ_rank(&self, i: usize) -> usize {
        let s = i / SA_OCC_SUPERBLOCK_CHARS;
        let b = (i % SA_OCC_SUPERBLOCK_CHARS) / 64;
        let m = i % 64;

        let bytes: &[u8] = bytemuck::cast_slice(&self.words);
        let byte_base = (self.sa_occ_base + s * SA_OCC_SUPERBLOCK_WORDS) * 8;

        let popcount = uint40_read(bytes, byte_base);
        let block_cache = if b > 0 {
            u16::from_le_bytes([
                bytes[byte_base + UINT40_BYTES + 2 * (b - 1)],
                bytes[byte_base + UINT40_BYTES + 2 * (b - 1) + 1],
            ]) as u64
        } else {
            0
        };
        let bitvector =
            self.words[self.sa_occ_base + s * SA_OCC_SUPERBLOCK_WORDS + 2 + b];

        (popcount + block_cache) as usize
            + (bitvector & low_mask_inclusive(m)).count_ones() as usize
    }

    fn sa_sample(&self, sample_idx: usize) -> u64 {
        let bytes: &[u8] = bytemuck::cast_slice(&self.words);
        uint40_read(bytes, self.sa_base * 8 + sample_idx * UINT40_BYTES)
    }

    pub(crate) fn f(&self, enc: u8) -> usize {
        self.words[self.f_base + enc as usize] as usize
    }

    /// Standard backward search over the plain text, without any boundary
    /// handling. Returns the suffix-array interval of the pattern, or `None`
    /// when it does not occur or contains unsearchable characters.
    pub(crate) fn backward_search(&self, pattern: &[u8]) -> Option<Range<usize>> {
        let mut lo = 0;
        let mut hi = self.header.no_chars as usize;

        for &c in pattern.iter().rev() {
            let enc = alphabet::encode(c);
            if enc as usize >= NUM_RANKED_SYMBOLS {
                return None;
            }

            let rank_lo = if lo == 0 { 0 } else { self.rank_enc(lo - 1, enc) };
            let rank_hi = self.rank_enc(hi - 1, enc);

            lo = self.f(enc) + rank_lo;
            hi = self.f(enc) + rank_hi;
            if hi <= lo {
                return None;
            }
        }

        Some(lo..hi)
    }

    /// The number of occurrences of `pattern` in the indexed text.
    pub fn count(&self, pattern: &[u8]) -> usize {
        self.backward_search(pattern).map_or(0, |range| range.len())
    }

    /// The text positions of all occurrences of `pattern`.
    pub fn locate(&self, pattern: &[u8]) -> Vec<u64> {
        match self.backward_search(pattern) {
            Some(range) => range.map(|i| self.sa_value(i)).collect(),
            None => Vec::new(),
        }
    }

    /// Decodes a range of the L column. Rows holding a marker other than the
    /// vertex-start marker are not recoverable from the rank bitvectors and
    /// yield `None`; the terminator row is recovered from the header.
    pub fn bwt_range(&self, range: Range<usize>) -> Vec<Option<u8>> {
        range
            .map(|i| {
                if i == self.header.str_term_pos as usize {
                    return Some(0);
                }
                l_symbol(&self.words[self.l_base..], i)
                    .map(|enc| alphabet::DECODING_TABLE[enc as usize])
            })
            .collect()
    }

    pub fn text_len(&self) -> usize {
        self.header.no_chars as usize
    }

    pub fn vertex_marker_count(&self) -> usize {
        self.header.no_vertex_markers as usize
    }

    pub fn isa_rate(&self) -> usize {
        self.header.isa_rate as usize
    }

    pub fn size_in_bytes(&self) -> usize {
        self.header.fmi_size_in_bytes as usize
    }

    pub fn terminator_row(&self) -> usize {
        self.header.str_term_pos as usize
    }

    /// FNV-1a over the raw buffer bytes.
    pub fn hash(&self) -> u64 {
        fnv1a(bytemuck::cast_slice(&self.words))
    }

    /// Copies the contiguous index buffer.
    pub fn to_buffer(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.words).to_vec()
    }

    /// Adopts a serialized buffer, re-deriving the region offsets from the
    /// sizes recorded in the header.
    pub fn from_buffer(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < HEADER_WORDS * 8 || buf.len() % 8 != 0 {
            return Err(Error::Construction(
                "index buffer is not a whole number of words".into(),
            ));
        }

        let mut words = vec![0u64; buf.len() / 8];
        bytemuck::cast_slice_mut::<u64, u8>(&mut words).copy_from_slice(buf);

        let header = Header::read_from(&words);
        if header.fmi_size_in_bytes as usize != buf.len() {
            return Err(Error::Construction(format!(
                "index buffer is {} bytes but the header declares {}",
                buf.len(),
                header.fmi_size_in_bytes
            )));
        }

        let regions = region_layout(header.no_chars as usize, header.no_sa_values as usize);
        if regions.total_words != words.len() {
            return Err(Error::Construction(
                "index buffer regions do not add up to the declared size".into(),
            ));
        }

        Ok(Self {
            words,
            header,
            f_base: regions.f_base,
            l_base: regions.l_base,
            sa_occ_base: regions.sa_occ_base,
            sa_base: regions.sa_base,
        })
    }
}

impl PartialEq for DnaFmIndex {
    fn eq(&self, other: &Self) -> bool {
        self.words == other.words
    }
}

impl Eq for DnaFmIndex {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construction::build_index_text;
    use crate::encoded_graph::EncodedGraph;
    use crate::graph::Graph;

    fn diamond_text() -> Vec<u8> {
        let mut graph = Graph::new();
        graph.insert_vertex(0, b"ACCGTA".to_vec());
        graph.insert_vertex(1, b"ACGTTA".to_vec());
        graph.insert_vertex(2, b"GTTATA".to_vec());
        graph.insert_vertex(3, b"CCGTTA".to_vec());
        graph.insert_edge(0, 1);
        graph.insert_edge(0, 2);
        graph.insert_edge(1, 3);
        graph.insert_edge(2, 3);

        let encoded = EncodedGraph::from_graph(&graph);
        build_index_text(&encoded, &[0, 1, 2, 3])
    }

    fn naive_suffix_array(text: &[u8]) -> Vec<usize> {
        let mut sa: Vec<usize> = (0..text.len()).collect();
        sa.sort_by(|&a, &b| text[a..].cmp(&text[b..]));
        sa
    }

    #[test]
    fn rank_matches_naive_scan() {
        let text = diamond_text();
        let index = DnaFmIndex::build(&text, 4).unwrap();

        let sa = naive_suffix_array(&text);
        let bwt: Vec<u8> = sa
            .iter()
            .map(|&p| if p > 0 { text[p - 1] } else { 0 })
            .collect();

        for c in [b'(', b'A', b'C', b'G', b'N', b'T'] {
            let mut count = 0;
            for i in 0..text.len() {
                count += (bwt[i] == c) as usize;
                assert_eq!(index.rank(i, c), count, "rank({}, {})", i, c as char);
            }
        }
    }

    #[test]
    fn double_rank_agrees_with_single_ranks() {
        let text = diamond_text();
        let index = DnaFmIndex::build(&text, 4).unwrap();

        for i in 0..text.len() {
            let (r1, r2) = index.double_rank(i, b'T', b'(');
            assert_eq!(r1, index.rank(i, b'T'));
            assert_eq!(r2, index.rank(i, b'('));
        }
    }

    #[test]
    fn sa_values_match_naive_suffix_array() {
        let text = diamond_text();
        let sa = naive_suffix_array(&text);

        // permutation marker rows are never decoded and carry no samples
        let no_vertices = text.iter().filter(|&&c| c == b'(').count();
        let no_perm_rows = text.iter().filter(|&&c| c == b',' || c == b'.').count();
        let perm_rows = 2 * no_vertices + 1..2 * no_vertices + 1 + no_perm_rows;

        for isa_rate in [1, 3, 64] {
            let index = DnaFmIndex::build(&text, isa_rate).unwrap();
            for i in (0..text.len()).filter(|i| !perm_rows.contains(i)) {
                assert_eq!(index.sa_value(i) as usize, sa[i], "row {}", i);
            }
        }
    }

    #[test]
    fn count_and_locate_are_consistent_with_the_text() {
        let text = diamond_text();
        let index = DnaFmIndex::build(&text, 2).unwrap();

        for pattern in [b"GT".as_slice(), b"TTA", b"ACC", b"TAC", b"A", b"GGGG"] {
            let naive: Vec<usize> = text
                .windows(pattern.len())
                .enumerate()
                .filter(|(_, window)| *window == pattern)
                .map(|(i, _)| i)
                .collect();

            assert_eq!(index.count(pattern), naive.len(), "{:?}", pattern);

            let mut located = index.locate(pattern);
            located.sort_unstable();
            let located: Vec<usize> = located.into_iter().map(|p| p as usize).collect();
            assert_eq!(located, naive, "{:?}", pattern);
        }
    }

    #[test]
    fn marker_rows_are_always_sampled() {
        let text = diamond_text();
        let index = DnaFmIndex::build(&text, 1_000_000).unwrap();
        let no_markers = 2 * index.vertex_marker_count() + 1;

        for i in 0..no_markers {
            assert!(index.sa_occ_bit(i));
        }
        // no label position is divisible by such a large rate
        assert_eq!(index.header.no_sa_values as usize, no_markers);
    }

    #[test]
    fn buffer_round_trip_preserves_every_operation() {
        let text = diamond_text();
        let index = DnaFmIndex::build(&text, 3).unwrap();

        let buf = index.to_buffer();
        assert_eq!(buf.len(), index.size_in_bytes());

        let restored = DnaFmIndex::from_buffer(&buf).unwrap();
        assert_eq!(index, restored);
        assert_eq!(index.hash(), restored.hash());
        assert_eq!(restored.to_buffer(), buf);

        let no_vertices = index.vertex_marker_count();
        let no_perm_rows = text.iter().filter(|&&c| c == b',' || c == b'.').count();
        let perm_rows = 2 * no_vertices + 1..2 * no_vertices + 1 + no_perm_rows;

        for i in 0..text.len() {
            if !perm_rows.contains(&i) {
                assert_eq!(index.sa_value(i), restored.sa_value(i));
            }
            for c in [b'(', b'A', b'C', b'G', b'N', b'T'] {
                assert_eq!(index.rank(i, c), restored.rank(i, c));
            }
        }
        assert_eq!(index.count(b"GT"), restored.count(b"GT"));
    }

    #[test]
    fn bwt_range_recovers_rankable_rows() {
        let text = diamond_text();
        let index = DnaFmIndex::build(&text, 2).unwrap();

        let sa = naive_suffix_array(&text);
        let decoded = index.bwt_range(0..text.len());

        for (i, value) in decoded.iter().enumerate() {
            let expected = if sa[i] > 0 { text[sa[i] - 1] } else { 0 };
            match value {
                Some(c) => assert_eq!(*c, expected),
                None => assert!(matches!(expected, b')' | b',' | b'.')),
            }
        }
    }

    #[test]
    fn invalid_rank_character_reports_sentinel() {
        let text = diamond_text();
        let index = DnaFmIndex::build(&text, 2).unwrap();
        assert_eq!(index.rank(0, b'Z'), usize::MAX);
        assert_eq!(index.rank(0, b')'), usize::MAX);
    }
}
