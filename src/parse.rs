//! Parsers for the rGFA and fmdg graph formats and for permutation files.
//!
//! Segment lines of pangenome graphs can carry sequences many megabytes
//! long, so lines are handled as raw bytes and split with `memchr` instead
//! of going through UTF-8 validation.

use crate::error::Error;
use crate::graph::Graph;

use std::io::{BufRead, Write};

fn split_fields(line: &[u8]) -> Vec<&[u8]> {
    let mut fields = Vec::new();
    let mut rest = line;

    while let Some(tab) = memchr::memchr(b'\t', rest) {
        fields.push(&rest[..tab]);
        rest = &rest[tab + 1..];
    }
    fields.push(rest);
    fields
}

fn trim_line_end(line: &mut Vec<u8>) {
    while matches!(line.last(), Some(b'\n' | b'\r')) {
        line.pop();
    }
}

fn parse_integer(bytes: &[u8], line: usize, what: &str) -> Result<usize, Error> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| Error::InputParse {
            line,
            message: format!("expected an integer {}, found {:?}", what, String::from_utf8_lossy(bytes)),
        })
}

// segment names are of the form [prefix][0-9]+; the numeric suffix minus one
// is the vertex id
fn segment_vid(seg_id: &[u8], line: usize) -> Result<usize, Error> {
    let digits_start = seg_id
        .iter()
        .rposition(|c| !c.is_ascii_digit())
        .map_or(0, |p| p + 1);

    if digits_start == seg_id.len() {
        return Err(Error::InputParse {
            line,
            message: format!(
                "segment name {:?} has no numeric suffix",
                String::from_utf8_lossy(seg_id)
            ),
        });
    }

    let number = parse_integer(&seg_id[digits_start..], line, "segment number")?;
    if number == 0 {
        return Err(Error::InputParse {
            line,
            message: "segment numbers start at 1".into(),
        });
    }

    Ok(number - 1)
}

/// Parses an rGFA graph: `S` lines become vertices (the `SN`/`SO`/`SR` tags
/// are accepted and ignored), `L` lines become edges. Other line types are
/// skipped.
pub fn parse_rgfa(reader: &mut impl BufRead) -> Result<Graph, Error> {
    let mut graph = Graph::new();
    let mut line = Vec::new();
    let mut line_no = 0;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        line_no += 1;
        trim_line_end(&mut line);

        if line.is_empty() {
            continue;
        }

        let fields = split_fields(&line);
        match fields[0] {
            b"S" => {
                if fields.len() < 3 {
                    return Err(Error::InputParse {
                        line: line_no,
                        message: "segment line needs a name and a sequence".into(),
                    });
                }
                let vid = segment_vid(fields[1], line_no)?;
                if fields[2].is_empty() {
                    return Err(Error::InputParse {
                        line: line_no,
                        message: "segment sequence is empty".into(),
                    });
                }
                graph.insert_vertex(vid, fields[2].to_vec());
            }
            b"L" => {
                if fields.len() < 5 {
                    return Err(Error::InputParse {
                        line: line_no,
                        message: "link line needs two segments, strands and a CIGAR".into(),
                    });
                }
                let source = segment_vid(fields[1], line_no)?;
                let destination = segment_vid(fields[3], line_no)?;
                graph.insert_edge(source, destination);
            }
            _ => {}
        }
    }

    Ok(graph)
}

/// Parses the tab-separated fmdg format: `V\t<vid>\t<label>` and
/// `E\t<source>\t<destination>` lines. Empty lines and lines of any other
/// type are skipped.
pub fn parse_fmdg(reader: &mut impl BufRead) -> Result<Graph, Error> {
    let mut graph = Graph::new();
    let mut line = Vec::new();
    let mut line_no = 0;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        line_no += 1;
        trim_line_end(&mut line);

        if line.iter().all(|c| c.is_ascii_whitespace()) {
            continue;
        }

        let fields = split_fields(&line);
        match fields[0] {
            b"V" => {
                if fields.len() < 3 || fields[2].is_empty() {
                    return Err(Error::InputParse {
                        line: line_no,
                        message: "vertex line needs an id and a non-empty label".into(),
                    });
                }
                let vid = parse_integer(fields[1], line_no, "vertex id")?;
                graph.insert_vertex(vid, fields[2].to_vec());
            }
            b"E" => {
                if fields.len() < 3 {
                    return Err(Error::InputParse {
                        line: line_no,
                        message: "edge line needs a source and a destination".into(),
                    });
                }
                let source = parse_integer(fields[1], line_no, "source vertex id")?;
                let destination = parse_integer(fields[2], line_no, "destination vertex id")?;
                graph.insert_edge(source, destination);
            }
            _ => {}
        }
    }

    Ok(graph)
}

/// Writes a graph in fmdg format, all vertices before all edges.
pub fn write_fmdg(writer: &mut impl Write, graph: &Graph) -> Result<(), Error> {
    for vid in 0..graph.vertex_count() {
        writer.write_all(format!("V\t{}\t", vid).as_bytes())?;
        writer.write_all(graph.label(vid))?;
        writer.write_all(b"\n")?;
    }
    for vid in 0..graph.vertex_count() {
        for &destination in graph.outgoing(vid) {
            writeln!(writer, "E\t{}\t{}", vid, destination)?;
        }
    }
    Ok(())
}

/// Parses a permutation file: one integer per line, blank lines skipped.
pub fn parse_permutation(reader: &mut impl BufRead) -> Result<Vec<usize>, Error> {
    let mut permutation = Vec::new();
    let mut line = Vec::new();
    let mut line_no = 0;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        line_no += 1;
        trim_line_end(&mut line);

        if line.iter().all(|c| c.is_ascii_whitespace()) {
            continue;
        }
        permutation.push(parse_integer(&line, line_no, "permutation entry")?);
    }

    Ok(permutation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn rgfa_segments_and_links() {
        let input = b"H\tVN:Z:1.0\n\
            S\ts1\tACCGTA\tSN:Z:chr1\tSO:i:0\tSR:i:0\n\
            S\ts2\tACGTTA\tSN:Z:chr1\tSO:i:6\tSR:i:0\n\
            L\ts1\t+\ts2\t+\t0M\n";

        let graph = parse_rgfa(&mut Cursor::new(input.as_slice())).unwrap();
        assert_eq!(graph.vertex_count(), 2);
        assert_eq!(graph.label(0), b"ACCGTA");
        assert_eq!(graph.label(1), b"ACGTTA");
        assert_eq!(graph.outgoing(0), &[1]);
    }

    #[test]
    fn rgfa_segment_numbers_use_the_numeric_suffix() {
        let input = b"S\tchr17\tACGT\n";
        let graph = parse_rgfa(&mut Cursor::new(input.as_slice())).unwrap();
        // suffix 17, minus one
        assert_eq!(graph.label(16), b"ACGT");

        let bad = b"S\tchr\tACGT\n";
        assert!(parse_rgfa(&mut Cursor::new(bad.as_slice())).is_err());
    }

    #[test]
    fn fmdg_round_trip() {
        let input = b"V\t0\tACCGTA\nV\t1\tACGTTA\nV\t2\tGTTATA\n\nE\t0\t1\nE\t0\t2\n";
        let graph = parse_fmdg(&mut Cursor::new(input.as_slice())).unwrap();

        assert_eq!(graph.vertex_count(), 3);
        assert_eq!(graph.edge_count(), 2);

        let mut written = Vec::new();
        write_fmdg(&mut written, &graph).unwrap();
        let reparsed = parse_fmdg(&mut Cursor::new(written.as_slice())).unwrap();

        assert_eq!(reparsed.vertex_count(), graph.vertex_count());
        assert_eq!(reparsed.edge_count(), graph.edge_count());
        for vid in 0..graph.vertex_count() {
            assert_eq!(reparsed.label(vid), graph.label(vid));
            assert_eq!(reparsed.outgoing(vid), graph.outgoing(vid));
        }
    }

    #[test]
    fn fmdg_rejects_malformed_vertex_lines() {
        let input = b"V\t0\n";
        assert!(parse_fmdg(&mut Cursor::new(input.as_slice())).is_err());

        let input = b"V\tzero\tACGT\n";
        assert!(parse_fmdg(&mut Cursor::new(input.as_slice())).is_err());
    }

    #[test]
    fn permutation_one_integer_per_line() {
        let input = b"3\n1\n0\n2\n\n";
        let permutation = parse_permutation(&mut Cursor::new(input.as_slice())).unwrap();
        assert_eq!(permutation, vec![3, 1, 0, 2]);

        let bad = b"3\nx\n";
        assert!(parse_permutation(&mut Cursor::new(bad.as_slice())).is_err());
    }
}
