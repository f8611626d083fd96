use graphdex::annealing::{Annealing, AnnealingConfig};
use graphdex::constraint_set::enumerate_constraint_sets;
use graphdex::parse::{parse_fmdg, write_fmdg};
use graphdex::{Graph, GraphIndex, Hit};

use std::io::Cursor;
use std::time::Duration;

fn linear_graph(labels: &str) -> Graph {
    let mut graph = Graph::new();
    for (vid, c) in labels.bytes().enumerate() {
        graph.insert_vertex(vid, vec![c]);
    }
    for vid in 0..labels.len() - 1 {
        graph.insert_edge(vid, vid + 1);
    }
    graph
}

fn diamond_graph() -> Graph {
    let mut graph = Graph::new();
    graph.insert_vertex(0, b"ACCGTA".to_vec());
    graph.insert_vertex(1, b"ACGTTA".to_vec());
    graph.insert_vertex(2, b"GTTATA".to_vec());
    graph.insert_vertex(3, b"CCGTTA".to_vec());
    graph.insert_edge(0, 1);
    graph.insert_edge(0, 2);
    graph.insert_edge(1, 3);
    graph.insert_edge(2, 3);
    graph
}

#[test]
fn linear_graph_of_unit_labels() {
    let graph = linear_graph("AAGGACTAAGGTAACAAGTAA");
    let index = GraphIndex::new(&graph, None, 4).unwrap();

    assert_eq!(index.count(b"GG"), 2);
    assert_eq!(
        index.locate(b"GG"),
        vec![Hit { vid: 2, offset: 0 }, Hit { vid: 9, offset: 0 }]
    );

    // every match of a longer pattern spans several unit labels
    assert_eq!(index.count(b"AAG"), 3);
    assert_eq!(
        index.locate(b"AAG"),
        vec![
            Hit { vid: 0, offset: 0 },
            Hit { vid: 7, offset: 0 },
            Hit { vid: 15, offset: 0 }
        ]
    );

    let walks = index.enumerate(b"AAG");
    assert_eq!(walks.len(), 3);
    for walk in &walks {
        assert_eq!(walk.nodes.len(), 3);
        let vids: Vec<usize> = walk.nodes.iter().map(|n| n.vid).collect();
        assert_eq!(vids[1], vids[0] + 1);
        assert_eq!(vids[2], vids[0] + 2);
    }

    assert_eq!(index.count(b"AAGGACTAAGGTAACAAGTAA"), 1);
    assert_eq!(index.count(b"GGG"), 0);
}

#[test]
fn diamond_graph_queries_cross_vertex_boundaries() {
    let graph = diamond_graph();
    let index = GraphIndex::new(&graph, None, 4).unwrap();

    // "TA" at the end of v1 and v2, continued by the "C" opening v3
    assert_eq!(index.count(b"TAC"), 2);
    assert_eq!(
        index.locate(b"TAC"),
        vec![Hit { vid: 1, offset: 4 }, Hit { vid: 2, offset: 4 }]
    );

    let walks = index.enumerate(b"TAC");
    assert_eq!(walks.len(), 2);
    let spans: Vec<Vec<usize>> = walks
        .iter()
        .map(|walk| walk.nodes.iter().map(|n| n.vid).collect())
        .collect();
    assert!(spans.contains(&vec![1, 3]));
    assert!(spans.contains(&vec![2, 3]));

    // a three-vertex walk: "TA" of v0, all of v1 would be too long, but
    // v0 suffix "A" + v1 "ACGTTA" + v3 prefix "CC"
    assert_eq!(index.count(b"AACGTTACC"), 1);
    let walks = index.enumerate(b"AACGTTACC");
    assert_eq!(walks.len(), 1);
    assert_eq!(
        walks[0].nodes.iter().map(|n| n.vid).collect::<Vec<_>>(),
        vec![0, 1, 3]
    );

    // within-label matches are still found
    assert_eq!(index.count(b"GTTA"), 3);
    assert_eq!(index.count(b"ZZ"), 0);
    assert_eq!(index.count(b""), 0);
}

#[test]
fn sampling_rate_does_not_change_results() {
    let graph = diamond_graph();
    let dense = GraphIndex::new(&graph, None, 1).unwrap();
    let sparse = GraphIndex::new(&graph, None, 64).unwrap();

    for pattern in [
        b"TAC".as_slice(),
        b"A",
        b"GTTA",
        b"ACCGTA",
        b"TACC",
        b"ATACC",
        b"TTTT",
    ] {
        assert_eq!(dense.count(pattern), sparse.count(pattern), "{:?}", pattern);
        assert_eq!(
            dense.locate(pattern),
            sparse.locate(pattern),
            "{:?}",
            pattern
        );
    }
}

#[test]
fn permutation_does_not_change_results() {
    let graph = diamond_graph();
    let identity = GraphIndex::new(&graph, None, 2).unwrap();
    let permuted = GraphIndex::new(&graph, Some(&[3, 1, 0, 2]), 2).unwrap();

    for pattern in [b"TAC".as_slice(), b"GTTA", b"AACGTTACC", b"CC", b"TA"] {
        assert_eq!(identity.count(pattern), permuted.count(pattern));
        assert_eq!(identity.locate(pattern), permuted.locate(pattern));
        assert_eq!(identity.enumerate(pattern), permuted.enumerate(pattern));
    }

    assert_eq!(permuted.permutation(), &[3, 1, 0, 2]);
    assert_eq!(permuted.rank_of(3), 0);
}

#[test]
fn index_round_trips_through_its_buffer() {
    let graph = diamond_graph();
    let index = GraphIndex::new(&graph, None, 3).unwrap();

    let buf = index.to_buffer();
    let restored = GraphIndex::from_buffer(&buf).unwrap();

    assert_eq!(restored.to_buffer(), buf);
    assert_eq!(restored.vertex_count(), 4);
    assert_eq!(restored.fm_index().hash(), index.fm_index().hash());

    for pattern in [b"TAC".as_slice(), b"GTTA", b"AACGTTACC", b"A"] {
        assert_eq!(index.count(pattern), restored.count(pattern));
        assert_eq!(index.locate(pattern), restored.locate(pattern));
        assert_eq!(index.enumerate(pattern), restored.enumerate(pattern));
    }
}

#[test]
fn fmdg_file_to_queries_end_to_end() {
    let graph = diamond_graph();

    let mut file = Vec::new();
    write_fmdg(&mut file, &graph).unwrap();
    let reparsed = parse_fmdg(&mut Cursor::new(file.as_slice())).unwrap();

    let index = GraphIndex::new(&reparsed, None, 8).unwrap();
    assert_eq!(index.count(b"TAC"), 2);
}

#[test]
fn mismatched_permutation_is_rejected() {
    let graph = diamond_graph();

    assert!(GraphIndex::new(&graph, Some(&[0, 1, 2]), 4).is_err());
    assert!(GraphIndex::new(&graph, Some(&[0, 1, 2, 2]), 4).is_err());
}

#[test]
fn annealing_improves_a_fully_connected_graph() {
    let labels = [b"A", b"C", b"G", b"T", b"A", b"C"];
    let mut graph = Graph::new();
    for (vid, label) in labels.iter().enumerate() {
        graph.insert_vertex(vid, label.to_vec());
    }
    for src in 0..6 {
        for dst in 0..6 {
            if src != dst {
                graph.insert_edge(src, dst);
            }
        }
    }

    let constraints = enumerate_constraint_sets(&graph, 4, true);

    let depth_one: Vec<_> = constraints.iter().filter(|c| c.prefix.len() == 1).collect();
    let expected: Vec<(&[u8], Vec<usize>)> = vec![
        (b"A", vec![0, 4]),
        (b"C", vec![1, 5]),
        (b"G", vec![2]),
        (b"T", vec![3]),
    ];
    assert_eq!(depth_one.len(), expected.len());
    for (constraint, (prefix, vertices)) in depth_one.iter().zip(expected) {
        assert_eq!(constraint.prefix, prefix);
        assert_eq!(constraint.vertices, vertices);
    }

    let config = AnnealingConfig {
        seed: Some(1234),
        ..AnnealingConfig::default()
    };
    let mut annealing = Annealing::new(6, &constraints, config).unwrap();
    let initial_cost = annealing.current_cost();

    annealing.run_for(Duration::from_secs(1), None);

    assert!(annealing.best_cost() <= initial_cost);

    // the best permutation found still indexes correctly: "AC" can be read
    // from both A-labelled vertices
    let index = GraphIndex::new(&graph, Some(annealing.best_permutation()), 4).unwrap();
    assert_eq!(index.count(b"AC"), 2);
    assert_eq!(
        index.locate(b"AC"),
        vec![Hit { vid: 0, offset: 0 }, Hit { vid: 4, offset: 0 }]
    );
}
