/// A string-labelled directed graph.
///
/// Vertices are identified by dense non-negative ids and carry an immutable
/// byte label of length at least one. Edges form a multiset; incoming and
/// outgoing adjacency lists are both maintained. The graph is only mutated
/// while it is being built from an input file and is treated as immutable
/// once handed to the encoder.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    labels: Vec<Vec<u8>>,
    incoming: Vec<Vec<usize>>,
    outgoing: Vec<Vec<usize>>,
    no_edges: usize,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_vertex(&mut self, vid: usize, label: Vec<u8>) {
        assert!(!label.is_empty(), "vertex labels must be non-empty");

        self.ensure_vertex_slot(vid);
        self.labels[vid] = label;
    }

    pub fn insert_edge(&mut self, source: usize, destination: usize) {
        self.ensure_vertex_slot(source.max(destination));

        self.outgoing[source].push(destination);
        self.incoming[destination].push(source);
        self.no_edges += 1;
    }

    fn ensure_vertex_slot(&mut self, vid: usize) {
        if vid >= self.labels.len() {
            self.labels.resize(vid + 1, Vec::new());
            self.incoming.resize(vid + 1, Vec::new());
            self.outgoing.resize(vid + 1, Vec::new());
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.labels.len()
    }

    pub fn edge_count(&self) -> usize {
        self.no_edges
    }

    pub fn label(&self, vid: usize) -> &[u8] {
        &self.labels[vid]
    }

    pub fn outgoing(&self, vid: usize) -> &[usize] {
        &self.outgoing[vid]
    }

    pub fn incoming(&self, vid: usize) -> &[usize] {
        &self.incoming[vid]
    }

    pub fn total_label_len(&self) -> usize {
        self.labels.iter().map(|l| l.len()).sum()
    }

    /// Every vid in `0..vertex_count()` must have received a label.
    pub fn is_complete(&self) -> bool {
        self.labels.iter().all(|l| !l.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacency_is_tracked_both_ways() {
        let mut graph = Graph::new();
        graph.insert_vertex(0, b"ACA".to_vec());
        graph.insert_vertex(1, b"T".to_vec());
        graph.insert_vertex(2, b"GG".to_vec());
        graph.insert_edge(0, 1);
        graph.insert_edge(0, 2);
        graph.insert_edge(2, 1);

        assert_eq!(graph.vertex_count(), 3);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.outgoing(0), &[1, 2]);
        assert_eq!(graph.incoming(1), &[0, 2]);
        assert_eq!(graph.total_label_len(), 6);
        assert!(graph.is_complete());
    }

    #[test]
    fn edge_before_vertex_leaves_gap() {
        let mut graph = Graph::new();
        graph.insert_edge(0, 3);

        assert_eq!(graph.vertex_count(), 4);
        assert!(!graph.is_complete());
    }
}
