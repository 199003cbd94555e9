//! Disjoint-set forest with union by rank and path compression.
//!
//! Used by Kruskal's algorithm in [`crate::graph::Graph::minimum_spanning_tree`].

/// A disjoint-set (union-find) structure over the elements `0..n`.
#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<usize>,
    sets: usize,
}

impl DisjointSet {
    /// Create `n` singleton sets.
    pub fn new(n: usize) -> Self {
        DisjointSet {
            parent: (0..n).collect(),
            rank: vec![0; n],
            sets: n,
        }
    }

    /// Number of elements in the universe.
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Number of disjoint sets currently represented.
    pub fn num_sets(&self) -> usize {
        self.sets
    }

    /// Representative of the set containing `x`, compressing the path on the way.
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }

        root
    }

    /// Merge the sets containing `x` and `y`.
    /// Returns `false` when both were already in the same set.
    pub fn union(&mut self, x: usize, y: usize) -> bool {
        let root_x = self.find(x);
        let root_y = self.find(y);
        if root_x == root_y {
            return false;
        }

        if self.rank[root_x] > self.rank[root_y] {
            self.parent[root_y] = root_x;
        } else if self.rank[root_x] < self.rank[root_y] {
            self.parent[root_x] = root_y;
        } else {
            self.parent[root_y] = root_x;
            self.rank[root_x] += 1;
        }

        self.sets -= 1;
        true
    }

    /// Whether `x` and `y` belong to the same set.
    pub fn same_set(&mut self, x: usize, y: usize) -> bool {
        self.find(x) == self.find(y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_find() {
        let mut ds = DisjointSet::new(5);
        assert_eq!(ds.num_sets(), 5);

        assert!(ds.union(0, 1));
        assert!(ds.union(3, 4));
        assert!(!ds.union(1, 0));
        assert_eq!(ds.num_sets(), 3);

        assert!(ds.same_set(0, 1));
        assert!(ds.same_set(3, 4));
        assert!(!ds.same_set(1, 3));

        assert!(ds.union(1, 4));
        assert!(ds.same_set(0, 3));
        assert_eq!(ds.num_sets(), 2);
    }

    #[test]
    fn test_path_compression_keeps_roots() {
        let mut ds = DisjointSet::new(6);
        for i in 0..5 {
            ds.union(i, i + 1);
        }
        let root = ds.find(5);
        for i in 0..6 {
            assert_eq!(ds.find(i), root);
        }
    }
}
