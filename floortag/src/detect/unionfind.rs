/// Sentinel parent for elements no `find` has touched yet.
const UNSET: u32 = u32::MAX;

#[derive(Clone, Copy)]
struct Node {
    parent: u32,
    size: u32,
}

/// Disjoint-set forest over pixel indices, path halving plus union by size.
///
/// Nodes initialize lazily on first `find`, so frames where most of the
/// threshold image is the 127 skip value never touch most of the array.
pub struct UnionFind {
    nodes: Vec<Node>,
}

impl UnionFind {
    pub fn new(n: usize) -> Self {
        Self {
            nodes: vec![Node { parent: UNSET, size: 0 }; n],
        }
    }

    /// Representative of the set containing `id`.
    ///
    /// A first-time `id` becomes a singleton set rooted at itself.
    pub fn find(&mut self, mut id: u32) -> u32 {
        let i = id as usize;
        if self.nodes[i].parent == UNSET {
            self.nodes[i] = Node { parent: id, size: 1 };
            return id;
        }
        loop {
            let parent = self.nodes[id as usize].parent;
            if parent == id {
                return id;
            }
            // Path halving: point at the grandparent and step there
            let grandparent = self.nodes[parent as usize].parent;
            self.nodes[id as usize].parent = grandparent;
            id = grandparent;
        }
    }

    /// Merge the sets holding `a` and `b`; the bigger tree keeps its root.
    pub fn union(&mut self, a: u32, b: u32) -> u32 {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return ra;
        }
        let (root, child) = if self.nodes[ra as usize].size > self.nodes[rb as usize].size {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.nodes[child as usize].parent = root;
        self.nodes[root as usize].size += self.nodes[child as usize].size;
        root
    }

    /// Number of elements in the set containing `id`.
    pub fn set_size(&mut self, id: u32) -> u32 {
        let root = self.find(id);
        self.nodes[root as usize].size
    }
}
