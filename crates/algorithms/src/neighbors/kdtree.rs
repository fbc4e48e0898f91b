//! 2D k-d tree for radius queries
//!
//! Backs the distance-band neighbor search with O(log n + k) range
//! queries instead of an O(n) scan per entity.
//!
//! Reference:
//! Bentley, J.L. (1975). Multidimensional binary search trees used
//! for associative searching. CACM, 18(9).

/// A 2D k-d tree over point coordinates.
///
/// Stores indices into the caller's point slice; the tree never owns the
/// attribute data attached to the points.
#[derive(Debug)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    coords: Vec<(f64, f64)>,
    root: Option<usize>,
}

#[derive(Debug)]
struct KdNode {
    /// Index into the caller's original point order.
    point_idx: usize,
    /// Split dimension: 0 = x, 1 = y
    split_dim: u8,
    left: Option<usize>,
    right: Option<usize>,
}

impl KdTree {
    /// Build a tree from point coordinates, O(n log n).
    pub fn build(coords: &[(f64, f64)]) -> Self {
        let coords = coords.to_vec();
        let mut nodes = Vec::with_capacity(coords.len());
        let mut indices: Vec<usize> = (0..coords.len()).collect();
        let root = build_recursive(&coords, &mut indices, 0, &mut nodes);
        Self { nodes, coords, root }
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Indices of all points within `radius` of `(qx, qy)`, inclusive.
    ///
    /// Results come back in an arbitrary order; callers wanting a stable
    /// order must sort.
    pub fn within_radius(&self, qx: f64, qy: f64, radius: f64) -> Vec<(usize, f64)> {
        let mut hits = Vec::new();
        if let Some(root) = self.root {
            let r2 = radius * radius;
            self.range_search(root, qx, qy, r2, &mut hits);
        }
        hits
    }

    fn range_search(&self, node: usize, qx: f64, qy: f64, r2: f64, hits: &mut Vec<(usize, f64)>) {
        let n = &self.nodes[node];
        let (px, py) = self.coords[n.point_idx];
        let dx = px - qx;
        let dy = py - qy;
        let d2 = dx * dx + dy * dy;
        if d2 <= r2 {
            hits.push((n.point_idx, d2.sqrt()));
        }

        let diff = if n.split_dim == 0 { qx - px } else { qy - py };
        let (near, far) = if diff <= 0.0 {
            (n.left, n.right)
        } else {
            (n.right, n.left)
        };
        if let Some(child) = near {
            self.range_search(child, qx, qy, r2, hits);
        }
        // The far side can only contain hits if the splitting plane is
        // within the radius.
        if diff * diff <= r2 {
            if let Some(child) = far {
                self.range_search(child, qx, qy, r2, hits);
            }
        }
    }
}

fn build_recursive(
    coords: &[(f64, f64)],
    indices: &mut [usize],
    depth: usize,
    nodes: &mut Vec<KdNode>,
) -> Option<usize> {
    if indices.is_empty() {
        return None;
    }

    let split_dim = (depth % 2) as u8;
    let mid = indices.len() / 2;
    indices.select_nth_unstable_by(mid, |&a, &b| {
        let ka = if split_dim == 0 { coords[a].0 } else { coords[a].1 };
        let kb = if split_dim == 0 { coords[b].0 } else { coords[b].1 };
        ka.partial_cmp(&kb).unwrap_or(std::cmp::Ordering::Equal)
    });

    let point_idx = indices[mid];
    let node_slot = nodes.len();
    nodes.push(KdNode {
        point_idx,
        split_dim,
        left: None,
        right: None,
    });

    let (lo, rest) = indices.split_at_mut(mid);
    let hi = &mut rest[1..];
    let left = build_recursive(coords, lo, depth + 1, nodes);
    let right = build_recursive(coords, hi, depth + 1, nodes);
    nodes[node_slot].left = left;
    nodes[node_slot].right = right;
    Some(node_slot)
}
