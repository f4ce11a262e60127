//! Hoshen-Kopelman labeling of active pixels.
//!
//! Single-pass connected-component labeling with a union-find over labels.
//! Pixels are activated one by one; a new pixel inherits the label of an
//! active 4-neighbour, neighbours with different labels are merged, and a
//! pixel with no active neighbour opens a fresh label. The canonical label
//! of a component is its smallest label, so the output order only depends on
//! the insertion order.
//!
//! Cell labels carry the generation of the pass that wrote them. Starting a
//! pass bumps the generation, which makes every label of the previous pass
//! stale without touching the grid.
#![allow(clippy::cast_possible_truncation, clippy::must_use_candidate)]

use vxdigi_core::{GridPosition, LinearPosition};

/// Label of a connected component within one pass.
pub type Label = u32;

/// Positions sharing one label, ascending.
pub type ClusterOfPixel = Vec<LinearPosition>;

#[derive(Clone, Copy, Debug, Default)]
struct CellLabel {
    generation: u32,
    label: Label,
}

/// Union-find labeling over a `rows × columns` grid.
#[derive(Debug, Clone)]
pub struct GridPartitionedSet {
    rows: usize,
    columns: usize,
    tile: Option<(usize, usize)>,
    locate: GridPosition,
    generation: u32,
    cells: Vec<CellLabel>,
    parents: Vec<Label>,
    members: Vec<LinearPosition>,
    valid_cells: usize,
    buffer: Vec<(Label, LinearPosition)>,
    cursor: usize,
}

impl GridPartitionedSet {
    /// Creates a labeling set for the whole grid.
    pub fn new(rows: usize, columns: usize) -> Self {
        Self {
            rows,
            columns,
            tile: None,
            locate: GridPosition::new(columns),
            generation: 1,
            cells: vec![CellLabel::default(); rows * columns],
            parents: Vec::new(),
            members: Vec::new(),
            valid_cells: 0,
            buffer: Vec::new(),
            cursor: 0,
        }
    }

    /// Creates a labeling set that never connects pixels of different
    /// `tile_rows × tile_columns` tiles.
    pub fn with_tiles(rows: usize, columns: usize, tile_rows: usize, tile_columns: usize) -> Self {
        let mut set = Self::new(rows, columns);
        set.tile = Some((tile_rows.max(1), tile_columns.max(1)));
        set
    }

    /// Begins a new labeling pass.
    pub fn init(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            // Generation 0 marks cells that were never written or were invalidated.
            self.cells.fill(CellLabel::default());
            self.generation = 1;
        }
        self.parents.clear();
        self.members.clear();
        self.buffer.clear();
        self.valid_cells = 0;
        self.cursor = 0;
    }

    /// Number of pixels active in the current pass.
    pub fn valid_cells(&self) -> usize {
        self.valid_cells
    }

    /// Number of labels opened in the current pass.
    pub fn label_count(&self) -> usize {
        self.parents.len()
    }

    #[inline]
    fn position(&self, x: usize, y: usize) -> Option<LinearPosition> {
        (x < self.rows && y < self.columns).then(|| self.locate.linear(x, y))
    }

    #[inline]
    fn is_active(&self, pos: LinearPosition) -> bool {
        self.cells[pos].generation == self.generation
    }

    #[inline]
    fn same_tile(&self, a: (usize, usize), b: (usize, usize)) -> bool {
        match self.tile {
            Some((tr, tc)) => a.0 / tr == b.0 / tr && a.1 / tc == b.1 / tc,
            None => true,
        }
    }

    fn root(&mut self, label: Label) -> Label {
        let mut root = label;
        while self.parents[root as usize] != root {
            root = self.parents[root as usize];
        }
        let mut current = label;
        while self.parents[current as usize] != root {
            let next = self.parents[current as usize];
            self.parents[current as usize] = root;
            current = next;
        }
        root
    }

    fn union(&mut self, a: Label, b: Label) -> bool {
        let ra = self.root(a);
        let rb = self.root(b);
        if ra == rb {
            return false;
        }
        let (low, high) = if ra < rb { (ra, rb) } else { (rb, ra) };
        self.parents[high as usize] = low;
        true
    }

    /// Activates a pixel and returns its canonical label.
    ///
    /// All four neighbours are inspected, so the resulting components do not
    /// depend on the insertion order. With a row-major scan only the left and
    /// upper neighbours can be active.
    pub fn add(&mut self, x: usize, y: usize) -> Option<Label> {
        let pos = self.position(x, y)?;
        if self.is_active(pos) {
            return self.find(x, y);
        }

        let neighbours = [
            (Some(x), y.checked_sub(1)),
            (x.checked_sub(1), Some(y)),
            (Some(x), Some(y + 1)),
            (Some(x + 1), Some(y)),
        ];
        let mut label: Option<Label> = None;
        for (nx, ny) in neighbours {
            let (Some(nx), Some(ny)) = (nx, ny) else {
                continue;
            };
            if !self.same_tile((x, y), (nx, ny)) {
                continue;
            }
            if let Some(other) = self.find(nx, ny) {
                label = Some(match label {
                    None => other,
                    Some(current) => {
                        self.union(current, other);
                        self.root(current)
                    }
                });
            }
        }

        let label = label.unwrap_or_else(|| {
            let fresh = self.parents.len() as Label;
            self.parents.push(fresh);
            fresh
        });
        self.cells[pos] = CellLabel {
            generation: self.generation,
            label,
        };
        self.members.push(pos);
        self.valid_cells += 1;
        Some(label)
    }

    /// Canonical label of a pixel, `None` if it is not active in this pass.
    pub fn find(&mut self, x: usize, y: usize) -> Option<Label> {
        let pos = self.position(x, y)?;
        if !self.is_active(pos) {
            return None;
        }
        let label = self.cells[pos].label;
        Some(self.root(label))
    }

    /// Joins the components of two active pixels. Returns `false` if either
    /// pixel is inactive or both already share a label.
    pub fn merge(&mut self, x1: usize, y1: usize, x2: usize, y2: usize) -> bool {
        match (self.find(x1, y1), self.find(x2, y2)) {
            (Some(a), Some(b)) => self.union(a, b),
            _ => false,
        }
    }

    /// Removes a pixel from the current pass. Labels of the other pixels are
    /// left untouched, so components it bridged stay joined.
    pub fn invalidate(&mut self, x: usize, y: usize) {
        if let Some(pos) = self.position(x, y) {
            if self.is_active(pos) {
                self.cells[pos].generation = 0;
                self.valid_cells -= 1;
            }
        }
    }

    /// Finalizes the pass: groups active pixels by canonical label.
    pub fn close(&mut self) {
        let members = std::mem::take(&mut self.members);
        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.clear();
        for &pos in &members {
            if self.is_active(pos) {
                let label = self.cells[pos].label;
                buffer.push((self.root(label), pos));
            }
        }
        buffer.sort_unstable();
        self.members = members;
        self.buffer = buffer;
        self.cursor = 0;
    }

    /// Pops the next cluster in ascending label order, `None` when exhausted.
    pub fn next_cluster(&mut self) -> Option<ClusterOfPixel> {
        let (label, _) = *self.buffer.get(self.cursor)?;
        let start = self.cursor;
        let end = self.buffer[start..]
            .iter()
            .position(|&(other, _)| other != label)
            .map_or(self.buffer.len(), |offset| start + offset);
        self.cursor = end;
        Some(self.buffer[start..end].iter().map(|&(_, pos)| pos).collect())
    }
}

/// Bounding box `(min_row, max_row, min_col, max_col)` of a cluster.
pub fn cluster_bounds(
    cluster: &[LinearPosition],
    locate: GridPosition,
) -> Option<(usize, usize, usize, usize)> {
    let first = locate.coord(*cluster.first()?);
    Some(cluster.iter().skip(1).map(|&pos| locate.coord(pos)).fold(
        (first.row, first.row, first.col, first.col),
        |(r0, r1, c0, c1), coord| {
            (r0.min(coord.row), r1.max(coord.row), c0.min(coord.col), c1.max(coord.col))
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label_all(set: &mut GridPartitionedSet, pixels: &[(usize, usize)]) -> Vec<ClusterOfPixel> {
        set.init();
        for &(x, y) in pixels {
            set.add(x, y);
        }
        set.close();
        std::iter::from_fn(|| set.next_cluster()).collect()
    }

    #[test]
    fn test_diagonal_pixels_are_separate() {
        let mut set = GridPartitionedSet::new(8, 8);
        let clusters = label_all(&mut set, &[(2, 2), (3, 3)]);
        assert_eq!(clusters, vec![vec![18], vec![27]]);
    }

    #[test]
    fn test_l_shape_any_order() {
        let pixels = [(4, 4), (4, 5), (5, 5)];
        let orders = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        let mut set = GridPartitionedSet::new(10, 10);
        for order in orders {
            let ordered: Vec<(usize, usize)> = order.iter().map(|&i| pixels[i]).collect();
            let clusters = label_all(&mut set, &ordered);
            assert_eq!(clusters, vec![vec![44, 45, 55]], "order {order:?}");
        }
    }

    #[test]
    fn test_u_shape_merges_to_smallest_label() {
        // Row-major scan: (0,0) opens label 0, (0,2) opens label 1 and the
        // bottom row joins them.
        let mut set = GridPartitionedSet::new(4, 4);
        set.init();
        assert_eq!(set.add(0, 0), Some(0));
        assert_eq!(set.add(0, 2), Some(1));
        assert_eq!(set.add(1, 0), Some(0));
        assert_eq!(set.add(1, 1), Some(0));
        assert_eq!(set.add(1, 2), Some(0));
        assert_eq!(set.find(0, 2), Some(0));
        assert_eq!(set.label_count(), 2);
        set.close();
        assert_eq!(set.next_cluster(), Some(vec![0, 2, 4, 5, 6]));
        assert_eq!(set.next_cluster(), None);
    }

    #[test]
    fn test_merge_and_find() {
        let mut set = GridPartitionedSet::new(6, 6);
        set.init();
        set.add(0, 0);
        set.add(5, 5);
        set.add(3, 0);
        assert_eq!(set.find(5, 5), Some(1));
        assert!(set.merge(5, 5, 3, 0));
        assert_eq!(set.find(5, 5), Some(1));
        assert_eq!(set.find(3, 0), Some(1));
        assert!(!set.merge(3, 0, 5, 5));
        assert!(!set.merge(3, 0, 2, 2));
        assert_eq!(set.find(2, 2), None);
        assert_eq!(set.find(9, 9), None);
    }

    #[test]
    fn test_clusters_in_label_order() {
        let mut set = GridPartitionedSet::new(6, 6);
        let clusters = label_all(&mut set, &[(0, 4), (0, 5), (2, 0), (5, 5), (4, 5)]);
        assert_eq!(clusters, vec![vec![4, 5], vec![12], vec![29, 35]]);
    }

    #[test]
    fn test_invalidate_is_lazy() {
        let mut set = GridPartitionedSet::new(3, 3);
        set.init();
        set.add(0, 0);
        set.add(0, 1);
        set.add(0, 2);
        set.invalidate(0, 1);
        assert_eq!(set.valid_cells(), 2);
        assert_eq!(set.find(0, 1), None);
        set.close();
        assert_eq!(set.next_cluster(), Some(vec![0, 2]));
        assert_eq!(set.next_cluster(), None);
    }

    #[test]
    fn test_generation_makes_labels_stale() {
        let mut set = GridPartitionedSet::new(4, 4);
        label_all(&mut set, &[(1, 1), (1, 2)]);
        set.init();
        assert_eq!(set.find(1, 1), None);
        assert_eq!(set.valid_cells(), 0);
        set.add(2, 2);
        set.close();
        assert_eq!(set.next_cluster(), Some(vec![10]));
        assert_eq!(set.next_cluster(), None);
    }

    #[test]
    fn test_generation_wraparound() {
        let mut set = GridPartitionedSet::new(2, 2);
        set.generation = u32::MAX;
        set.add(0, 0);
        set.init();
        assert_eq!(set.generation, 1);
        assert_eq!(set.find(0, 0), None);
    }

    #[test]
    fn test_tiles_cut_clusters() {
        let mut set = GridPartitionedSet::with_tiles(4, 8, 4, 4);
        let clusters = label_all(&mut set, &[(1, 2), (1, 3), (1, 4), (1, 5)]);
        assert_eq!(clusters, vec![vec![10, 11], vec![12, 13]]);

        let mut set = GridPartitionedSet::new(4, 8);
        let clusters = label_all(&mut set, &[(1, 2), (1, 3), (1, 4), (1, 5)]);
        assert_eq!(clusters, vec![vec![10, 11, 12, 13]]);
    }

    #[test]
    fn test_cluster_bounds() {
        let locate = GridPosition::new(10);
        assert_eq!(cluster_bounds(&[44, 45, 55], locate), Some((4, 5, 4, 5)));
        assert_eq!(cluster_bounds(&[], locate), None);
    }
}
