//! Cross-tick cluster reconciliation.
//!
//! A deposit's pixels cross and leave the threshold at different ticks, so
//! the instantaneous clusters of consecutive passes are pieces of the same
//! physical hit. The heap keeps one durable [`ClusterItem`] per hit, keyed by
//! shared pixel membership, and releases it once every member has delivered
//! its measurement.

use std::collections::{HashMap, HashSet};

use vxdigi_core::{ChargePoint, GridPosition, LinearPosition, PixelData};

/// Identifier of an open cluster. Allocated in increasing order.
pub type ClusterId = u64;

/// Pixel position → open cluster.
pub type ReferenceTable = HashMap<LinearPosition, ClusterId>;

/// A cluster tracked across ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterItem {
    /// Heap-assigned identifier.
    pub id: ClusterId,
    /// Measured member pixels.
    pub pixels: Vec<ChargePoint>,
    /// Earliest time the cluster or one of its pixels was seen.
    pub time: f64,
    /// Members still waiting for their measurement.
    pub size: usize,
    members: Vec<LinearPosition>,
}

impl ClusterItem {
    /// Creates a cluster from measured pixels.
    #[must_use]
    pub fn new(id: ClusterId, pixels: Vec<ChargePoint>, time: f64) -> Self {
        Self {
            id,
            pixels,
            time,
            size: 0,
            members: Vec::new(),
        }
    }

    /// Every position referencing this cluster.
    #[must_use]
    pub fn members(&self) -> &[LinearPosition] {
        &self.members
    }

    /// Sum of the measured charges.
    #[must_use]
    pub fn total_charge(&self) -> f64 {
        self.pixels.iter().map(|p| p.charge).sum()
    }

    /// Whether every member has been measured.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.size == 0
    }
}

/// Open clusters of one ladder or sensor tile.
#[derive(Debug, Clone)]
pub struct ClusterHeap {
    next_id: ClusterId,
    locate: GridPosition,
    label: String,
    clusters: HashMap<ClusterId, ClusterItem>,
    references: ReferenceTable,
    pending: HashSet<LinearPosition>,
}

impl ClusterHeap {
    /// Creates an empty heap for a grid with `columns` columns.
    #[must_use]
    pub fn new(columns: usize) -> Self {
        Self {
            next_id: 0,
            locate: GridPosition::new(columns),
            label: String::new(),
            clusters: HashMap::new(),
            references: ReferenceTable::new(),
            pending: HashSet::new(),
        }
    }

    /// Sets the label used in log messages.
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// Label used in log messages.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of open clusters.
    #[must_use]
    pub fn open_clusters(&self) -> usize {
        self.clusters.len()
    }

    /// Number of members waiting for a measurement.
    #[must_use]
    pub fn pending_pixels(&self) -> usize {
        self.pending.len()
    }

    /// Whether no cluster is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Open cluster a pixel belongs to.
    #[must_use]
    pub fn cluster_of(&self, pos: LinearPosition) -> Option<ClusterId> {
        self.references.get(&pos).copied()
    }

    /// Registers an instantaneous cluster seen at `time`.
    ///
    /// Open clusters sharing a pixel with `cluster` are merged into the
    /// oldest one; without any shared pixel a new cluster is opened. Returns
    /// the id of the surviving cluster, `None` for an empty input.
    pub fn add_cluster(&mut self, cluster: &[LinearPosition], time: f64) -> Option<ClusterId> {
        if cluster.is_empty() {
            return None;
        }

        let mut touched: Vec<ClusterId> = cluster
            .iter()
            .filter_map(|pos| self.references.get(pos).copied())
            .collect();
        touched.sort_unstable();
        touched.dedup();

        let target = if let Some(&oldest) = touched.first() {
            for &other in &touched[1..] {
                self.absorb(oldest, other);
            }
            oldest
        } else {
            let id = self.next_id;
            self.next_id += 1;
            self.clusters.insert(id, ClusterItem::new(id, Vec::new(), time));
            id
        };

        let item = self.clusters.get_mut(&target)?;
        item.time = item.time.min(time);
        for &pos in cluster {
            if self.references.get(&pos).is_none() {
                self.references.insert(pos, target);
                item.members.push(pos);
            }
            // A measured member showing up again has fired a second time.
            if self.pending.insert(pos) {
                item.size += 1;
            }
        }
        Some(target)
    }

    fn absorb(&mut self, target: ClusterId, other: ClusterId) {
        let Some(absorbed) = self.clusters.remove(&other) else {
            return;
        };
        for &pos in &absorbed.members {
            self.references.insert(pos, target);
        }
        if let Some(item) = self.clusters.get_mut(&target) {
            log::trace!(
                "{}: cluster {} absorbs cluster {} ({} members)",
                self.label,
                target,
                other,
                absorbed.members.len()
            );
            item.time = item.time.min(absorbed.time);
            item.size += absorbed.size;
            item.pixels.extend(absorbed.pixels);
            item.members.extend(absorbed.members);
        }
    }

    /// Attaches the measurement of a pending member pixel.
    ///
    /// Returns `false` if the pixel is not waiting for a measurement.
    pub fn setup_pixel(&mut self, row: usize, col: usize, data: PixelData) -> bool {
        let pos = self.locate.linear(row, col);
        let item = self
            .references
            .get(&pos)
            .and_then(|id| self.clusters.get_mut(id));
        let Some(item) = item.filter(|_| self.pending.contains(&pos)) else {
            log::warn!(
                "{}: measurement for pixel ({}, {}) without open cluster",
                self.label,
                row,
                col
            );
            return false;
        };
        self.pending.remove(&pos);
        item.pixels.push(ChargePoint::new(row, col, data.charge));
        item.time = item.time.min(data.time);
        item.size -= 1;
        true
    }

    /// Removes and returns every cluster whose members are all measured,
    /// in ascending id order.
    pub fn pop_clusters(&mut self) -> Vec<ClusterItem> {
        let mut ready: Vec<ClusterId> = self
            .clusters
            .values()
            .filter(|item| item.is_ready())
            .map(|item| item.id)
            .collect();
        ready.sort_unstable();
        let popped: Vec<ClusterItem> = ready
            .into_iter()
            .filter_map(|id| self.release(id))
            .collect();
        if !popped.is_empty() {
            log::debug!(
                "{}: popped {} clusters, {} still open",
                self.label,
                popped.len(),
                self.clusters.len()
            );
        }
        popped
    }

    /// Removes and returns every open cluster, measured or not.
    pub fn drain(&mut self) -> Vec<ClusterItem> {
        let mut ids: Vec<ClusterId> = self.clusters.keys().copied().collect();
        ids.sort_unstable();
        let drained: Vec<ClusterItem> = ids.into_iter().filter_map(|id| self.release(id)).collect();
        let incomplete = drained.iter().filter(|item| !item.is_ready()).count();
        if incomplete > 0 {
            log::debug!(
                "{}: drained {} clusters, {} with unmeasured pixels",
                self.label,
                drained.len(),
                incomplete
            );
        }
        self.pending.clear();
        drained
    }

    fn release(&mut self, id: ClusterId) -> Option<ClusterItem> {
        let item = self.clusters.remove(&id)?;
        for pos in &item.members {
            if self.references.get(pos) == Some(&id) {
                self.references.remove(pos);
            }
            if item.size > 0 {
                self.pending.remove(pos);
            }
        }
        Some(item)
    }

    /// Drops every open cluster and restarts id allocation.
    pub fn clear(&mut self) {
        self.clusters.clear();
        self.references.clear();
        self.pending.clear();
        self.next_id = 0;
    }
}
