//! Box-scan detection of variable regions.
//!
//! A square box of side `B` is slid over each tile matrix. Boxes whose sum
//! exceeds `DL * median * B^2` are flagged; flagged boxes that overlap or
//! touch are merged into one candidate region with a union-find.
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use flarescan_core::{CandidateRegion, DetectionConfig, VariabilityMatrix};
use log::{debug, info};
use std::f64::consts::PI;

/// Lower bound applied to the global median.
pub const MEDIAN_FLOOR: f64 = 0.75;

/// Median of every value of every matrix, without the floor.
///
/// With an even number of values the two middle ones are averaged. An empty
/// input has median zero.
#[must_use]
pub fn raw_median(matrices: &[VariabilityMatrix]) -> f64 {
    let mut values: Vec<f64> = matrices.iter().flat_map(|m| m.iter().copied()).collect();
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let (left, upper, _) = values.select_nth_unstable_by(n / 2, f64::total_cmp);
    let upper = *upper;
    if n % 2 == 1 {
        upper
    } else {
        let lower = left.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        0.5 * (lower + upper)
    }
}

/// Global median used by the detection threshold, floored at
/// [`MEDIAN_FLOOR`].
#[must_use]
pub fn global_median(matrices: &[VariabilityMatrix]) -> f64 {
    let raw = raw_median(matrices);
    let median = raw.max(MEDIAN_FLOOR);
    info!("Global variability median {raw:.4} (using {median:.4})");
    median
}

/// Disjoint sets over flagged box indices. Union by size, path halving.
struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (mut big, mut small) = (self.find(a), self.find(b));
        if big == small {
            return;
        }
        if self.size[big] < self.size[small] {
            std::mem::swap(&mut big, &mut small);
        }
        self.parent[small] = big;
        self.size[big] += self.size[small];
    }
}

/// A box whose sum passed the threshold. Bounds are half-open.
#[derive(Clone, Copy, Debug)]
struct FlaggedBox {
    /// Position on the lattice of box starts.
    cell: (usize, usize),
    x: (usize, usize),
    y: (usize, usize),
    sum: f64,
}

impl FlaggedBox {
    /// True if the footprints overlap or share an edge or corner.
    fn touches(&self, other: &Self) -> bool {
        self.x.0 <= other.x.1
            && other.x.0 <= self.x.1
            && self.y.0 <= other.y.1
            && other.y.0 <= self.y.1
    }
}

/// Per-region accumulator over the footprint pixels.
#[derive(Clone, Copy, Debug, Default)]
struct Footprint {
    area: usize,
    weight: f64,
    weighted_x: f64,
    weighted_y: f64,
    sum_x: f64,
    sum_y: f64,
    peak: f64,
}

impl Footprint {
    fn add(&mut self, x: usize, y: usize, value: f64) {
        self.area += 1;
        self.weight += value;
        self.weighted_x += value * x as f64;
        self.weighted_y += value * y as f64;
        self.sum_x += x as f64;
        self.sum_y += y as f64;
    }

    /// Centroid as matrix indices.
    fn centroid(&self) -> (f64, f64) {
        if self.weight > 0.0 {
            (self.weighted_x / self.weight, self.weighted_y / self.weight)
        } else {
            let n = self.area as f64;
            (self.sum_x / n, self.sum_y / n)
        }
    }
}

/// Box-scan detector for variable regions.
#[derive(Clone, Debug)]
pub struct RegionDetector {
    box_size: usize,
    stride: usize,
    detection_level: f64,
}

impl RegionDetector {
    /// Creates a detector from the run configuration.
    #[must_use]
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            box_size: config.box_size.max(1),
            stride: config.stride().max(1),
            detection_level: config.detection_level,
        }
    }

    /// Threshold a box sum must exceed for the given median.
    #[must_use]
    pub fn threshold(&self, median: f64) -> f64 {
        self.detection_level * median * (self.box_size * self.box_size) as f64
    }

    fn starts(&self, extent: usize) -> impl Iterator<Item = usize> {
        (0..extent).step_by(self.stride)
    }

    fn flagged_boxes(&self, matrix: &VariabilityMatrix, threshold: f64) -> Vec<FlaggedBox> {
        let (nx, ny) = matrix.dim();
        let mut flagged = Vec::new();
        for (i, x0) in self.starts(nx).enumerate() {
            let x1 = (x0 + self.box_size).min(nx);
            for (j, y0) in self.starts(ny).enumerate() {
                let y1 = (y0 + self.box_size).min(ny);
                let sum = matrix.slice(ndarray::s![x0..x1, y0..y1]).sum();
                if sum > threshold {
                    flagged.push(FlaggedBox {
                        cell: (i, j),
                        x: (x0, x1),
                        y: (y0, y1),
                        sum,
                    });
                }
            }
        }
        flagged
    }

    /// Unions touching boxes. Only lattice neighbours within
    /// `box_size / stride` steps can touch, so each box looks at a fixed
    /// neighbourhood instead of every other box.
    fn merge(&self, boxes: &[FlaggedBox], (nx, ny): (usize, usize)) -> UnionFind {
        let cells = (nx.div_ceil(self.stride), ny.div_ceil(self.stride));
        let mut lattice = ndarray::Array2::<usize>::from_elem(cells, usize::MAX);
        for (i, b) in boxes.iter().enumerate() {
            lattice[b.cell] = i;
        }

        let reach = self.box_size / self.stride;
        let mut uf = UnionFind::new(boxes.len());
        for (i, b) in boxes.iter().enumerate() {
            let (ci, cj) = b.cell;
            for ni in ci..=(ci + reach).min(cells.0 - 1) {
                for nj in cj.saturating_sub(reach)..=(cj + reach).min(cells.1 - 1) {
                    let j = lattice[[ni, nj]];
                    if j != usize::MAX && j != i && b.touches(&boxes[j]) {
                        uf.union(i, j);
                    }
                }
            }
        }
        uf
    }

    /// Detects candidate regions on one tile.
    ///
    /// Regions come back ordered by raw Y, then raw X.
    #[must_use]
    pub fn detect(
        &self,
        tile_id: u8,
        matrix: &VariabilityMatrix,
        median: f64,
    ) -> Vec<CandidateRegion> {
        let threshold = self.threshold(median);
        let boxes = self.flagged_boxes(matrix, threshold);
        if boxes.is_empty() {
            return Vec::new();
        }

        let mut uf = self.merge(&boxes, matrix.dim());

        // Label every footprint pixel with its region root.
        let mut labels = ndarray::Array2::<usize>::from_elem(matrix.dim(), usize::MAX);
        let mut footprints = vec![Footprint::default(); boxes.len()];
        for (i, b) in boxes.iter().enumerate() {
            let root = uf.find(i);
            footprints[root].peak = footprints[root].peak.max(b.sum);
            labels
                .slice_mut(ndarray::s![b.x.0..b.x.1, b.y.0..b.y.1])
                .fill(root);
        }
        for ((x, y), &root) in labels.indexed_iter() {
            if root != usize::MAX {
                footprints[root].add(x, y, matrix[[x, y]]);
            }
        }

        let mut regions: Vec<CandidateRegion> = footprints
            .into_iter()
            .filter(|f| f.area > 0)
            .map(|f| {
                let (cx, cy) = f.centroid();
                CandidateRegion {
                    tile_id,
                    centroid_raw_x: cx + 1.0,
                    centroid_raw_y: cy + 1.0,
                    pixel_radius: (f.area as f64 / PI).sqrt(),
                    peak_count: f.peak,
                    area: f.area,
                }
            })
            .collect();
        regions.sort_by(|a, b| {
            a.centroid_raw_y
                .total_cmp(&b.centroid_raw_y)
                .then(a.centroid_raw_x.total_cmp(&b.centroid_raw_x))
        });

        debug!(
            "Tile {tile_id}: {} flagged boxes merged into {} regions (threshold {threshold:.3})",
            boxes.len(),
            regions.len()
        );
        regions
    }
}
