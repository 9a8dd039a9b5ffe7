/*
This code is part of the viewshed_engine terrain visibility library.
License: MIT
*/

//! XDraw viewshed: a ring-by-ring wavefront instead of independent rays.
//!
//! Cells at Chebyshev distance `r` from the observer derive their
//! line-of-sight slope from two already-computed cells on ring `r - 1`,
//! so the whole ring can be evaluated in one parallel dispatch and the
//! per-cell work is constant: O(N) for the raster instead of the O(N*R)
//! a ray fleet costs.
//!
//! Each ring splits into eight octant segments keyed by compass
//! direction. The segments are described by one table entry each -- the
//! ring axis, the two signs, the offset bias, and the parent deltas --
//! so a single kernel body serves all eight.
//!
//! Within a ring every cell reads only inner-ring cells, which makes the
//! ring dispatch race-free and each `LOS` cell single-writer; between
//! rings the executor's completion barrier orders the writes.

use log::trace;

use crate::engine::Observer;
use crate::executor::Executor;
use crate::structures::{Array2D, SharedArray2D};

/// Initial value of every line-of-sight cell; below any slope a finite
/// height grid can produce.
pub const LOS_FLOOR: f32 = f32::NEG_INFINITY;

#[derive(Clone, Copy)]
enum RingAxis {
    /// The ring radius is applied to `x`: the segment lies on the east or
    /// west edge of the ring.
    X,
    /// The ring radius is applied to `y`: north or south edge.
    Y,
}

/// One octant segment of a ring.
///
/// `edge_bias` is 1 for the four segments that start one cell off the
/// compass axis. Those own their edge's "leading" diagonal, the bias-0
/// segments own the compass axis cell and the other diagonal, and the
/// east/west segments are pinched by the diagonals on both sides; the
/// per-ring lengths in `segment_len` follow from that split, and make
/// each ring an exact partition: every ring cell is computed exactly
/// once.
#[derive(Clone, Copy)]
struct Octant {
    axis: RingAxis,
    ring_sign: isize,
    edge_sign: isize,
    edge_bias: isize,
    /// Parent cell deltas, toward the inner ring.
    parent1: (isize, isize),
    parent2: (isize, isize),
}

const OCTANTS: [Octant; 8] = [
    // NNE
    Octant {
        axis: RingAxis::Y,
        ring_sign: 1,
        edge_sign: 1,
        edge_bias: 1,
        parent1: (-1, -1),
        parent2: (0, -1),
    },
    // NNW
    Octant {
        axis: RingAxis::Y,
        ring_sign: 1,
        edge_sign: -1,
        edge_bias: 0,
        parent1: (1, -1),
        parent2: (0, -1),
    },
    // SSW
    Octant {
        axis: RingAxis::Y,
        ring_sign: -1,
        edge_sign: -1,
        edge_bias: 0,
        parent1: (1, 1),
        parent2: (0, 1),
    },
    // SSE
    Octant {
        axis: RingAxis::Y,
        ring_sign: -1,
        edge_sign: 1,
        edge_bias: 1,
        parent1: (-1, 1),
        parent2: (0, 1),
    },
    // ENE
    Octant {
        axis: RingAxis::X,
        ring_sign: 1,
        edge_sign: 1,
        edge_bias: 1,
        parent1: (-1, 0),
        parent2: (-1, -1),
    },
    // ESE
    Octant {
        axis: RingAxis::X,
        ring_sign: 1,
        edge_sign: -1,
        edge_bias: 0,
        parent1: (-1, 0),
        parent2: (-1, 1),
    },
    // WSW
    Octant {
        axis: RingAxis::X,
        ring_sign: -1,
        edge_sign: -1,
        edge_bias: 0,
        parent1: (1, 0),
        parent2: (1, 1),
    },
    // WNW
    Octant {
        axis: RingAxis::X,
        ring_sign: -1,
        edge_sign: 1,
        edge_bias: 1,
        parent1: (1, 0),
        parent2: (1, -1),
    },
];

impl Octant {
    /// The cell at offset `k` along this segment of ring `r`.
    fn cell(&self, observer: Observer, r: isize, k: isize) -> (isize, isize) {
        let offset = self.edge_sign * (k + self.edge_bias);
        match self.axis {
            RingAxis::Y => (observer.x + offset, observer.y + self.ring_sign * r),
            RingAxis::X => (observer.x + self.ring_sign * r, observer.y + offset),
        }
    }

    /// Number of cells this segment contributes at ring `r`, saturated
    /// against the raster boundary (the closed form of growing each
    /// segment by one cell per ring until it hits the edge).
    fn segment_len(&self, observer: Observer, r: isize, rows: isize, columns: isize) -> isize {
        let (edge_coord, edge_extent, cross_origin, cross_extent) = match self.axis {
            RingAxis::Y => (observer.y + self.ring_sign * r, rows, observer.x, columns),
            RingAxis::X => (observer.x + self.ring_sign * r, columns, observer.y, rows),
        };
        if edge_coord < 0 || edge_coord >= edge_extent {
            return 0;
        }
        let unclamped = match (self.axis, self.edge_bias) {
            (RingAxis::Y, 1) => r,
            (RingAxis::Y, _) => r + 1,
            (RingAxis::X, 1) => r - 1,
            (RingAxis::X, _) => r,
        };
        let room = if self.edge_sign > 0 {
            cross_extent - cross_origin - self.edge_bias
        } else {
            cross_origin + 1
        };
        unclamped.min(room).max(0)
    }
}

/// Segment lengths of one ring plus the flat index mapping over them.
struct RingLayout {
    lens: [isize; 8],
    total: usize,
}

impl RingLayout {
    fn new(observer: Observer, r: isize, rows: isize, columns: isize) -> RingLayout {
        let mut lens = [0isize; 8];
        let mut total = 0usize;
        for (i, octant) in OCTANTS.iter().enumerate() {
            lens[i] = octant.segment_len(observer, r, rows, columns);
            total += lens[i] as usize;
        }
        RingLayout { lens, total }
    }

    /// Maps a flat ring index to `(octant, k)`.
    fn locate(&self, mut index: isize) -> (usize, isize) {
        for (i, &len) in self.lens.iter().enumerate() {
            if index < len {
                return (i, index);
            }
            index -= len;
        }
        unreachable!("ring index out of range");
    }
}

/// The two inner-ring cells a ring cell interpolates between. A diagonal
/// cell lies on a radial ray, so both of its parents collapse onto the
/// inner diagonal; everywhere else the octant table applies. An observer
/// on the raster edge can push one table parent off the grid, in which
/// case the other parent (always on the grid) stands in for it.
fn parent_cells(
    octant: &Octant,
    observer: Observer,
    cell: (isize, isize),
) -> ((isize, isize), (isize, isize)) {
    let (ix, iy) = cell;
    let dx = ix - observer.x;
    let dy = iy - observer.y;
    if dx.abs() == dy.abs() {
        let p = (ix - dx.signum(), iy - dy.signum());
        return (p, p);
    }
    (
        (ix + octant.parent1.0, iy + octant.parent1.1),
        (ix + octant.parent2.0, iy + octant.parent2.1),
    )
}

fn parent_los(
    los: &SharedArray2D<f32>,
    octant: &Octant,
    observer: Observer,
    cell: (isize, isize),
) -> (f32, f32) {
    let (p1, p2) = parent_cells(octant, observer, cell);
    debug_assert!(los.in_bounds(p1.1, p1.0) || los.in_bounds(p2.1, p2.0));
    if !los.in_bounds(p1.1, p1.0) {
        let right = los.get_value(p2.1, p2.0);
        return (right, right);
    }
    let left = los.get_value(p1.1, p1.0);
    if !los.in_bounds(p2.1, p2.0) {
        return (left, left);
    }
    (left, los.get_value(p2.1, p2.0))
}

/// Decides one ring cell from its staged inputs: midpoint-interpolate the
/// parents' slopes, compare against the cell's own slope, record both the
/// visibility bit and the propagated line of sight.
fn commit_cell(
    height: f32,
    left: f32,
    right: f32,
    v: &SharedArray2D<i32>,
    los: &SharedArray2D<f32>,
    observer: Observer,
    cell: (isize, isize),
) {
    let (ix, iy) = cell;
    let interp = (left.min(right) + left.max(right)) * 0.5;
    let dx = (ix - observer.x) as f32;
    let dy = (iy - observer.y) as f32;
    let dist = (dx * dx + dy * dy).sqrt();
    let e = (height - observer.z as f32) / dist;
    if e >= interp {
        v.set_value(iy, ix, 1);
        los.set_value(iy, ix, e);
    } else {
        v.set_value(iy, ix, 0);
        los.set_value(iy, ix, interp);
    }
}

/// Nothing can stand between the observer and its eight neighbours, so
/// ring 1 seeds the wavefront directly: every in-bounds neighbour is
/// visible and carries its own slope.
fn first_ring(
    z: &Array2D<f32>,
    v: &SharedArray2D<i32>,
    los: &SharedArray2D<f32>,
    observer: Observer,
) {
    for dy in -1..=1isize {
        for dx in -1..=1isize {
            if dx == 0 && dy == 0 {
                continue;
            }
            let (ix, iy) = (observer.x + dx, observer.y + dy);
            if !z.in_bounds(iy, ix) {
                continue;
            }
            let dist = ((dx * dx + dy * dy) as f32).sqrt();
            let e = (z.get_value(iy, ix) - observer.z as f32) / dist;
            v.set_value(iy, ix, 1);
            los.set_value(iy, ix, e);
        }
    }
}

pub fn run(
    z: &Array2D<f32>,
    v: &SharedArray2D<i32>,
    los: &SharedArray2D<f32>,
    observer: Observer,
    executor: &dyn Executor,
) {
    run_rings(z, v, los, observer, executor, None);
}

/// The tiled variant: same arithmetic, but each dispatch tile stages its
/// cells' parents and heights into tile-local scratch before evaluating,
/// amortising the shared-grid reads.
pub fn run_tiled(
    z: &Array2D<f32>,
    v: &SharedArray2D<i32>,
    los: &SharedArray2D<f32>,
    observer: Observer,
    executor: &dyn Executor,
    tile_size: usize,
) {
    run_rings(z, v, los, observer, executor, Some(tile_size));
}

fn run_rings(
    z: &Array2D<f32>,
    v: &SharedArray2D<i32>,
    los: &SharedArray2D<f32>,
    observer: Observer,
    executor: &dyn Executor,
    tile_size: Option<usize>,
) {
    let rows = z.rows();
    let columns = z.columns();
    first_ring(z, v, los, observer);
    let max_ring = (rows - 1 - observer.y)
        .max(observer.y)
        .max(columns - 1 - observer.x)
        .max(observer.x);
    for r in 2..=max_ring {
        let layout = RingLayout::new(observer, r, rows, columns);
        if layout.total == 0 {
            continue;
        }
        trace!("ring {} of {}: {} cells", r, max_ring, layout.total);
        match tile_size {
            None => {
                executor.dispatch_1d(layout.total, &|i| {
                    let (octant_index, k) = layout.locate(i as isize);
                    let octant = &OCTANTS[octant_index];
                    let cell = octant.cell(observer, r, k);
                    let (left, right) = parent_los(los, octant, observer, cell);
                    commit_cell(z.get_value(cell.1, cell.0), left, right, v, los, observer, cell);
                });
            }
            Some(tile_size) => {
                executor.dispatch_1d_tiled(layout.total, tile_size, &|start, len| {
                    let mut staged = Vec::with_capacity(len);
                    for local in 0..len {
                        let (octant_index, k) = layout.locate((start + local) as isize);
                        let octant = &OCTANTS[octant_index];
                        let cell = octant.cell(observer, r, k);
                        let (left, right) = parent_los(los, octant, observer, cell);
                        staged.push((cell, left, right, z.get_value(cell.1, cell.0)));
                    }
                    for &(cell, left, right, height) in staged.iter() {
                        commit_cell(height, left, right, v, los, observer, cell);
                    }
                });
            }
        }
        // ring r + 1 interpolates from ring r; it must not start until
        // every LOS write of this ring has committed
        executor.barrier();
    }
}

#[cfg(test)]
mod test {
    use super::{run, run_tiled, RingLayout, LOS_FLOOR, OCTANTS};
    use crate::engine::Observer;
    use crate::executor::SingleThreadExecutor;
    use crate::structures::{Array2D, SharedArray2D};
    use std::collections::HashMap;

    fn viewshed(z: &Array2D<f32>, observer: Observer) -> (SharedArray2D<i32>, SharedArray2D<f32>) {
        let v = SharedArray2D::new(z.rows(), z.columns(), 0);
        let los = SharedArray2D::new(z.rows(), z.columns(), LOS_FLOOR);
        v.set_value(observer.y, observer.x, 1);
        run(z, &v, &los, observer, &SingleThreadExecutor);
        (v, los)
    }

    #[test]
    fn test_rings_partition_the_raster() {
        // every non-observer cell belongs to exactly one (ring, octant, k)
        for &(rows, columns, ox, oy) in &[
            (5isize, 5isize, 2isize, 2isize),
            (7, 7, 0, 3),
            (4, 9, 8, 0),
            (6, 3, 1, 5),
            (1, 8, 4, 0),
        ] {
            let observer = Observer::new(ox, oy, 0);
            let max_ring = (rows - 1 - oy).max(oy).max(columns - 1 - ox).max(ox);
            let mut seen: HashMap<(isize, isize), usize> = HashMap::new();
            for r in 1..=max_ring {
                let layout = RingLayout::new(observer, r, rows, columns);
                for i in 0..layout.total {
                    let (octant_index, k) = layout.locate(i as isize);
                    let cell = OCTANTS[octant_index].cell(observer, r, k);
                    assert!(
                        cell.0 >= 0 && cell.0 < columns && cell.1 >= 0 && cell.1 < rows,
                        "{:?} off a {}x{} raster",
                        cell,
                        rows,
                        columns
                    );
                    assert_eq!(
                        (cell.0 - ox).abs().max((cell.1 - oy).abs()),
                        r,
                        "{:?} not on ring {}",
                        cell,
                        r
                    );
                    *seen.entry(cell).or_insert(0) += 1;
                }
            }
            for x in 0..columns {
                for y in 0..rows {
                    if (x, y) == (ox, oy) {
                        assert!(!seen.contains_key(&(x, y)));
                    } else {
                        assert_eq!(seen.get(&(x, y)), Some(&1), "cell ({}, {})", x, y);
                    }
                }
            }
        }
    }

    #[test]
    fn test_flat_terrain_is_fully_visible() {
        let z: Array2D<f32> = Array2D::new(5, 5, 0f32);
        let (v, _) = viewshed(&z, Observer::new(2, 2, 0));
        for y in 0..5 {
            for x in 0..5 {
                assert_eq!(v.get_value(y, x), 1, "cell ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_flat_terrain_off_centre_observer() {
        let z: Array2D<f32> = Array2D::new(7, 9, 0f32);
        let (v, _) = viewshed(&z, Observer::new(1, 5, 0));
        for y in 0..7 {
            for x in 0..9 {
                assert_eq!(v.get_value(y, x), 1, "cell ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_rising_ramp_is_visible_past_the_narrow_extent() {
        // Z = x from a west-edge observer. The climb axis and the two
        // diagonals ride the wavefront at their exact slopes, and the
        // axis reaching the far column proves the ring loop runs to the
        // wide x extent rather than stopping at the narrow y extent.
        let mut z: Array2D<f32> = Array2D::new(7, 7, 0f32);
        for y in 0..7 {
            for x in 0..7 {
                z.set_value(y, x, x as f32);
            }
        }
        let (v, _) = viewshed(&z, Observer::new(0, 3, 0));
        for x in 1..7 {
            assert_eq!(v.get_value(3, x), 1, "axis cell ({}, 3)", x);
        }
        for d in 1..4 {
            assert_eq!(v.get_value(3 - d, d), 1, "diagonal cell ({}, {})", d, 3 - d);
            assert_eq!(v.get_value(3 + d, d), 1, "diagonal cell ({}, {})", d, 3 + d);
        }
        // the first two rings climb everywhere
        for y in 1..6 {
            for x in 1..3 {
                assert_eq!(v.get_value(y, x), 1, "cell ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_wall_occludes_and_los_propagates() {
        let mut z: Array2D<f32> = Array2D::new(9, 9, 0f32);
        for x in 0..9 {
            z.set_value(6, x, 100f32);
        }
        let (v, los) = viewshed(&z, Observer::new(4, 4, 0));
        // the wall row is on ring 2 and visible; the flat rows behind it
        // are not
        assert_eq!(v.get_value(6, 4), 1);
        assert_eq!(v.get_value(7, 4), 0);
        assert_eq!(v.get_value(8, 4), 0);
        assert_eq!(v.get_value(8, 2), 0);
        // the occluder's slope rides the wavefront outward: the shadowed
        // cells inherit it and it never decays ring over ring
        assert!(los.get_value(7, 4) > 40f32);
        assert_eq!(los.get_value(8, 4), los.get_value(7, 4));
    }

    #[test]
    fn test_los_is_monotone_along_an_axis_radial() {
        let mut z: Array2D<f32> = Array2D::new(7, 7, 0f32);
        for y in 0..7 {
            for x in 0..7 {
                z.set_value(y, x, ((x * 3 + y) % 4) as f32);
            }
        }
        let observer = Observer::new(0, 3, 2);
        let (_, los) = viewshed(&z, observer);
        let mut previous = LOS_FLOOR;
        for x in 1..7 {
            let current = los.get_value(3, x);
            assert!(current >= previous, "LOS fell from {} to {}", previous, current);
            previous = current;
        }
    }

    #[test]
    fn test_unvisited_cells_keep_the_sentinel() {
        let z: Array2D<f32> = Array2D::new(3, 3, 0f32);
        let observer = Observer::new(1, 1, 0);
        let (_, los) = viewshed(&z, observer);
        assert_eq!(los.get_value(1, 1), LOS_FLOOR);
    }

    #[test]
    fn test_observer_on_a_corner_of_a_flat_raster() {
        // east-edge observers push one table parent off the grid on the
        // compass axes; the other parent stands in and the whole raster
        // still reads as visible
        let z: Array2D<f32> = Array2D::new(4, 9, 0f32);
        let (v, _) = viewshed(&z, Observer::new(8, 0, 0));
        for y in 0..4 {
            for x in 0..9 {
                assert_eq!(v.get_value(y, x), 1, "cell ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_tiled_variant_matches_baseline() {
        let mut z: Array2D<f32> = Array2D::new(11, 13, 0f32);
        for y in 0..11 {
            for x in 0..13 {
                z.set_value(y, x, ((x * 7 + y * 13) % 9) as f32);
            }
        }
        let observer = Observer::new(5, 4, 3);
        let (v, los) = viewshed(&z, observer);
        let v_tiled = SharedArray2D::new(11, 13, 0);
        let los_tiled = SharedArray2D::new(11, 13, LOS_FLOOR);
        v_tiled.set_value(observer.y, observer.x, 1);
        run_tiled(&z, &v_tiled, &los_tiled, observer, &SingleThreadExecutor, 8);
        for y in 0..11 {
            for x in 0..13 {
                assert_eq!(v.get_value(y, x), v_tiled.get_value(y, x));
                assert_eq!(los.get_value(y, x), los_tiled.get_value(y, x));
            }
        }
    }
}
