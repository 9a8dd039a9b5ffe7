/*
This code is part of the viewshed_engine terrain visibility library.
License: MIT
*/

//! DDA viewshed: one ray per perimeter cell, nearest-neighbour height
//! sampling.
//!
//! Along each ray the kernel tracks the highest slope
//! `(Z[cell] - oz) / distance` seen so far; a stepped cell is visible iff
//! its slope is at least the running maximum. The `>=` comparison keeps
//! equal-slope cells on the same ray visible, which is what makes flat
//! terrain read as visible along every traced ray.

use crate::algorithms::ray::{self, RayWalker};
use crate::engine::Observer;
use crate::executor::Executor;
use crate::structures::{Array2D, SharedArray2D};

pub fn run(
    z: &Array2D<f32>,
    v: &SharedArray2D<i32>,
    observer: Observer,
    executor: &dyn Executor,
) {
    let rows = z.rows();
    let columns = z.columns();
    let origin = (observer.x, observer.y);
    let oz = observer.z as f32;

    // one wave of rays per row pair, one per column pair; the waves are
    // independent because every write is V := 1
    executor.dispatch_1d(rows as usize, &|i| {
        for target in ray::row_ray_targets(i as isize, rows, columns) {
            cast_ray(z, v, origin, oz, target);
        }
    });
    executor.dispatch_1d(columns as usize, &|i| {
        for target in ray::column_ray_targets(i as isize, rows, columns) {
            cast_ray(z, v, origin, oz, target);
        }
    });
}

fn cast_ray(
    z: &Array2D<f32>,
    v: &SharedArray2D<i32>,
    origin: (isize, isize),
    oz: f32,
    target: (isize, isize),
) {
    let walker = match RayWalker::new(origin, target) {
        Some(walker) => walker,
        None => return,
    };
    let mut running_max = f32::NEG_INFINITY;
    for step in walker {
        let dist = step.distance_from(origin);
        let slope = (z.get_value(step.cell_y, step.cell_x) - oz) / dist;
        if slope >= running_max {
            v.set_value(step.mark_y, step.mark_x, 1);
            running_max = slope;
        }
    }
}
