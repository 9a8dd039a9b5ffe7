/*
This code is part of the viewshed_engine terrain visibility library.
License: MIT
*/

//! R2 viewshed: R3 with visited-cell memoisation.
//!
//! A shared mask records which cells have already been decided; a ray
//! stepping onto a masked cell skips the slope computation and leaves the
//! first visitor's result in place. The mask is advisory only. Its reads
//! and writes race under parallel dispatch, so which ray reaches a cell
//! first (and therefore the exact output) can vary from run to run; that
//! nondeterminism is the documented cost of the single-traversal speedup.
//! Run it on `SingleThreadExecutor` when reproducibility matters.

use crate::algorithms::r3;
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
    let visited: SharedArray2D<i32> = SharedArray2D::new(rows, columns, 0);

    executor.dispatch_1d(rows as usize, &|i| {
        for target in ray::row_ray_targets(i as isize, rows, columns) {
            cast_ray(z, v, &visited, origin, oz, target);
        }
    });
    // let the column wave see the row wave's mask, otherwise the
    // memoisation saves nothing on the column rays
    executor.barrier();
    executor.dispatch_1d(columns as usize, &|i| {
        for target in ray::column_ray_targets(i as isize, rows, columns) {
            cast_ray(z, v, &visited, origin, oz, target);
        }
    });
}

fn cast_ray(
    z: &Array2D<f32>,
    v: &SharedArray2D<i32>,
    visited: &SharedArray2D<i32>,
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
        // first visitor is authoritative; a masked cell contributes
        // nothing to this ray's running maximum either
        if visited.get_value(step.mark_y, step.mark_x) != 0 {
            continue;
        }
        let dist = step.distance_from(origin);
        let slope = (r3::interpolated_height(z, &step) - oz) / dist;
        if slope > running_max {
            v.set_value(step.mark_y, step.mark_x, 1);
            running_max = slope;
        }
        visited.set_value(step.mark_y, step.mark_x, 1);
    }
}
