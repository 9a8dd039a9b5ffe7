/*
This code is part of the viewshed_engine terrain visibility library.
License: MIT
*/

//! R3 viewshed: the DDA ray pattern with one-sided linear interpolation
//! of the sampled height.
//!
//! Where DDA reads the height of the truncated cell, R3 estimates the
//! height at the stepped float position by correcting the rounded cell's
//! height toward the axis neighbours that lie on the same side as the
//! stepped point. The visibility test is strict `>`, which is what
//! grades R3 as the higher-accuracy (and more conservative) variant.

use crate::algorithms::ray::{self, RayStep, RayWalker};
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

/// Height at the stepped float position, estimated from the rounded cell
/// and its two axis neighbours on the stepped point's side of the cell
/// centre. Near the raster border the neighbours are not guaranteed to
/// exist and the rounded cell's height is used unchanged.
pub(super) fn interpolated_height(z: &Array2D<f32>, step: &RayStep) -> f32 {
    let h = z.get_value(step.mark_y, step.mark_x);
    if step.mark_x <= 1
        || step.mark_x >= z.columns() - 1
        || step.mark_y <= 1
        || step.mark_y >= z.rows() - 1
    {
        return h;
    }
    // signed offsets from the stepped position to the cell centre
    let rx = step.mark_x as f32 - step.x;
    let ry = step.mark_y as f32 - step.y;
    let nx = if rx > 0f32 {
        step.mark_x - 1
    } else {
        step.mark_x + 1
    };
    let ny = if ry > 0f32 {
        step.mark_y - 1
    } else {
        step.mark_y + 1
    };
    let mut h_interp = h + (z.get_value(step.mark_y, nx) - h) * rx.abs();
    h_interp += (z.get_value(ny, step.mark_x) - h_interp) * ry.abs();
    h_interp
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
        let slope = (interpolated_height(z, &step) - oz) / dist;
        if slope > running_max {
            v.set_value(step.mark_y, step.mark_x, 1);
            running_max = slope;
        }
    }
}
