/*
This code is part of the viewshed_engine terrain visibility library.
License: MIT
*/

use log::debug;

use crate::algorithms::{dda, r2, r3, xdraw};
use crate::error::ViewshedError;
use crate::executor::{Executor, ThreadPoolExecutor};
use crate::structures::{Array2D, SharedArray2D};

/// The viewing station: integer grid coordinates plus the absolute height
/// reference every slope is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observer {
    pub x: isize,
    pub y: isize,
    pub z: i32,
}

impl Observer {
    pub fn new(x: isize, y: isize, z: i32) -> Observer {
        Observer { x, y, z }
    }
}

/// The four viewshed algorithms, ordered here from highest throughput to
/// highest accuracy. The discriminants are fixed interface values shared
/// with non-Rust callers and must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Algorithm {
    /// Ring-by-ring wavefront with interpolated line-of-sight
    /// propagation.
    XDraw = 1,
    /// Perimeter ray casting with nearest-neighbour height sampling.
    Dda = 3,
    /// Perimeter ray casting with one-sided linear height interpolation.
    R3 = 4,
    /// R3 with visited-cell memoisation. The memo mask races under
    /// parallel dispatch, so output can differ between runs; see the
    /// algorithm module for the trade-off.
    R2 = 5,
}

impl Algorithm {
    /// Resolves an interface tag to an algorithm.
    pub fn from_tag(tag: i32) -> Result<Algorithm, ViewshedError> {
        match tag {
            1 => Ok(Algorithm::XDraw),
            3 => Ok(Algorithm::Dda),
            4 => Ok(Algorithm::R3),
            5 => Ok(Algorithm::R2),
            _ => Err(ViewshedError::UnknownAlgorithm(tag)),
        }
    }

    pub fn tag(self) -> i32 {
        self as i32
    }
}

/// Computes viewsheds with a caller-chosen executor and dispatch options.
///
/// ```
/// use viewshed_engine::{Algorithm, Array2D, Observer, ViewshedEngine};
///
/// let z: Array2D<f32> = Array2D::new(64, 64, 0f32);
/// let engine = ViewshedEngine::default();
/// let v = engine.compute(&z, Observer::new(32, 32, 10), Algorithm::XDraw).unwrap();
/// assert_eq!(v.get_value(32, 32), 1);
/// ```
pub struct ViewshedEngine {
    executor: Box<dyn Executor>,
    xdraw_tile_size: Option<usize>,
}

impl Default for ViewshedEngine {
    fn default() -> ViewshedEngine {
        ViewshedEngine::new(Box::new(ThreadPoolExecutor::default()))
    }
}

impl ViewshedEngine {
    pub fn new(executor: Box<dyn Executor>) -> ViewshedEngine {
        ViewshedEngine {
            executor,
            xdraw_tile_size: None,
        }
    }

    /// Routes the XDraw wavefront through the tiled dispatch path with
    /// the given tile size. Numerically identical to the untiled path.
    pub fn with_tile_size(mut self, tile_size: usize) -> ViewshedEngine {
        assert!(tile_size > 0, "tile size must be non-zero");
        self.xdraw_tile_size = Some(tile_size);
        self
    }

    /// Allocates the output grid (and, for XDraw, the auxiliary
    /// line-of-sight grid) and computes the viewshed into it.
    pub fn compute(
        &self,
        z: &Array2D<f32>,
        observer: Observer,
        algorithm: Algorithm,
    ) -> Result<Array2D<i32>, ViewshedError> {
        let mut v: Array2D<i32> = Array2D::new(z.rows(), z.columns(), 0);
        match algorithm {
            Algorithm::XDraw => {
                let mut los: Array2D<f32> = Array2D::new(z.rows(), z.columns(), xdraw::LOS_FLOOR);
                self.compute_into(z, &mut v, Some(&mut los), observer, algorithm)?;
            }
            _ => self.compute_into(z, &mut v, None, observer, algorithm)?,
        }
        Ok(v)
    }

    /// Computes the viewshed into caller-supplied grids. `los` must be
    /// supplied for [`Algorithm::XDraw`] and receives the final
    /// line-of-sight surface; other algorithms only check its shape. Both
    /// output grids are fully overwritten on success and untouched on
    /// error.
    pub fn compute_into(
        &self,
        z: &Array2D<f32>,
        v: &mut Array2D<i32>,
        los: Option<&mut Array2D<f32>>,
        observer: Observer,
        algorithm: Algorithm,
    ) -> Result<(), ViewshedError> {
        let rows = z.rows();
        let columns = z.columns();
        if v.rows() != rows || v.columns() != columns {
            return Err(ViewshedError::InvalidShape {
                expected_rows: rows,
                expected_columns: columns,
                rows: v.rows(),
                columns: v.columns(),
            });
        }
        if let Some(los) = los.as_deref() {
            if los.rows() != rows || los.columns() != columns {
                return Err(ViewshedError::InvalidShape {
                    expected_rows: rows,
                    expected_columns: columns,
                    rows: los.rows(),
                    columns: los.columns(),
                });
            }
        }
        if observer.x < 0 || observer.x >= columns || observer.y < 0 || observer.y >= rows {
            return Err(ViewshedError::ObserverOutOfRange {
                x: observer.x,
                y: observer.y,
                rows,
                columns,
            });
        }
        debug!(
            "computing {:?} viewshed of a {}x{} raster from ({}, {}, {})",
            algorithm, rows, columns, observer.x, observer.y, observer.z
        );

        let shared_v: SharedArray2D<i32> = SharedArray2D::new(rows, columns, 0);
        // the observer sees itself
        shared_v.set_value(observer.y, observer.x, 1);

        let executor = self.executor.as_ref();
        match algorithm {
            Algorithm::Dda => dda::run(z, &shared_v, observer, executor),
            Algorithm::R3 => r3::run(z, &shared_v, observer, executor),
            Algorithm::R2 => r2::run(z, &shared_v, observer, executor),
            Algorithm::XDraw => {
                let los = match los {
                    Some(los) => los,
                    None => return Err(ViewshedError::MissingAuxiliaryGrid),
                };
                let shared_los: SharedArray2D<f32> =
                    SharedArray2D::new(rows, columns, xdraw::LOS_FLOOR);
                match self.xdraw_tile_size {
                    Some(tile_size) => {
                        xdraw::run_tiled(z, &shared_v, &shared_los, observer, executor, tile_size)
                    }
                    None => xdraw::run(z, &shared_v, &shared_los, observer, executor),
                }
                shared_los.copy_into(los);
            }
        }
        shared_v.copy_into(v);
        Ok(())
    }
}

/// Computes the viewshed of `z` from `observer` with the default engine
/// (a thread pool sized to the machine). Returns the populated visibility
/// grid: `1` where the straight line of sight from the observer to the
/// cell is unobstructed by intermediate terrain, `0` elsewhere.
pub fn compute_viewshed(
    z: &Array2D<f32>,
    observer: Observer,
    algorithm: Algorithm,
) -> Result<Array2D<i32>, ViewshedError> {
    ViewshedEngine::default().compute(z, observer, algorithm)
}
