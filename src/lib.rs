/*
This code is part of the viewshed_engine terrain visibility library.
License: MIT
*/

//! Viewshed computation over digital elevation models.
//!
//! Given a rectangular grid of terrain heights and an observer position,
//! the engine produces a binary grid recording which cells have an
//! unobstructed straight line of sight to the observer. Four algorithms
//! with different accuracy/throughput trade-offs are provided: perimeter
//! ray casting with nearest-neighbour sampling ([`Algorithm::Dda`]), with
//! one-sided linear height interpolation ([`Algorithm::R3`]), with
//! interpolation plus visited-cell memoisation ([`Algorithm::R2`]), and a
//! ring-by-ring wavefront ([`Algorithm::XDraw`]).
//!
//! Reading elevation rasters from geospatial files and serialising the
//! result are the caller's concern; the engine operates purely on
//! in-memory grids.
//!
//! ```
//! use viewshed_engine::{compute_viewshed, Algorithm, Array2D, Observer};
//!
//! let mut z: Array2D<f32> = Array2D::new(100, 100, 0f32);
//! z.set_value(50, 60, 250f32);
//! let v = compute_viewshed(&z, Observer::new(50, 50, 2), Algorithm::XDraw).unwrap();
//! assert_eq!(v.get_value(50, 60), 1); // the peak is visible
//! assert_eq!(v.get_value(50, 70), 0); // the flat ground behind it is not
//! ```

mod algorithms;
mod engine;
mod error;
pub mod executor;
pub mod structures;

pub use crate::engine::{compute_viewshed, Algorithm, Observer, ViewshedEngine};
pub use crate::error::ViewshedError;
pub use crate::executor::{Executor, SingleThreadExecutor, ThreadPoolExecutor};
pub use crate::structures::{Array2D, GridScalar, SharedArray2D};
