/*
This code is part of the viewshed_engine terrain visibility library.
License: MIT
*/

use thiserror::Error;

/// Caller errors, detected before any work is dispatched. When one of
/// these is returned the output grids have not been touched. The kernels
/// themselves are infallible: every index they issue is derived from loop
/// counters bounded by the validated inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ViewshedError {
    /// An output grid does not match the elevation grid's dimensions.
    #[error("output grid is {rows}x{columns} but the elevation grid is {expected_rows}x{expected_columns}")]
    InvalidShape {
        expected_rows: isize,
        expected_columns: isize,
        rows: isize,
        columns: isize,
    },

    /// The observer does not lie on the raster.
    #[error("observer ({x}, {y}) lies outside the {rows}x{columns} raster")]
    ObserverOutOfRange {
        x: isize,
        y: isize,
        rows: isize,
        columns: isize,
    },

    /// XDraw was selected without the line-of-sight grid it propagates
    /// through.
    #[error("the XDraw algorithm requires a line-of-sight grid")]
    MissingAuxiliaryGrid,

    /// The algorithm tag is not one of the four known values.
    #[error("unknown algorithm tag {0}")]
    UnknownAlgorithm(i32),
}
