/*
This code is part of the viewshed_engine terrain visibility library.
License: MIT
*/
// private sub-modules defined in other files
pub(crate) mod dda;
pub(crate) mod r2;
pub(crate) mod r3;
pub(crate) mod ray;
pub(crate) mod xdraw;
