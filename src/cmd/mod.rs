//! Command-line entry points.

pub mod info;
pub mod schema;
pub mod split;
