//! # Friaje Core
//!
//! Core types and I/O for the Tmin zonal risk analysis.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced grid of temperature samples
//! - `GeoTransform`: affine transformation for georeferencing
//! - `CRS`: coordinate reference system identity and equivalence
//! - `AdministrativeUnit` / `BoundarySet`: the zones to aggregate over
//! - I/O for GeoTIFF rasters, GeoJSON boundaries and result tables
//! - `DatasetCache`: memoized loading keyed by file path and fingerprint

pub mod cache;
pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement};
pub use vector::{AdministrativeUnit, BoundarySet};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::vector::{AdministrativeUnit, BoundarySet};
    pub use crate::Algorithm;
}

/// Core trait for the analysis stages.
///
/// Stages are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the stage
    type Input;
    /// Output type for the stage
    type Output;
    /// Parameters controlling stage behavior
    type Params: Default;
    /// Error type for stage execution
    type Error: std::error::Error;

    /// Returns the stage name
    fn name(&self) -> &'static str;

    /// Returns a description of what the stage does
    fn description(&self) -> &'static str;

    /// Execute the stage
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
