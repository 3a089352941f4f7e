//! I/O for rasters, boundaries and result tables

mod boundaries;
mod geotiff;
mod results;

pub use boundaries::{parse_boundaries, read_boundaries, BoundaryOptions};
pub use geotiff::{read_geotiff, write_geotiff};
pub use results::{
    read_results_csv, write_csv, write_results_csv, write_results_geojson, ResultRow, RESULT_COLUMNS,
};
