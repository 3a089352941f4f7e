//! Zonal statistics of a raster over administrative units

pub mod zonal;

pub use zonal::{
    check_crs, percentile, unit_statistics, zonal_statistics, SummaryStats, ZonalAggregator,
    ZonalParams, ZonalStatistics, ZoneStatus,
};
