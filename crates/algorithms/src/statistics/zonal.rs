//! Zonal statistics
//!
//! Summarises the raster cells covered by each administrative unit.
//! A cell is covered when its centre lies strictly inside the unit's
//! (multi)polygon; cells on the boundary or inside holes are not covered.
//! Only cells in the geometry's bounding-box window are tested.

use friaje_core::raster::Raster;
use friaje_core::vector::{AdministrativeUnit, BoundarySet};
use friaje_core::{Algorithm, Error, Result, CRS};
use geo::Contains;
use geo_types::{MultiPolygon, Point};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of aggregating one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneStatus {
    /// At least one valid cell was covered
    Valid,
    /// No valid cell was covered (outside the extent or fully masked)
    EmptyZone,
    /// The unit geometry could not be used
    MalformedGeometry,
}

/// Summary of the valid cells of one unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
    pub p10: f64,
    pub p90: f64,
}

impl SummaryStats {
    /// `max - min`
    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    /// Summarise a sample given in cell order.
    ///
    /// `percentiles` are the two percentile ranks stored as `p10` and `p90`.
    /// Returns `None` for an empty sample.
    pub fn from_values(values: &[f64], percentiles: (f64, f64)) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let n = values.len() as f64;
        let sum: f64 = values.iter().sum();
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let min = sorted[0];
        let max = sorted[sorted.len() - 1];
        // Rounding in the sum can push the mean of a constant sample past its bounds
        let mean = (sum / n).clamp(min, max);
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Some(Self {
            min,
            max,
            mean,
            std: variance.sqrt(),
            p10: percentile(&sorted, percentiles.0)?,
            p90: percentile(&sorted, percentiles.1)?,
        })
    }
}

/// Zonal statistics for one administrative unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonalStatistics {
    pub unit_id: String,
    /// Number of valid covered cells
    pub count: usize,
    pub status: ZoneStatus,
    /// `None` exactly when `count == 0`
    pub summary: Option<SummaryStats>,
}

impl ZonalStatistics {
    fn without_cells(unit_id: &str, status: ZoneStatus) -> Self {
        Self {
            unit_id: unit_id.to_string(),
            count: 0,
            status,
            summary: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status == ZoneStatus::Valid
    }
}

/// Parameters for zonal aggregation
#[derive(Debug, Clone, Copy)]
pub struct ZonalParams {
    /// Lower and upper percentile ranks (0-100)
    pub percentiles: (f64, f64),
    /// Treat a raster without a CRS as a coordinate mismatch
    pub strict_crs: bool,
}

impl Default for ZonalParams {
    fn default() -> Self {
        Self {
            percentiles: (10.0, 90.0),
            strict_crs: false,
        }
    }
}

/// Zonal aggregation stage
#[derive(Debug, Clone, Default)]
pub struct ZonalAggregator;

impl Algorithm for ZonalAggregator {
    type Input = (Arc<Raster<f64>>, Arc<BoundarySet>);
    type Output = Vec<ZonalStatistics>;
    type Params = ZonalParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "ZonalAggregator"
    }

    fn description(&self) -> &'static str {
        "Per-unit min, max, mean, std and percentiles of covered raster cells"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (raster, boundaries) = input;
        zonal_statistics(&raster, &boundaries, &params)
    }
}

/// Linear-interpolation percentile of an ascending sample.
///
/// `rank = p / 100 * (n - 1)`; the result interpolates between the order
/// statistics on either side of `rank`.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=100.0).contains(&p) {
        return None;
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    Some(sorted[lo] + (rank - lo as f64) * (sorted[hi] - sorted[lo]))
}

/// Check that raster and boundaries share a reference system.
///
/// A raster without a CRS is assumed to be in the boundary CRS (with a
/// warning) unless `strict` is set.
pub fn check_crs(raster_crs: Option<&CRS>, boundary_crs: &CRS, strict: bool) -> Result<()> {
    match raster_crs {
        Some(crs) if crs.is_equivalent(boundary_crs) => Ok(()),
        Some(crs) => Err(Error::CoordinateMismatch(
            crs.identifier(),
            boundary_crs.identifier(),
        )),
        None if strict => Err(Error::CoordinateMismatch(
            "undefined".to_string(),
            boundary_crs.identifier(),
        )),
        None => {
            warn!(
                "Raster has no CRS; assuming boundary CRS {}",
                boundary_crs.identifier()
            );
            Ok(())
        }
    }
}

/// Compute zonal statistics for every unit, in boundary-set order.
///
/// Fails only on a CRS mismatch or invalid percentile ranks. Malformed and
/// empty units are reported through [`ZoneStatus`].
pub fn zonal_statistics(
    raster: &Raster<f64>,
    boundaries: &BoundarySet,
    params: &ZonalParams,
) -> Result<Vec<ZonalStatistics>> {
    let (lo, hi) = params.percentiles;
    if !(0.0..=100.0).contains(&lo) || !(0.0..=100.0).contains(&hi) || lo > hi {
        return Err(Error::Other(format!(
            "percentile ranks must satisfy 0 <= lo <= hi <= 100, got ({}, {})",
            lo, hi
        )));
    }

    check_crs(raster.crs(), &boundaries.crs, params.strict_crs)?;

    let results: Vec<ZonalStatistics> = boundaries
        .iter()
        .map(|unit| unit_statistics(raster, unit, params))
        .collect();

    let valid = results.iter().filter(|r| r.is_valid()).count();
    info!("Zonal statistics: {} of {} units with data", valid, results.len());
    Ok(results)
}

/// Zonal statistics for a single unit
pub fn unit_statistics(
    raster: &Raster<f64>,
    unit: &AdministrativeUnit,
    params: &ZonalParams,
) -> ZonalStatistics {
    let geometry = match unit.validate() {
        Ok(geometry) => geometry,
        Err(e) => {
            warn!("Skipping {} ({}): {}", unit.unit_id, unit.name, e);
            return ZonalStatistics::without_cells(&unit.unit_id, ZoneStatus::MalformedGeometry);
        }
    };

    let values = covered_values(raster, unit, geometry);
    match SummaryStats::from_values(&values, params.percentiles) {
        Some(summary) => ZonalStatistics {
            unit_id: unit.unit_id.clone(),
            count: values.len(),
            status: ZoneStatus::Valid,
            summary: Some(summary),
        },
        None => {
            debug!("Unit {} ({}) covers no valid cells", unit.unit_id, unit.name);
            ZonalStatistics::without_cells(&unit.unit_id, ZoneStatus::EmptyZone)
        }
    }
}

/// Valid cell values whose centres fall inside `geometry`, in row-major order
fn covered_values(
    raster: &Raster<f64>,
    unit: &AdministrativeUnit,
    geometry: &MultiPolygon<f64>,
) -> Vec<f64> {
    let Some((min_x, min_y, max_x, max_y)) = unit.bounds() else {
        return Vec::new();
    };
    let Some(window) = raster.window(min_x, min_y, max_x, max_y) else {
        return Vec::new();
    };

    window
        .cells()
        .filter_map(|(row, col)| {
            let value = raster.valid_value(row, col)?;
            let (x, y) = raster.pixel_to_geo(col, row);
            geometry.contains(&Point::new(x, y)).then_some(value)
        })
        .collect()
}
