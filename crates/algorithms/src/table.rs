//! Result table
//!
//! One [`AnalysisResult`] per administrative unit, in boundary order, joining
//! the unit, its zonal statistics and its risk record. The table is read-only
//! once built; the query methods here are what the reporting commands use.

use crate::classification::{parse_risk_label, risk_label, Metric, RiskLevel, RiskRecord};
use crate::statistics::{SummaryStats, ZonalStatistics};
use friaje_core::io::{read_results_csv, write_results_csv, write_results_geojson, ResultRow};
use friaje_core::vector::BoundarySet;
use friaje_core::{Error, Result};
use geo_types::MultiPolygon;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Default number of histogram bins
pub const DEFAULT_BINS: usize = 30;

/// Joined analysis output for one unit
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub unit_id: String,
    pub name: String,
    /// Absent for malformed units and for tables read back from CSV
    pub geometry: Option<MultiPolygon<f64>>,
    pub count: usize,
    pub summary: Option<SummaryStats>,
    pub risk_level: Option<RiskLevel>,
    pub frost_risk: bool,
    pub extreme_cold: bool,
}

impl AnalysisResult {
    pub fn mean(&self) -> Option<f64> {
        self.metric(Metric::Mean)
    }

    /// Value of a statistic, `None` when the unit has no valid cells
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        self.summary.as_ref().map(|s| metric.value(s))
    }

    pub fn is_classifiable(&self) -> bool {
        self.risk_level.is_some()
    }

    pub fn risk_label(&self) -> &'static str {
        risk_label(self.risk_level)
    }

    pub fn to_row(&self) -> ResultRow {
        let s = self.summary.as_ref();
        ResultRow {
            unit_id: self.unit_id.clone(),
            name: self.name.clone(),
            count: self.count,
            min: s.map(|s| s.min),
            max: s.map(|s| s.max),
            mean: s.map(|s| s.mean),
            std: s.map(|s| s.std),
            p10: s.map(|s| s.p10),
            p90: s.map(|s| s.p90),
            range: s.map(|s| s.range()),
            frost_risk: self.frost_risk,
            extreme_cold: self.extreme_cold,
            risk_level: self.risk_label().to_string(),
        }
    }

    /// Rebuild a result from a persisted row (without geometry)
    pub fn from_row(row: ResultRow) -> Result<Self> {
        let summary = match (row.min, row.max, row.mean, row.std, row.p10, row.p90) {
            (Some(min), Some(max), Some(mean), Some(std), Some(p10), Some(p90)) => Some(SummaryStats {
                min,
                max,
                mean,
                std,
                p10,
                p90,
            }),
            _ => None,
        };
        if (row.count > 0) != summary.is_some() {
            return Err(Error::Other(format!(
                "unit {}: count {} does not match its statistics",
                row.unit_id, row.count
            )));
        }

        Ok(Self {
            risk_level: parse_risk_label(&row.risk_level)?,
            unit_id: row.unit_id,
            name: row.name,
            geometry: None,
            count: row.count,
            summary,
            frost_risk: row.frost_risk,
            extreme_cold: row.extreme_cold,
        })
    }
}

/// Selection applied by [`ResultTable::filter`]
#[derive(Debug, Clone, Default)]
pub struct ResultFilter {
    /// Tiers to keep (`None` = unclassifiable); empty keeps all tiers
    pub risk_levels: Vec<Option<RiskLevel>>,
    /// Keep units whose mean is at or below this; units without a mean are dropped
    pub max_mean: Option<f64>,
}

impl ResultFilter {
    pub fn matches(&self, result: &AnalysisResult) -> bool {
        let level_ok = self.risk_levels.is_empty() || self.risk_levels.contains(&result.risk_level);
        let mean_ok = self
            .max_mean
            .map_or(true, |t| result.mean().is_some_and(|m| m <= t));
        level_ok && mean_ok
    }
}

/// Equal-width histogram of one statistic
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub metric: Metric,
    /// `counts.len() + 1` bin edges
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    /// `(lower edge, upper edge, count)` per bin
    pub fn bins(&self) -> impl Iterator<Item = (f64, f64, usize)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .map(move |(i, &c)| (self.edges[i], self.edges[i + 1], c))
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Headline numbers of a table
#[derive(Debug, Clone, PartialEq)]
pub struct TableSummary {
    pub units: usize,
    pub classifiable: usize,
    pub mean_of_means: Option<f64>,
    /// Lowest and highest unit mean
    pub mean_range: Option<(f64, f64)>,
    /// Lowest unit minimum
    pub coldest_min: Option<f64>,
    /// Highest unit minimum
    pub warmest_min: Option<f64>,
    /// Percentage of classifiable units with frost risk
    pub frost_share: f64,
    /// Percentage of classifiable units with extreme cold
    pub extreme_cold_share: f64,
}

/// Per-unit results of one analysis run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    results: Vec<AnalysisResult>,
}

impl ResultTable {
    pub fn new(results: Vec<AnalysisResult>) -> Self {
        Self { results }
    }

    /// Join units, statistics and risk records on `unit_id`, in boundary order
    pub fn join(
        boundaries: &BoundarySet,
        stats: Vec<ZonalStatistics>,
        records: Vec<RiskRecord>,
    ) -> Result<Self> {
        let mut stats: HashMap<String, ZonalStatistics> =
            stats.into_iter().map(|s| (s.unit_id.clone(), s)).collect();
        let mut records: HashMap<String, RiskRecord> =
            records.into_iter().map(|r| (r.unit_id.clone(), r)).collect();

        let results = boundaries
            .iter()
            .map(|unit| -> Result<AnalysisResult> {
                let missing = |what: &str| {
                    Error::Other(format!("no {} for unit {}", what, unit.unit_id))
                };
                let s = stats.remove(&unit.unit_id).ok_or_else(|| missing("zonal statistics"))?;
                let r = records.remove(&unit.unit_id).ok_or_else(|| missing("risk record"))?;
                Ok(AnalysisResult {
                    unit_id: unit.unit_id.clone(),
                    name: unit.name.clone(),
                    geometry: unit.geometry.clone(),
                    count: s.count,
                    summary: s.summary,
                    risk_level: r.risk_level,
                    frost_risk: r.frost_risk,
                    extreme_cold: r.extreme_cold,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { results })
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnalysisResult> {
        self.results.iter()
    }

    pub fn results(&self) -> &[AnalysisResult] {
        &self.results
    }

    pub fn get(&self, unit_id: &str) -> Option<&AnalysisResult> {
        self.results.iter().find(|r| r.unit_id == unit_id)
    }

    pub fn to_rows(&self) -> Vec<ResultRow> {
        self.results.iter().map(AnalysisResult::to_row).collect()
    }

    pub fn from_rows(rows: Vec<ResultRow>) -> Result<Self> {
        rows.into_iter()
            .map(AnalysisResult::from_row)
            .collect::<Result<Vec<_>>>()
            .map(Self::new)
    }

    // Persistence

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_results_csv(&self.to_rows(), path.as_ref())?;
        info!("Wrote {} rows to {}", self.len(), path.as_ref().display());
        Ok(())
    }

    pub fn write_geojson<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let features: Vec<_> = self
            .results
            .iter()
            .map(|r| (r.to_row(), r.geometry.as_ref()))
            .collect();
        write_results_geojson(&features, path.as_ref())?;
        info!("Wrote {} features to {}", self.len(), path.as_ref().display());
        Ok(())
    }

    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_rows(read_results_csv(path)?)
    }

    // Queries

    /// Results matching `filter`, in table order
    pub fn filter(&self, filter: &ResultFilter) -> ResultTable {
        Self::new(self.results.iter().filter(|r| filter.matches(r)).cloned().collect())
    }

    /// Up to `n` units with the lowest mean; ties keep table order
    pub fn coldest(&self, n: usize) -> Vec<&AnalysisResult> {
        let mut ranked = self.with_mean();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
        ranked.into_iter().take(n).map(|(_, r)| r).collect()
    }

    /// Up to `n` units with the highest mean; ties keep table order
    pub fn warmest(&self, n: usize) -> Vec<&AnalysisResult> {
        let mut ranked = self.with_mean();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        ranked.into_iter().take(n).map(|(_, r)| r).collect()
    }

    fn with_mean(&self) -> Vec<(f64, &AnalysisResult)> {
        self.results
            .iter()
            .filter_map(|r| r.mean().map(|m| (m, r)))
            .collect()
    }

    /// Unit count per tier: Very High, High, Medium, Low, then unclassifiable
    pub fn risk_distribution(&self) -> Vec<(Option<RiskLevel>, usize)> {
        RiskLevel::DESCENDING
            .iter()
            .map(|&l| Some(l))
            .chain(std::iter::once(None))
            .map(|level| {
                let n = self.results.iter().filter(|r| r.risk_level == level).count();
                (level, n)
            })
            .collect()
    }

    /// Values of `metric` over units that have statistics, in table order
    pub fn values(&self, metric: Metric) -> Vec<f64> {
        self.results.iter().filter_map(|r| r.metric(metric)).collect()
    }

    /// Equal-width histogram of `metric`; `None` without data or bins
    pub fn histogram(&self, metric: Metric, bins: usize) -> Option<Histogram> {
        let values = self.values(metric);
        if values.is_empty() || bins == 0 {
            return None;
        }

        let mut lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let mut hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }
        let width = (hi - lo) / bins as f64;

        let mut counts = vec![0usize; bins];
        for v in values {
            let bin = (((v - lo) / width).floor() as usize).min(bins - 1);
            counts[bin] += 1;
        }
        let edges = (0..=bins).map(|i| lo + i as f64 * width).collect();

        Some(Histogram {
            metric,
            edges,
            counts,
        })
    }

    pub fn summary(&self) -> TableSummary {
        let means = self.values(Metric::Mean);
        let mins = self.values(Metric::Min);
        let classifiable = self.results.iter().filter(|r| r.is_classifiable()).count();

        let share = |pred: fn(&AnalysisResult) -> bool| {
            if classifiable == 0 {
                return 0.0;
            }
            let n = self
                .results
                .iter()
                .filter(|r| r.is_classifiable() && pred(r))
                .count();
            100.0 * n as f64 / classifiable as f64
        };

        TableSummary {
            units: self.len(),
            classifiable,
            mean_of_means: (!means.is_empty()).then(|| means.iter().sum::<f64>() / means.len() as f64),
            mean_range: min_max(&means),
            coldest_min: min_max(&mins).map(|(lo, _)| lo),
            warmest_min: min_max(&mins).map(|(_, hi)| hi),
            frost_share: share(|r| r.frost_risk),
            extreme_cold_share: share(|r| r.extreme_cold),
        }
    }
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
    )
}
