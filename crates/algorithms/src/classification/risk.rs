//! Threshold-based climate risk classification
//!
//! Each unit gets a risk tier from an ordered rule list (first match wins,
//! otherwise the fallback tier) plus two independent flags: frost risk
//! (`min` below the frost threshold) and extreme cold (`p10` below the
//! extreme-cold threshold). Units without statistics are unclassifiable.

use crate::statistics::{SummaryStats, ZonalStatistics};
use friaje_core::{Algorithm, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Label used for units that could not be classified
pub const UNCLASSIFIABLE: &str = "Unclassifiable";

/// Risk tier, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl RiskLevel {
    /// All tiers, most severe first
    pub const DESCENDING: [RiskLevel; 4] = [
        RiskLevel::VeryHigh,
        RiskLevel::High,
        RiskLevel::Medium,
        RiskLevel::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::VeryHigh => "Very High",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "veryhigh" => Ok(RiskLevel::VeryHigh),
            _ => Err(Error::Other(format!("unknown risk level: '{}'", s))),
        }
    }
}

/// Display label for an optional tier
pub fn risk_label(level: Option<RiskLevel>) -> &'static str {
    level.map_or(UNCLASSIFIABLE, |l| l.as_str())
}

/// Parse a label written by [`risk_label`]
pub fn parse_risk_label(label: &str) -> Result<Option<RiskLevel>> {
    if label.trim().eq_ignore_ascii_case(UNCLASSIFIABLE) {
        Ok(None)
    } else {
        label.parse().map(Some)
    }
}

/// Statistic a rule compares against its threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Min,
    Max,
    Mean,
    Std,
    P10,
    P90,
    Range,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Min => "min",
            Metric::Max => "max",
            Metric::Mean => "mean",
            Metric::Std => "std",
            Metric::P10 => "p10",
            Metric::P90 => "p90",
            Metric::Range => "range",
        }
    }

    /// Value of this statistic in `stats`
    pub fn value(&self, stats: &SummaryStats) -> f64 {
        match self {
            Metric::Min => stats.min,
            Metric::Max => stats.max,
            Metric::Mean => stats.mean,
            Metric::Std => stats.std,
            Metric::P10 => stats.p10,
            Metric::P90 => stats.p90,
            Metric::Range => stats.range(),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "min" => Ok(Metric::Min),
            "max" => Ok(Metric::Max),
            "mean" => Ok(Metric::Mean),
            "std" => Ok(Metric::Std),
            "p10" => Ok(Metric::P10),
            "p90" => Ok(Metric::P90),
            "range" => Ok(Metric::Range),
            _ => Err(Error::Other(format!(
                "unknown statistic '{}' (expected min, max, mean, std, p10, p90 or range)",
                s
            ))),
        }
    }
}

/// `level` applies when `metric < threshold`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskRule {
    pub level: RiskLevel,
    pub metric: Metric,
    pub threshold: f64,
}

impl RiskRule {
    pub fn new(level: RiskLevel, metric: Metric, threshold: f64) -> Self {
        Self {
            level,
            metric,
            threshold,
        }
    }

    pub fn matches(&self, stats: &SummaryStats) -> bool {
        self.metric.value(stats) < self.threshold
    }
}

fn default_frost_threshold() -> f64 {
    0.0
}

fn default_extreme_cold_threshold() -> f64 {
    -5.0
}

/// Ordered rule list with a fallback tier and the flag thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRuleSet {
    pub rules: Vec<RiskRule>,
    pub fallback: RiskLevel,
    /// `frost_risk` when `min` is below this (°C)
    #[serde(default = "default_frost_threshold")]
    pub frost_threshold: f64,
    /// `extreme_cold` when `p10` is below this (°C)
    #[serde(default = "default_extreme_cold_threshold")]
    pub extreme_cold_threshold: f64,
}

impl Default for RiskRuleSet {
    fn default() -> Self {
        Self {
            rules: vec![
                RiskRule::new(RiskLevel::VeryHigh, Metric::Min, -10.0),
                RiskRule::new(RiskLevel::High, Metric::Mean, 0.0),
                RiskRule::new(RiskLevel::Medium, Metric::Mean, 5.0),
            ],
            fallback: RiskLevel::Low,
            frost_threshold: default_frost_threshold(),
            extreme_cold_threshold: default_extreme_cold_threshold(),
        }
    }
}

impl RiskRuleSet {
    /// Parse and validate a rule set from JSON
    pub fn from_json(text: &str) -> Result<Self> {
        let rules: RiskRuleSet =
            serde_json::from_str(text).map_err(|e| Error::InvalidRules(e.to_string()))?;
        rules.validate()?;
        Ok(rules)
    }

    /// Read a rule set from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::unavailable(path, e))?;
        Self::from_json(&text)
    }

    /// Reject empty rule lists and non-finite thresholds
    pub fn validate(&self) -> Result<()> {
        if self.rules.is_empty() {
            return Err(Error::InvalidRules("rule list is empty".into()));
        }
        if let Some(rule) = self.rules.iter().find(|r| !r.threshold.is_finite()) {
            return Err(Error::InvalidRules(format!(
                "threshold for {} ({}) is not finite",
                rule.level, rule.metric
            )));
        }
        if !self.frost_threshold.is_finite() || !self.extreme_cold_threshold.is_finite() {
            return Err(Error::InvalidRules("flag thresholds must be finite".into()));
        }
        Ok(())
    }

    /// Tier for a classifiable unit: first matching rule, else the fallback
    pub fn level_for(&self, stats: &SummaryStats) -> RiskLevel {
        self.rules
            .iter()
            .find(|rule| rule.matches(stats))
            .map_or(self.fallback, |rule| rule.level)
    }
}

/// Risk classification of one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRecord {
    pub unit_id: String,
    /// `None` when the unit has no valid cells
    pub risk_level: Option<RiskLevel>,
    pub frost_risk: bool,
    pub extreme_cold: bool,
}

impl RiskRecord {
    pub fn label(&self) -> &'static str {
        risk_label(self.risk_level)
    }
}

/// Classifier holding a validated rule set
#[derive(Debug, Clone, Default)]
pub struct RiskClassifier {
    rules: RiskRuleSet,
}

impl RiskClassifier {
    pub fn new(rules: RiskRuleSet) -> Result<Self> {
        rules.validate()?;
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &RiskRuleSet {
        &self.rules
    }

    /// Classify one unit
    pub fn classify(&self, stats: &ZonalStatistics) -> RiskRecord {
        match &stats.summary {
            Some(summary) => RiskRecord {
                unit_id: stats.unit_id.clone(),
                risk_level: Some(self.rules.level_for(summary)),
                frost_risk: summary.min < self.rules.frost_threshold,
                extreme_cold: summary.p10 < self.rules.extreme_cold_threshold,
            },
            None => RiskRecord {
                unit_id: stats.unit_id.clone(),
                risk_level: None,
                frost_risk: false,
                extreme_cold: false,
            },
        }
    }

    /// Classify every unit, keeping order
    pub fn classify_all(&self, stats: &[ZonalStatistics]) -> Vec<RiskRecord> {
        stats.iter().map(|s| self.classify(s)).collect()
    }
}

/// Risk classification stage
#[derive(Debug, Clone, Default)]
pub struct RiskClassification;

impl Algorithm for RiskClassification {
    type Input = Vec<ZonalStatistics>;
    type Output = Vec<RiskRecord>;
    type Params = RiskRuleSet;
    type Error = Error;

    fn name(&self) -> &'static str {
        "RiskClassification"
    }

    fn description(&self) -> &'static str {
        "Assign risk tiers and frost/extreme-cold flags from zonal statistics"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        Ok(RiskClassifier::new(params)?.classify_all(&input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::ZoneStatus;

    fn zonal(values: &[f64]) -> ZonalStatistics {
        let summary = SummaryStats::from_values(values, (10.0, 90.0));
        ZonalStatistics {
            unit_id: "u".into(),
            count: values.len(),
            status: if summary.is_some() { ZoneStatus::Valid } else { ZoneStatus::EmptyZone },
            summary,
        }
    }

    fn stats(min: f64, mean: f64, p10: f64) -> ZonalStatistics {
        ZonalStatistics {
            unit_id: "u".into(),
            count: 10,
            status: ZoneStatus::Valid,
            summary: Some(SummaryStats {
                min,
                max: mean + 5.0,
                mean,
                std: 1.0,
                p10,
                p90: mean + 2.0,
            }),
        }
    }

    #[test]
    fn test_very_high_with_both_flags() {
        let record = RiskClassifier::default().classify(&zonal(&[-12.0, -3.0, 2.0, 5.0, 8.0]));
        assert_eq!(record.risk_level, Some(RiskLevel::VeryHigh));
        assert!(record.frost_risk);
        assert!(record.extreme_cold);
    }

    #[test]
    fn test_warm_unit_is_low() {
        let record = RiskClassifier::default().classify(&zonal(&[5.0, 6.5, 9.0, 12.0]));
        assert_eq!(record.risk_level, Some(RiskLevel::Low));
        assert!(!record.frost_risk);
        assert!(!record.extreme_cold);
    }

    #[test]
    fn test_tier_boundaries() {
        let c = RiskClassifier::default();
        assert_eq!(c.classify(&stats(-4.0, -1.0, -3.0)).risk_level, Some(RiskLevel::High));
        assert_eq!(c.classify(&stats(-10.0, 1.0, -2.0)).risk_level, Some(RiskLevel::Medium));
        assert_eq!(c.classify(&stats(1.0, 0.0, 0.5)).risk_level, Some(RiskLevel::Medium));
        assert_eq!(c.classify(&stats(1.0, 5.0, 2.0)).risk_level, Some(RiskLevel::Low));
        assert_eq!(c.classify(&stats(-10.5, 6.0, 2.0)).risk_level, Some(RiskLevel::VeryHigh));
    }

    #[test]
    fn test_flags_are_strict() {
        let c = RiskClassifier::default();
        let r = c.classify(&stats(0.0, 3.0, -5.0));
        assert!(!r.frost_risk);
        assert!(!r.extreme_cold);
        let r = c.classify(&stats(-0.1, 3.0, -5.1));
        assert!(r.frost_risk);
        assert!(r.extreme_cold);
    }

    #[test]
    fn test_empty_unit_is_unclassifiable() {
        let record = RiskClassifier::default().classify(&zonal(&[]));
        assert_eq!(record.risk_level, None);
        assert!(!record.frost_risk && !record.extreme_cold);
        assert_eq!(record.label(), "Unclassifiable");
    }

    #[test]
    fn test_rules_from_json() {
        let rules = RiskRuleSet::from_json(
            r#"{
                "rules": [
                    { "level": "Very High", "metric": "p10", "threshold": -8.0 },
                    { "level": "High", "metric": "mean", "threshold": 2.0 }
                ],
                "fallback": "Medium"
            }"#,
        )
        .unwrap();
        assert_eq!(rules.frost_threshold, 0.0);
        assert_eq!(rules.extreme_cold_threshold, -5.0);

        let c = RiskClassifier::new(rules).unwrap();
        assert_eq!(c.classify(&stats(-4.0, 1.0, -3.0)).risk_level, Some(RiskLevel::High));
        assert_eq!(c.classify(&stats(-4.0, 3.0, -3.0)).risk_level, Some(RiskLevel::Medium));
        assert_eq!(c.classify(&stats(-9.0, 3.0, -8.5)).risk_level, Some(RiskLevel::VeryHigh));
    }

    #[test]
    fn test_invalid_rules_rejected() {
        assert!(matches!(
            RiskRuleSet::from_json(r#"{ "rules": [], "fallback": "Low" }"#),
            Err(Error::InvalidRules(_))
        ));
        assert!(matches!(
            RiskRuleSet::from_json(r#"{ "rules": [{ "level": "Huge", "metric": "min", "threshold": 0 }], "fallback": "Low" }"#),
            Err(Error::InvalidRules(_))
        ));

        let mut rules = RiskRuleSet::default();
        rules.rules[0].threshold = f64::NAN;
        assert!(RiskClassifier::new(rules).is_err());
    }

    #[test]
    fn test_labels_round_trip() {
        for level in RiskLevel::DESCENDING {
            assert_eq!(parse_risk_label(&level.to_string()).unwrap(), Some(level));
        }
        assert_eq!(parse_risk_label("Unclassifiable").unwrap(), None);
        assert_eq!("very_high".parse::<RiskLevel>().unwrap(), RiskLevel::VeryHigh);
        assert!("extreme".parse::<RiskLevel>().is_err());
    }

    #[test]
    fn test_algorithm_trait() {
        let records = RiskClassification
            .execute_default(vec![zonal(&[-1.0, -2.0, 0.5]), zonal(&[])])
            .unwrap();
        assert_eq!(records[0].risk_level, Some(RiskLevel::High));
        assert_eq!(records[1].risk_level, None);
    }
}
