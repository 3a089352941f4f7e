//! Public-policy narrative keyed to the risk results
//!
//! Three interventions against frost and cold surges, each selecting the
//! units it applies to from a [`ResultTable`], plus an implementation
//! priority ranking by mean minimum temperature and variability.

use crate::classification::Metric;
use crate::statistics::percentile;
use crate::table::{AnalysisResult, ResultTable};

/// A costed intervention and the units it targets
#[derive(Debug, Clone, Copy)]
pub struct Intervention {
    pub title: &'static str,
    pub objective: &'static str,
    /// Which units qualify
    pub criterion: &'static str,
    pub population: &'static str,
    pub actions: &'static [&'static str],
    pub unit_cost: &'static str,
    /// Total investment in soles
    pub investment: u64,
    pub kpis: &'static [&'static str],
    selects: fn(&AnalysisResult) -> bool,
}

impl Intervention {
    pub fn targets(&self, result: &AnalysisResult) -> bool {
        (self.selects)(result)
    }
}

/// Length of the investment programme
pub const PROGRAMME_YEARS: u32 = 5;

pub static INTERVENTIONS: [Intervention; 3] = [
    Intervention {
        title: "Thermal Housing Improvement Program (ISUR)",
        objective: "Reduce respiratory illnesses (ILI/ARI) and hypothermia cases in high-risk areas",
        criterion: "mean minimum temperature <= 0 °C",
        population: "500,000 households in high-Andean regions",
        actions: &[
            "Thermal insulation packages for homes",
            "Improved cooking stoves",
            "Emergency heating equipment distribution",
        ],
        unit_cost: "S/ 2,500 per household x 500,000",
        investment: 1_250_000_000,
        kpis: &[
            "Reduce ARI cases by 30% in target areas",
            "Decrease hypothermia deaths by 50%",
            "Improve indoor temperature by 5-8 °C",
        ],
        selects: |r| r.mean().is_some_and(|m| m <= 0.0),
    },
    Intervention {
        title: "Agricultural Anti-Frost Protection",
        objective: "Reduce agricultural losses from frost events",
        criterion: "frost risk (min < 0 °C)",
        population: "200,000 small farmers in potato, quinoa and livestock regions",
        actions: &[
            "Anti-frost technology kits",
            "Crop calendar optimization based on temperature forecasts",
            "Livestock shelter construction",
            "Crop insurance expansion",
        ],
        unit_cost: "S/ 3,000 per farm x 200,000",
        investment: 600_000_000,
        kpis: &[
            "Reduce crop losses by 40% during frost events",
            "Decrease alpaca/llama mortality by 25%",
            "Increase agricultural productivity by 15%",
        ],
        selects: |r| r.frost_risk,
    },
    Intervention {
        title: "Educational Continuity Program",
        objective: "Maintain school attendance during extreme cold periods",
        criterion: "extreme cold (p10 < -5 °C)",
        population: "300,000 students in 5,000 high-Andean schools",
        actions: &[
            "School heating systems installation",
            "Winter clothing distribution program",
            "Mobile health units during cold surges",
            "Flexible academic calendar adaptation",
        ],
        unit_cost: "S/ 50,000 per school x 5,000",
        investment: 250_000_000,
        kpis: &[
            "Increase school attendance by 20% during cold months",
            "Reduce cold-related absences by 60%",
            "Improve academic performance in affected areas by 10%",
        ],
        selects: |r| r.extreme_cold,
    },
];

/// Combined investment of all interventions, in soles
pub fn total_investment() -> u64 {
    INTERVENTIONS.iter().map(|i| i.investment).sum()
}

/// Implementation priority of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// mean < -2 °C
    High,
    /// 0 <= mean <= 2 °C
    Medium,
    /// std above the table's 90th percentile of std
    Monitor,
}

/// An intervention with the units of the current table it targets
#[derive(Debug, Clone)]
pub struct PolicyTarget<'a> {
    pub intervention: &'static Intervention,
    pub units: Vec<&'a AnalysisResult>,
}

/// Policy narrative for one result table
#[derive(Debug, Clone)]
pub struct PolicyBrief<'a> {
    pub targets: Vec<PolicyTarget<'a>>,
    pub high: Vec<&'a AnalysisResult>,
    pub medium: Vec<&'a AnalysisResult>,
    pub monitor: Vec<&'a AnalysisResult>,
    /// Variability cut-off used for [`Priority::Monitor`]
    pub std_cutoff: Option<f64>,
}

impl<'a> PolicyBrief<'a> {
    pub fn build(table: &'a ResultTable) -> Self {
        let targets = INTERVENTIONS
            .iter()
            .map(|intervention| PolicyTarget {
                intervention,
                units: table.iter().filter(|r| intervention.targets(r)).collect(),
            })
            .collect();

        let std_cutoff = std_cutoff(table);
        let with = |p: Priority| -> Vec<&'a AnalysisResult> {
            table
                .iter()
                .filter(|r| priorities(r, std_cutoff).contains(&p))
                .collect()
        };

        Self {
            targets,
            high: with(Priority::High),
            medium: with(Priority::Medium),
            monitor: with(Priority::Monitor),
            std_cutoff,
        }
    }
}

/// 90th percentile of unit standard deviations
pub fn std_cutoff(table: &ResultTable) -> Option<f64> {
    let mut stds = table.values(Metric::Std);
    stds.sort_by(f64::total_cmp);
    percentile(&stds, 90.0)
}

/// Priorities that apply to a unit (monitoring can coincide with a mean-based tier)
pub fn priorities(result: &AnalysisResult, std_cutoff: Option<f64>) -> Vec<Priority> {
    let Some(summary) = result.summary else {
        return Vec::new();
    };

    let mut out = Vec::new();
    if summary.mean < -2.0 {
        out.push(Priority::High);
    } else if (0.0..=2.0).contains(&summary.mean) {
        out.push(Priority::Medium);
    }
    if std_cutoff.is_some_and(|c| summary.std > c) {
        out.push(Priority::Monitor);
    }
    out
}
