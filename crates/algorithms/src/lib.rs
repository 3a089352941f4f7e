//! # Friaje Algorithms
//!
//! Analysis stages for the Tmin zonal risk analysis.
//!
//! ## Modules
//!
//! - **statistics**: zonal statistics per administrative unit
//! - **classification**: rule-based risk tiers and frost / extreme-cold flags
//! - **table**: the joined result table and its queries
//! - **policy**: intervention targeting and implementation priorities
//! - **pipeline**: end-to-end runs, with memoized input loading

pub mod classification;
pub mod pipeline;
pub mod policy;
pub mod statistics;
pub mod table;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classification::{
        Metric, RiskClassification, RiskClassifier, RiskLevel, RiskRecord, RiskRule, RiskRuleSet,
    };
    pub use crate::pipeline::{run_analysis, AnalysisSession};
    pub use crate::policy::{PolicyBrief, Priority, INTERVENTIONS};
    pub use crate::statistics::{
        zonal_statistics, SummaryStats, ZonalAggregator, ZonalParams, ZonalStatistics, ZoneStatus,
    };
    pub use crate::table::{AnalysisResult, ResultFilter, ResultTable};
    pub use friaje_core::prelude::*;
}
