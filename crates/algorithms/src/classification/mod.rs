//! Risk classification of zonal statistics
//!
//! - **risk**: ordered threshold rules producing a risk tier and the
//!   frost / extreme-cold flags per unit

mod risk;

pub use risk::{
    parse_risk_label, risk_label, Metric, RiskClassification, RiskClassifier, RiskLevel,
    RiskRecord, RiskRule, RiskRuleSet, UNCLASSIFIABLE,
};
