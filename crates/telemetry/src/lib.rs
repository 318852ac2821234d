//! Points pricing and usage aggregation for RustedFlow dispatches.
//!
//! Converts model token counts into platform points and folds in the usage
//! reported by nested tool flows.

pub mod pricing;
pub mod usage;

pub use pricing::{CostModel, ModelPoints, ModelPrice, PointsTable};
pub use usage::{ModelUsage, UsageSummary, aggregate_usage};
