//! # ringcheck
//!
//! Three-tier compliance gap engine. A scan consults the codified
//! standards, informal knowledge and external intelligence tiers, collects
//! candidate violations from a reasoning agent, attributes each candidate
//! to every tier that speaks to it, and classifies the disagreements
//! between tiers into gap records.
//!
//! **Pipeline:**
//! 1. `orchestrator` - parallel tier consultation with per-tier isolation
//! 2. `agent` - reasoning-agent boundary (workspace capability, tier tools)
//! 3. `normalizer` - requirement topics and tier-attributed findings
//! 4. `reconciliation` - gap classification across tiers
//! 5. `report` - contract checks and the final JSON report

pub mod agent;
pub mod config;
pub mod error;
pub mod normalizer;
pub mod orchestrator;
pub mod reconciliation;
pub mod report;
pub mod scan;
pub mod tiers;
pub mod types;

pub use error::{ScanError, EXIT_CONFIG, EXIT_CONTRACT_BREACH, EXIT_OK};
pub use report::ComplianceReport;
pub use scan::{parse_ring_selection, EngineSettings, ScanEngine, ScanRequest};
