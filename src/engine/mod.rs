//! Provisioning engine
//!
//! One run goes through:
//! 1. Planning - probe the host and bucket tools into present/missing
//! 2. Reporting - in preview mode, print the plan and stop
//! 3. Applying - run each phase best-effort and collect failures

pub mod orchestrator;
pub mod planner;
pub mod reporter;
pub mod status;
pub mod steps;

pub use orchestrator::run_once;
pub use steps::RunReport;
