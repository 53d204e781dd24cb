//! Orchestration layer for scan publishing

pub mod build_step;
pub mod scan_publisher;

pub use build_step::{BuildStep, StepAbort};
pub use scan_publisher::ScanPublisher;
