pub mod core;
pub mod orchestration;
pub mod security;
pub mod validation;

pub use crate::core::*;
pub use orchestration::{BuildStep, ScanPublisher, StepAbort};
pub use security::{CancelSignal, CancelTrigger, ProcessUploader, TokenMasker};
pub use validation::Validator;
