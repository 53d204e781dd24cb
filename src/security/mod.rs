pub mod command_executor;
pub mod token_manager;

pub use command_executor::{CancelSignal, CancelTrigger, ProcessUploader, cancel_pair};
pub use token_manager::TokenMasker;
