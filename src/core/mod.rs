pub mod config;
pub mod config_store;
pub mod error;
pub mod traits;

pub use config::*;
pub use config_store::*;
pub use error::*;
pub use traits::*;
