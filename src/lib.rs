pub mod types;
pub mod engine;
pub mod governor;
pub mod providers;
pub mod registry;
pub mod config;
pub mod error;

pub use config::KernelConfig;
pub use error::KernelError;
pub use types::*;
