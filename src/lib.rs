pub mod config;
pub mod demo;
pub mod discovery;
pub mod error;
pub mod logger;
pub mod module;
pub mod runner;
pub mod utils;

// Re-export commonly used types
pub use error::{MarkrunError, Result};
pub use module::{Marker, Module, ModuleBuilder, TypeBuilder};
pub use runner::TestRunner;
