pub mod formatter;

pub use formatter::{format_elapsed, format_percent};
