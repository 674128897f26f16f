//! Command-line interface for lectern.

mod commands;

pub use commands::{is_verbose, run};
