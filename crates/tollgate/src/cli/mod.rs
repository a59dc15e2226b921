//! Operator command-line interface.

mod commands;
mod run;

pub use commands::{Cli, Commands};
pub use run::{load_config, render_classification, render_config, render_status};
