//! CLI command handlers, one per file.

mod hosts;
mod run;
mod serve;

pub use hosts::run_hosts;
pub use run::run_once;
pub use serve::run_serve;
