pub mod config;
pub mod logging;

pub mod job;
pub mod queue;
pub mod retry;
pub mod runner;
