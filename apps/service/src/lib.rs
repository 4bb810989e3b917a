//! Beacon: periodic URL health checks with status history and transition
//! alerts.

pub mod clock;
pub mod config;
pub mod database;
pub mod monitoring;
pub mod notifications;
pub mod orchestrator;
pub mod pool;
pub mod validation;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use orchestrator::Orchestrator;
