pub mod automation;
pub mod clock;
pub mod env;
pub mod episode;
pub mod error;
pub mod limiter;
pub mod logger;
pub mod platform;
pub mod registry;
pub mod reward;
pub mod runner;
pub mod settings;
pub mod sprite;
pub mod transition;
pub mod types;

#[cfg(test)]
mod testkit;
