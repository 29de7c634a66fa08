//! Scenario construction helpers

mod builder;

pub use builder::ScenarioBuilder;
