pub mod analysis;
pub mod engine_config;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod recommendation;
pub mod selection;
pub mod strategies;

#[cfg(test)]
pub(crate) mod test_utils;
