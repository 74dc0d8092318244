pub(crate) mod analysis;
pub(crate) mod calculator;
pub(crate) mod common;
pub(crate) mod config;
pub(crate) mod engine;
pub(crate) mod model;
pub(crate) mod observation;
pub(crate) mod partition;
pub(crate) mod planner;
pub(crate) mod profile;
pub(crate) mod retry;

#[cfg(test)]
pub(crate) mod tests;
