//! Inputs of the commands: job manifests, input files on disk and observation logs.
pub mod discovery;
pub mod manifest;
pub mod observations;
