//! Integration test helpers: a simulated TPM and command builders.

pub mod harness;
