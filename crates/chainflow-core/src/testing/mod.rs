//! Workflow testing: run suites of cases in test mode and check their
//! outcome against declarative assertions.

pub mod assertion;
pub mod runner;

#[cfg(test)]
pub(crate) mod memory;
