//! Cross-module tests exercising the execution pipeline end to end against
//! the in-memory sandbox and oracle doubles.

pub mod support;

mod pipeline_tests;
mod tenancy_tests;
