//! End-to-end tests of the HTTP client against a mocked Dune API.

pub mod common;
pub mod latest_result_test;
pub mod run_query_test;
