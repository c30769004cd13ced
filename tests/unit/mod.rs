//! Unit tests for individual components

mod allocation_test;
mod classifier_test;
mod config_test;
mod error_test;
mod notify_test;
mod runtime_test;
mod util_test;
