//! Shared infrastructure for worker integration tests

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod executors;
pub mod fixtures;

pub use executors::*;
pub use fixtures::*;
