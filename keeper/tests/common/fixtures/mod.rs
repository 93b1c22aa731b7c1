//! Reusable test utilities:
//! - Recording workload controller
//! - Scripted repository for the push state machine
//! - Volume tree builders and comparison helpers

// Not every test binary uses every fixture
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod fake_workload;
pub mod scripted_repository;
pub mod test_tree;

pub use fake_workload::FakeWorkload;
pub use scripted_repository::ScriptedRepository;
pub use test_tree::*;
