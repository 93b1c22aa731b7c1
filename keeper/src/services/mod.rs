pub mod archive;
pub mod commands;
pub mod git;
pub mod lfs;
pub mod mirror;
pub mod ownership;
pub mod workload;
