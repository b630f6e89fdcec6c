//! Bounded-concurrency clone/update of a declared list of git repositories.

pub mod audit;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod executor;
pub mod git_client;
pub mod locator;
pub mod lockfile;
pub mod model;
pub mod paths;
pub mod repo_status;
mod shelf;
pub mod sync_engine;
pub mod tracker;

#[cfg(test)]
mod test_support;
