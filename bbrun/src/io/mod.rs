//! Side-effecting helpers: files, processes, containers.

pub mod cache;
pub mod config;
pub mod container;
pub mod definition;
pub mod executor;
pub mod ignore;
pub mod process;
