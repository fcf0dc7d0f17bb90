//! Side-effecting helpers: config, catalog, processes, the editor driver.

pub mod catalog;
pub mod config;
pub mod driver;
pub mod interrupt;
pub mod process;
pub mod reachability;
pub mod report;
pub mod workspace;
