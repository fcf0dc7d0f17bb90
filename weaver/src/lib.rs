//! Unattended editor automation loop.
//!
//! A session repeatedly picks a topic from a small catalog, renders an example
//! file for it, assigns the file a collision-free name and asks a drive adapter
//! to make it appear in an external editor. The layout keeps a strict split:
//!
//! - **[`core`]**: Pure logic (naming, content rendering, budgets, error types).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side effects (config files, processes, the editor driver,
//!   signals). Isolated behind traits so tests can script them.
//!
//! [`session`] ties the two together into the timed loop the CLI runs.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
