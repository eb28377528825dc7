//! Built-in actions
//!
//! Thin adapters between the task graph and the external tools a front-end
//! pipeline drives. None of them transform file contents themselves:
//!
//! - [`CleanAction`] - remove a build directory
//! - [`CopyAction`] - copy matched sources into the destination
//! - [`CommandAction`] - run an external tool (minifier, compiler) over the sources
//! - [`ServeAction`] - start a long-running dev server and wait for its readiness marker

pub mod clean;
pub mod command;
pub mod copy;
pub mod serve;

pub use clean::CleanAction;
pub use command::CommandAction;
pub use copy::CopyAction;
pub use serve::ServeAction;
