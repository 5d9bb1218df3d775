//! Static-site build pipeline library.
//!
//! This module exports the pipeline components for the `pages` binary and for
//! integration tests.

pub mod cli;
pub mod config;
pub mod deploy;
pub mod dev;
pub mod error;
pub mod fileset;
pub mod lint;
pub mod logging;
pub mod paths;
pub mod pipeline;
pub mod task;
pub mod tasks;
pub mod toolbox;
pub mod transform;
pub mod useref;
