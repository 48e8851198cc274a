//! CLI command implementations.

mod build;
mod dev;

pub(crate) use build::BuildArgs;
pub(crate) use dev::DevArgs;
