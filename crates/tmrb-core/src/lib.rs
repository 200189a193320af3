pub mod client;
pub mod config;
pub mod log;

mod error;

#[cfg(test)]
mod tests;

pub use client::{LoadOptions, RemoteBuildClient};
pub use error::{Error, Result};
