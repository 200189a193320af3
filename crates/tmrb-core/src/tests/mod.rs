//! Test module for tmrb-core
//!
//! This module contains tests for:
//! - Log line parsing and plugin path shortening
//! - Log tailing, session bracketing and the settle heuristic
//! - Client operations against a mock Remote Build host
//! - Configuration loading and defaults

mod config_tests;
