//! Shared utilities for the md5-rs CLI

pub mod format;

pub use format::*;
