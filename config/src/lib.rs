#![cfg_attr(not(test), no_std)]

pub mod cmdline;
pub mod error;
pub mod types;

pub use cmdline::KernelCommandLine;
pub use error::ConfigError;
pub use types::{HpetMode, TimeConfig, TimeSource};
