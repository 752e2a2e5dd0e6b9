#![doc = include_str!("../README.md")]

mod allocator;
mod config;
mod error;
mod provision;
mod quota;
mod registry;
mod types;

pub use crate::allocator::*;
pub use crate::config::*;
pub use crate::error::*;
pub use crate::provision::*;
pub use crate::quota::*;
pub use crate::registry::*;
pub use crate::types::*;
