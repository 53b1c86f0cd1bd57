#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod core;
mod error;
mod executor;
mod filter;
mod hasher;
mod tree;
#[cfg(feature = "logging")]
mod utils;

pub use crate::core::Hash32;
pub use crate::error::*;
pub use crate::executor::{Executor, Stats};
pub use crate::filter::{EntryKind, Filter, Selection};
pub use crate::hasher::{FolderHasher, hash_folder};
pub use crate::tree::{Change, FolderHash};
#[cfg(feature = "logging")]
pub use crate::utils::init_logging;
