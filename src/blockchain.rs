// Thin re-export module: implementation is in `blockchain/core.rs`, split
// into block, chain and validation submodules.

pub mod core;
pub use core::*;
