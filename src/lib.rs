//! CentralChain - a server-local proof-of-work ledger with tamper-evident history
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Ledger Engine
//! - [`blockchain`] - Blocks, proof-of-work mining, the chain and its validation
//!
//! ## Integration
//! - [`api`] - REST API over a shared ledger (feature `api`)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Ledger Engine
// ============================================================================
pub mod blockchain;

// ============================================================================
// Integration
// ============================================================================
#[cfg(feature = "api")]
pub mod api;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
