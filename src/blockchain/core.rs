// core.rs splits the ledger into submodules: block hashing and mining,
// chain management, and integrity validation.
pub mod block;
pub mod chain;
pub mod validation;

pub use block::*;
pub use chain::*;
pub use validation::*;
