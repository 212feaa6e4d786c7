use crate::blockchain::core::block::Block;
use thiserror::Error;

/// First integrity failure found while walking the chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainViolation {
    #[error("block {index} stores hash {stored} but its contents hash to {computed}")]
    HashMismatch {
        index: usize,
        stored: String,
        computed: String,
    },
    #[error("block {index} links to {found} but its predecessor's hash is {expected}")]
    BrokenLink {
        index: usize,
        expected: String,
        found: String,
    },
}

impl ChainViolation {
    pub fn index(&self) -> usize {
        match self {
            ChainViolation::HashMismatch { index, .. }
            | ChainViolation::BrokenLink { index, .. } => *index,
        }
    }
}

/// Walk adjacent pairs from index 1, checking content-hash consistency and
/// then linkage for each block. Proof-of-work is not checked, and the
/// genesis block is trusted as-is.
pub fn validate_chain(blocks: &[Block]) -> Result<(), ChainViolation> {
    for (offset, pair) in blocks.windows(2).enumerate() {
        let (previous, current) = (&pair[0], &pair[1]);
        let index = offset + 1;

        let computed = current.compute_hash();
        if current.hash() != computed {
            return Err(ChainViolation::HashMismatch {
                index,
                stored: current.hash().to_string(),
                computed,
            });
        }

        if current.previous_hash() != previous.hash() {
            return Err(ChainViolation::BrokenLink {
                index,
                expected: previous.hash().to_string(),
                found: current.previous_hash().to_string(),
            });
        }
    }
    Ok(())
}
