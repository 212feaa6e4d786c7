use crate::blockchain::core::block::{Block, BlockSnapshot, GENESIS_DATA, GENESIS_PREVIOUS_HASH};
use crate::blockchain::core::validation::{validate_chain, ChainViolation};
use crate::error::{ChainError, Result};
use chrono::Utc;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, warn};

pub const DEFAULT_DIFFICULTY: usize = 3;

/// In-memory proof-of-work ledger.
///
/// Always holds at least the genesis block, which is created unmined at
/// construction. Difficulty is fixed for the ledger's lifetime.
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    difficulty: usize,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new(DEFAULT_DIFFICULTY)
    }
}

impl Blockchain {
    pub fn new(difficulty: usize) -> Self {
        let genesis = Block::new(
            0,
            Utc::now(),
            Value::String(GENESIS_DATA.to_string()),
            GENESIS_PREVIOUS_HASH,
        );
        info!(difficulty, hash = %genesis.hash(), "created genesis block");

        Blockchain {
            blocks: vec![genesis],
            difficulty,
        }
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Tail of the chain (the genesis block on a fresh ledger).
    pub fn latest(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    /// Mine a new block carrying `data` on top of the current tail and append it.
    ///
    /// Blocks the calling thread until proof-of-work is found.
    pub fn append(&mut self, data: Value) -> &Block {
        let index = self.blocks.len() as u64;
        let previous_hash = self.latest().hash().to_string();
        let mut block = Block::new(index, Utc::now(), data, previous_hash);

        let started = Instant::now();
        let attempts = block.mine(self.difficulty);
        info!(
            index,
            nonce = block.nonce(),
            attempts,
            elapsed_ms = started.elapsed().as_millis() as u64,
            hash = %block.hash(),
            "mined block"
        );

        self.blocks.push(block);
        self.latest()
    }

    pub fn get(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Snapshots of every block in chain order.
    pub fn list(&self) -> Vec<BlockSnapshot> {
        self.blocks.iter().map(BlockSnapshot::from).collect()
    }

    /// Redo proof-of-work for the block at `index`, then re-link every later
    /// block to its predecessor's new hash.
    ///
    /// Only the target is mined. Descendants get their nonce reset to 0 and
    /// their hash recomputed, which keeps the chain internally consistent but
    /// leaves them, in general, below the difficulty target.
    pub fn remine(&mut self, index: usize) -> Result<&Block> {
        let difficulty = self.difficulty;
        let target = self
            .blocks
            .get_mut(index)
            .ok_or(ChainError::BlockNotFound { index })?;

        target.reset_nonce();
        let started = Instant::now();
        let attempts = target.mine(difficulty);
        info!(
            index,
            nonce = target.nonce(),
            attempts,
            elapsed_ms = started.elapsed().as_millis() as u64,
            hash = %target.hash(),
            "re-mined block"
        );

        for i in index + 1..self.blocks.len() {
            let previous_hash = self.blocks[i - 1].hash().to_string();
            let block = &mut self.blocks[i];
            block.relink(previous_hash);
            debug!(index = i, hash = %block.hash(), "recomputed descendant hash");
        }

        let cascaded = self.blocks.len() - index - 1;
        if cascaded > 0 {
            info!(index, cascaded, "descendants re-linked without proof-of-work");
        }

        Ok(&self.blocks[index])
    }

    /// Replace the payload of the block at `index` in place.
    ///
    /// Only that block's hash is recomputed; nothing is mined and descendants
    /// are left pointing at the old hash, so the chain stops validating until
    /// the block is re-mined.
    pub fn rewrite_data(&mut self, index: usize, data: Value) -> Result<&Block> {
        let block = self
            .blocks
            .get_mut(index)
            .ok_or(ChainError::BlockNotFound { index })?;

        block.replace_data(data);
        warn!(index, hash = %block.hash(), "block payload rewritten");
        Ok(&*block)
    }

    /// Whether every block is content-consistent and linked to its predecessor.
    pub fn validate(&self) -> bool {
        self.validate_detailed().is_ok()
    }

    pub fn validate_detailed(&self) -> std::result::Result<(), ChainViolation> {
        let result = validate_chain(&self.blocks);
        if let Err(violation) = &result {
            warn!(index = violation.index(), %violation, "chain validation failed");
        }
        result
    }
}
