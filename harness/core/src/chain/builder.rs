use std::collections::VecDeque;

use bytes::Bytes;
use rand::{RngCore as _, SeedableRng as _, rngs::StdRng};
use thiserror::Error;
use tracing::debug;

use super::block::{
    Block, BlockId, COINBASE_REWARD, FILLER_OVERHEAD, HEADER_LEN, SpendableOutput, Transaction,
};

/// A requested block size that cannot be met by padding.
#[derive(Debug, Error)]
pub enum SizeConstraintError {
    #[error("target block size {target} is below the {base} bytes this block needs")]
    BelowBase { target: usize, base: usize },
    #[error("target block size {target} exceeds the configured maximum of {max}")]
    AboveMax { target: usize, max: usize },
}

/// `get_spendable_output` was called with nothing left in the queue, which
/// means the scenario sequencing is wrong.
#[derive(Debug, Error)]
#[error("no saved spendable outputs remain")]
pub struct EmptyOutputQueueError;

#[derive(Debug, Error)]
pub enum ChainBuildError {
    #[error(transparent)]
    Size(#[from] SizeConstraintError),
    #[error(transparent)]
    EmptyOutputQueue(#[from] EmptyOutputQueueError),
    #[error("no block exists at height {height} (chain height is {tip_height})")]
    UnknownParent { height: u64, tip_height: u64 },
    #[error("genesis id is not pinned yet")]
    GenesisUnset,
    #[error("genesis cannot be re-pinned after {blocks} blocks were produced")]
    GenesisAlreadyUsed { blocks: usize },
    #[error("no blocks produced yet")]
    EmptyChain,
}

/// Optional knobs for `ChainBuilder::next_block_with`.
#[derive(Debug, Default)]
pub struct NextBlockParams {
    /// Build on the block at this height instead of the tip. Height 0 refers
    /// to the pinned genesis.
    pub parent_height: Option<u64>,
    /// Consume this output in a spend transaction.
    pub spend: Option<SpendableOutput>,
    /// Pad the serialized block to this many bytes.
    pub target_size: Option<usize>,
}

/// Deterministic generator of a linked sequence of synthetic blocks.
///
/// Single-writer, append-only: the builder owns every produced block, the
/// current tip and the FIFO queue of saved coinbase outputs. Re-running the
/// same call sequence with the same seeds reproduces byte-identical blocks.
pub struct ChainBuilder {
    genesis: Option<BlockId>,
    blocks: Vec<Block>,
    saved_outputs: VecDeque<SpendableOutput>,
    max_block_size: usize,
}

impl ChainBuilder {
    #[must_use]
    pub fn new(max_block_size: usize) -> Self {
        Self {
            genesis: None,
            blocks: Vec::new(),
            saved_outputs: VecDeque::new(),
            max_block_size,
        }
    }

    /// Pin the ancestry root, normally the node-under-test's current best
    /// tip. Must happen before any block is produced.
    pub fn set_genesis(&mut self, id: BlockId) -> Result<(), ChainBuildError> {
        if !self.blocks.is_empty() {
            return Err(ChainBuildError::GenesisAlreadyUsed {
                blocks: self.blocks.len(),
            });
        }
        debug!(genesis = %id, "pinning chain genesis");
        self.genesis = Some(id);
        Ok(())
    }

    #[must_use]
    pub const fn genesis(&self) -> Option<BlockId> {
        self.genesis
    }

    /// Produce the next block on the current tip with no spend and no size
    /// target.
    pub fn next_block(&mut self, seed: u64) -> Result<&Block, ChainBuildError> {
        self.next_block_with(seed, NextBlockParams::default())
    }

    /// Produce a block with explicit parent/spend/size parameters.
    pub fn next_block_with(
        &mut self,
        seed: u64,
        params: NextBlockParams,
    ) -> Result<&Block, ChainBuildError> {
        let genesis = self.genesis.ok_or(ChainBuildError::GenesisUnset)?;

        let (parent, parent_height) = match params.parent_height {
            None => (self.tip_id_or(genesis), self.height()),
            Some(0) => (genesis, 0),
            Some(h) => {
                let block = self
                    .blocks
                    .get((h - 1) as usize)
                    .ok_or(ChainBuildError::UnknownParent {
                        height: h,
                        tip_height: self.height(),
                    })?;
                (block.id(), h)
            }
        };
        let height = parent_height + 1;

        let mut txs = vec![Transaction::Coinbase {
            height,
            value: COINBASE_REWARD,
        }];
        if let Some(output) = params.spend {
            txs.push(Transaction::Spend {
                input: output.outpoint,
                value: output.value,
            });
        }

        if let Some(target) = params.target_size {
            let base = HEADER_LEN + txs.iter().map(Transaction::encoded_len).sum::<usize>();
            if target > self.max_block_size {
                return Err(SizeConstraintError::AboveMax {
                    target,
                    max: self.max_block_size,
                }
                .into());
            }
            if target < base {
                return Err(SizeConstraintError::BelowBase { target, base }.into());
            }
            let pad = target - base;
            // A pad smaller than the filler framing cannot be hit exactly;
            // the block stays within FILLER_OVERHEAD bytes of the target.
            if pad >= FILLER_OVERHEAD {
                txs.push(Transaction::Filler {
                    payload: filler_payload(seed, pad - FILLER_OVERHEAD),
                });
            }
        }

        let block = Block::assemble(parent, height, seed, txs);
        debug!(
            id = %block.id(),
            height,
            size = block.serialized_size(),
            "built block"
        );
        self.blocks.push(block);
        Ok(self.blocks.last().expect("chain is non-empty after push"))
    }

    /// Save the tip's coinbase output for a later spend. Outputs are handed
    /// back in the order they were saved.
    pub fn save_spendable_output(&mut self) -> Result<(), ChainBuildError> {
        let tip = self.blocks.last().ok_or(ChainBuildError::EmptyChain)?;
        self.saved_outputs.push_back(SpendableOutput {
            outpoint: tip.coinbase_outpoint(),
            value: COINBASE_REWARD,
        });
        Ok(())
    }

    /// Pop the oldest saved output. Each output is returned exactly once.
    pub fn get_spendable_output(&mut self) -> Result<SpendableOutput, EmptyOutputQueueError> {
        self.saved_outputs.pop_front().ok_or(EmptyOutputQueueError)
    }

    #[must_use]
    pub fn saved_output_count(&self) -> usize {
        self.saved_outputs.len()
    }

    #[must_use]
    pub fn tip(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Identifier of the current best tip: the last produced block, or the
    /// pinned genesis before any block exists.
    #[must_use]
    pub fn tip_id(&self) -> Option<BlockId> {
        self.blocks.last().map(Block::id).or(self.genesis)
    }

    /// Number of blocks produced on top of genesis.
    #[must_use]
    pub fn height(&self) -> u64 {
        self.blocks.len() as u64
    }

    /// Block at the given height; height 0 is genesis and has no `Block`.
    #[must_use]
    pub fn block_at(&self, height: u64) -> Option<&Block> {
        height
            .checked_sub(1)
            .and_then(|i| self.blocks.get(i as usize))
    }

    fn tip_id_or(&self, genesis: BlockId) -> BlockId {
        self.blocks.last().map_or(genesis, Block::id)
    }
}

fn filler_payload(seed: u64, len: usize) -> Bytes {
    let mut payload = vec![0u8; len];
    StdRng::seed_from_u64(seed).fill_bytes(&mut payload);
    Bytes::from(payload)
}
