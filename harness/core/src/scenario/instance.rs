use crate::chain::{Block, BlockId};

/// An ordered batch of blocks with their expected acceptance, submitted to
/// nodes as one unit.
///
/// `sync_every_block` fixes the submission granularity: `true` observes each
/// block's acceptance before the next is sent, `false` streams the whole
/// batch and only verifies the final expected tip. Created empty, populated
/// by `append`, consumed once by submission.
#[derive(Debug)]
pub struct TestInstance {
    entries: Vec<(Block, bool)>,
    sync_every_block: bool,
}

impl TestInstance {
    #[must_use]
    pub const fn new(sync_every_block: bool) -> Self {
        Self {
            entries: Vec::new(),
            sync_every_block,
        }
    }

    pub fn append(&mut self, block: Block, expected_accepted: bool) {
        self.entries.push((block, expected_accepted));
    }

    #[must_use]
    pub fn entries(&self) -> &[(Block, bool)] {
        &self.entries
    }

    #[must_use]
    pub const fn sync_every_block(&self) -> bool {
        self.sync_every_block
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Id of the last block expected to be accepted, the batch's final tip.
    #[must_use]
    pub fn final_expected_tip(&self) -> Option<BlockId> {
        self.entries
            .iter()
            .rev()
            .find(|(_, expected)| *expected)
            .map(|(block, _)| block.id())
    }

    /// Total serialized bytes across the batch.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.entries
            .iter()
            .map(|(block, _)| block.serialized_size())
            .sum()
    }
}
