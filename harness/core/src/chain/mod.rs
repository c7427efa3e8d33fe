mod block;
mod builder;

pub use block::{
    Block, BlockId, COINBASE_REWARD, FILLER_OVERHEAD, HEADER_LEN, OutPoint, SpendableOutput,
    Transaction,
};
pub use builder::{
    ChainBuildError, ChainBuilder, EmptyOutputQueueError, NextBlockParams, SizeConstraintError,
};
