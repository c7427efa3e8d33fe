use std::fmt;

use bytes::{BufMut as _, Bytes, BytesMut};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use sha2::{Digest as _, Sha256};

pub const BLOCK_ID_LEN: usize = 32;

/// Serialized bytes of a block header before the transaction list:
/// parent id, height, seed and the transaction count.
pub const HEADER_LEN: usize = BLOCK_ID_LEN + 8 + 8 + 4;

/// Bytes a filler transaction adds on top of its payload (tag + length).
pub const FILLER_OVERHEAD: usize = 1 + 4;

/// Value minted by each synthetic coinbase.
pub const COINBASE_REWARD: u64 = 50 * 100_000_000;

const TX_TAG_COINBASE: u8 = 0x00;
const TX_TAG_SPEND: u8 = 0x01;
const TX_TAG_FILLER: u8 = 0x02;

/// 32-byte block identifier, the SHA-256 digest of the block's canonical
/// serialization. Rendered and transported as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId([u8; BLOCK_ID_LEN]);

impl BlockId {
    #[must_use]
    pub const fn from_bytes(bytes: [u8; BLOCK_ID_LEN]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; BLOCK_ID_LEN] {
        &self.0
    }

    fn of(raw: &[u8]) -> Self {
        Self(Sha256::digest(raw).into())
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", hex::encode(&self.0[..8]))
    }
}

impl Serialize for BlockId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for BlockId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let bytes = hex::decode(&raw).map_err(de::Error::custom)?;
        let bytes: [u8; BLOCK_ID_LEN] = bytes
            .try_into()
            .map_err(|_| de::Error::custom(format!("block id must be {BLOCK_ID_LEN} bytes")))?;
        Ok(Self(bytes))
    }
}

/// Reference to a transaction output by containing block and output index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OutPoint {
    pub block: BlockId,
    pub index: u32,
}

/// A not-yet-consumed output usable as the input of a synthetic spend.
/// Handed out by value and consumed by `ChainBuilder::next_block_with`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpendableOutput {
    pub outpoint: OutPoint,
    pub value: u64,
}

#[derive(Clone, Debug)]
pub enum Transaction {
    /// Mints the block subsidy; output 0 of the block.
    Coinbase { height: u64, value: u64 },
    /// Consumes a previously produced output.
    Spend { input: OutPoint, value: u64 },
    /// Carries deterministic padding to reach a target block size.
    Filler { payload: Bytes },
}

impl Transaction {
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Coinbase { .. } => 1 + 8 + 8,
            Self::Spend { .. } => 1 + BLOCK_ID_LEN + 4 + 8,
            Self::Filler { payload } => FILLER_OVERHEAD + payload.len(),
        }
    }

    fn encode_into(&self, buf: &mut BytesMut) {
        match self {
            Self::Coinbase { height, value } => {
                buf.put_u8(TX_TAG_COINBASE);
                buf.put_u64_le(*height);
                buf.put_u64_le(*value);
            }
            Self::Spend { input, value } => {
                buf.put_u8(TX_TAG_SPEND);
                buf.put_slice(input.block.as_bytes());
                buf.put_u32_le(input.index);
                buf.put_u64_le(*value);
            }
            Self::Filler { payload } => {
                buf.put_u8(TX_TAG_FILLER);
                buf.put_u32_le(payload.len() as u32);
                buf.put_slice(payload);
            }
        }
    }
}

/// One synthetic block: header fields, transactions and the cached canonical
/// serialization. The serialization is produced exactly once at assembly, so
/// the reported size and the bytes shipped to peers cannot diverge.
#[derive(Clone, Debug)]
pub struct Block {
    id: BlockId,
    parent: BlockId,
    height: u64,
    seed: u64,
    txs: Vec<Transaction>,
    raw: Bytes,
}

impl Block {
    pub(crate) fn assemble(parent: BlockId, height: u64, seed: u64, txs: Vec<Transaction>) -> Self {
        let body: usize = txs.iter().map(Transaction::encoded_len).sum();
        let mut buf = BytesMut::with_capacity(HEADER_LEN + body);
        buf.put_slice(parent.as_bytes());
        buf.put_u64_le(height);
        buf.put_u64_le(seed);
        buf.put_u32_le(txs.len() as u32);
        for tx in &txs {
            tx.encode_into(&mut buf);
        }
        let raw = buf.freeze();
        let id = BlockId::of(&raw);

        Self {
            id,
            parent,
            height,
            seed,
            txs,
            raw,
        }
    }

    #[must_use]
    pub const fn id(&self) -> BlockId {
        self.id
    }

    #[must_use]
    pub const fn parent(&self) -> BlockId {
        self.parent
    }

    #[must_use]
    pub const fn height(&self) -> u64 {
        self.height
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub fn txs(&self) -> &[Transaction] {
        &self.txs
    }

    /// Canonical serialization; cheap to clone (refcounted).
    #[must_use]
    pub fn encoded(&self) -> Bytes {
        self.raw.clone()
    }

    #[must_use]
    pub fn serialized_size(&self) -> usize {
        self.raw.len()
    }

    /// Outpoint of this block's coinbase output.
    #[must_use]
    pub const fn coinbase_outpoint(&self) -> OutPoint {
        OutPoint {
            block: self.id,
            index: 0,
        }
    }
}
