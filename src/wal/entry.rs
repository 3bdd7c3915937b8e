//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and their framing.

use serde::{Deserialize, Serialize};

use crate::error::{BurrowError, Result};
use crate::item::now_millis;

/// Frame header size: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created.
    /// Replay uses it as the last-used time of every key the entry touches.
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },

    /// Refresh a key's last-used time
    Touch { key: Vec<u8> },

    /// Operations applied as one unit; a torn batch is dropped whole
    Batch { operations: Vec<Operation> },
}

impl Operation {
    /// Number of leaf operations (batches are flattened)
    pub fn len(&self) -> usize {
        match self {
            Operation::Batch { operations } => operations.iter().map(Operation::len).sum(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WalEntry {
    /// Create an entry stamped with the current time
    pub fn new(lsn: u64, operation: Operation) -> Self {
        Self::with_timestamp(lsn, operation, now_millis())
    }

    /// Create an entry with an explicit timestamp (used by checkpoints)
    pub fn with_timestamp(lsn: u64, operation: Operation, timestamp: u64) -> Self {
        Self {
            lsn,
            operation,
            timestamp,
        }
    }

    /// Serialize to a framed record: `[lsn][crc][len][payload]`
    pub fn serialize(&self) -> Result<Vec<u8>> {
        encode_frame(self.lsn, &self.operation, self.timestamp)
    }

    /// Parse one framed record from the start of `bytes`
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(BurrowError::WalCorruption(format!(
                "Incomplete header: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        let (lsn, crc, len) = decode_header(&bytes[..HEADER_SIZE]);
        let end = HEADER_SIZE + len;
        if bytes.len() < end {
            return Err(BurrowError::WalCorruption(format!(
                "Incomplete payload: expected {} bytes, got {}",
                len,
                bytes.len() - HEADER_SIZE
            )));
        }

        Self::from_parts(lsn, crc, &bytes[HEADER_SIZE..end])
    }

    /// Validate a payload against its header fields and decode it
    pub(crate) fn from_parts(lsn: u64, crc: u32, payload: &[u8]) -> Result<Self> {
        let actual = checksum(lsn, payload);
        if actual != crc {
            return Err(BurrowError::WalCorruption(format!(
                "CRC mismatch at LSN {}: stored {:#010x}, computed {:#010x}",
                lsn, crc, actual
            )));
        }

        let (operation, timestamp): (Operation, u64) = bincode::deserialize(payload)
            .map_err(|e| BurrowError::WalCorruption(format!("Undecodable payload: {}", e)))?;

        Ok(Self {
            lsn,
            operation,
            timestamp,
        })
    }

    /// Size of the framed record in bytes
    pub fn serialized_size(&self) -> Result<usize> {
        let payload = bincode::serialized_size(&(&self.operation, self.timestamp))?;
        Ok(HEADER_SIZE + payload as usize)
    }

    /// CRC32 over the LSN and payload
    pub fn compute_crc(&self) -> Result<u32> {
        let payload = bincode::serialize(&(&self.operation, self.timestamp))?;
        Ok(checksum(self.lsn, &payload))
    }
}

/// Frame an operation without building an owned `WalEntry`
pub(crate) fn encode_frame(lsn: u64, operation: &Operation, timestamp: u64) -> Result<Vec<u8>> {
    let payload = bincode::serialize(&(operation, timestamp))?;
    let len = u32::try_from(payload.len()).map_err(|_| {
        BurrowError::WalWrite(format!("Entry too large: {} bytes", payload.len()))
    })?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&lsn.to_le_bytes());
    frame.extend_from_slice(&checksum(lsn, &payload).to_le_bytes());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Split a header into (lsn, crc, payload_len)
pub(crate) fn decode_header(header: &[u8]) -> (u64, u32, usize) {
    let mut lsn = [0u8; 8];
    lsn.copy_from_slice(&header[0..8]);
    let mut crc = [0u8; 4];
    crc.copy_from_slice(&header[8..12]);
    let mut len = [0u8; 4];
    len.copy_from_slice(&header[12..16]);
    (
        u64::from_le_bytes(lsn),
        u32::from_le_bytes(crc),
        u32::from_le_bytes(len) as usize,
    )
}

fn checksum(lsn: u64, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&lsn.to_le_bytes());
    hasher.update(payload);
    hasher.finalize()
}
