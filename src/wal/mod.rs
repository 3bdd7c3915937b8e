//! Write-ahead log backing the reference engine
//!
//! Every mutation (a single-key write or delete, a read touch, a reader's
//! whole commit) is framed, checksummed and appended here before the
//! memtable sees it. Opening a store replays the log; a checkpoint rewrites
//! it down to one `Put` per live key.
//!
//! ## Frame Layout
//! ```text
//!   0        8        12       16                16 + len
//!   ├────────┼────────┼────────┼──────────────────┤
//!   │  lsn   │ crc32  │  len   │ bincode payload  │
//!   └────────┴────────┴────────┴──────────────────┘
//! ```
//! The payload holds the operation and its unix-millis timestamp, which
//! replay restores as the last-used time of each key it names. A reader
//! commit is one `Operation::Batch` frame: a crash either keeps all of it or
//! drops all of it.

mod entry;
mod reader;
mod recovery;
mod writer;

pub use entry::{Operation, WalEntry, HEADER_SIZE};
pub use reader::{WalIterator, WalReader};
pub use recovery::{RecoveryResult, WalRecovery};
pub use writer::WalWriter;
