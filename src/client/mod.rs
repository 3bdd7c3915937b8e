//! Client Access Layer
//!
//! The safe API over the boundary in `crate::sys`.
//!
//! ## Responsibilities
//! - Own engine handles, readers and value handles with RAII
//! - Pin caller bytes for exactly the duration of each boundary call
//! - Decode status codes once, into `BurrowError` or a panic
//! - Copy listings out of engine memory and release it exactly once
//! - Enforce the reader state machine before crossing the boundary
//!
//! ## Lifetimes
//! ```text
//!   Handle ──borrows── Reader<'h> ──borrows── Value<'r>
//! ```
//! A reader cannot outlive its handle, nor a value its reader. `close` and
//! `end` take `self`, so use after either is a compile error.

mod buf;
mod file_info;
mod handle;
mod listing;
mod reader;
pub(crate) mod status;
mod value;

pub use file_info::{FileInfo, READ_ONLY_MODE};
pub use handle::Handle;
pub use reader::Reader;
pub use value::{Value, ValueCursor};

pub use crate::transaction::ReaderState;
