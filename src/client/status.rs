//! Status decoding
//!
//! The only place boundary status codes are interpreted. `BURROW_OK` and
//! `BURROW_NO_SUCH_KEY` are the codes a caller can act on; anything else
//! means the engine state behind a live handle can no longer be trusted, and
//! the operation chain is aborted with a panic rather than handed back as an
//! ordinary error.

use crate::error::{BurrowError, Result};
use crate::sys::{
    burrow_status_t, BURROW_INTERNAL, BURROW_INVALID_INPUT, BURROW_IO_ERROR, BURROW_NO_SUCH_KEY,
    BURROW_OK, BURROW_WRITE_FAILED,
};

/// A recognized status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Success,
    NoSuchKey,
}

/// Decode a status code; panics on anything unrecognized
pub(crate) fn decode(code: burrow_status_t) -> Outcome {
    match code {
        BURROW_OK => Outcome::Success,
        BURROW_NO_SUCH_KEY => Outcome::NoSuchKey,
        other => unrecoverable(other),
    }
}

/// Decode a status code where a missing key is an error
pub(crate) fn check(code: burrow_status_t) -> Result<()> {
    match decode(code) {
        Outcome::Success => Ok(()),
        Outcome::NoSuchKey => Err(BurrowError::KeyNotFound),
    }
}

/// Validate a write's reported byte count against the length handed over
pub(crate) fn check_written(expected: usize, written: usize) -> Result<usize> {
    if written == BURROW_WRITE_FAILED {
        return Err(BurrowError::WriteFailed);
    }
    if written != expected {
        tracing::error!(expected, written, "Engine reported a short write");
        return Err(BurrowError::WriteCountMismatch { expected, written });
    }
    Ok(written)
}

/// A read that asked for bytes and got none is past the end of the value
pub(crate) fn end_of_data(requested: usize, read: usize) -> Result<usize> {
    if read == 0 && requested > 0 {
        Err(BurrowError::EndOfData)
    } else {
        Ok(read)
    }
}

pub(crate) fn status_name(code: burrow_status_t) -> &'static str {
    match code {
        BURROW_OK => "ok",
        BURROW_NO_SUCH_KEY => "no such key",
        BURROW_IO_ERROR => "i/o error",
        BURROW_INVALID_INPUT => "invalid input",
        BURROW_INTERNAL => "internal error",
        _ => "unknown status",
    }
}

#[cold]
#[track_caller]
pub(crate) fn unrecoverable(code: burrow_status_t) -> ! {
    tracing::error!(code, status = status_name(code), "Unrecoverable engine status");
    panic!("unrecoverable engine status {} ({})", code, status_name(code));
}

#[cold]
#[track_caller]
pub(crate) fn contract_violation(what: &str) -> ! {
    tracing::error!(%what, "Engine broke the boundary contract");
    panic!("engine broke the boundary contract: {}", what);
}
