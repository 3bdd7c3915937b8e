use std::ptr::NonNull;
use std::sync::Arc;

use crate::transaction::Transaction;

use super::*;

#[no_mangle]
pub unsafe extern "C" fn burrow_reader_new(
    handle: *const burrow_handle_t,
    out_reader: *mut *mut burrow_reader_t,
) -> burrow_status_t {
    if let Err(e) = require_handle(handle, "handle") {
        return e;
    }
    if let Err(e) = require_out_ptr(out_reader, "out_reader") {
        return e;
    }

    let engine = Arc::clone(&(*handle).engine);
    *out_reader = Box::into_raw(Box::new(burrow_reader_t {
        txn: Transaction::new(engine),
        values: Vec::new(),
    }));
    BURROW_OK
}

/// Stage an existing key for reading. `out_value` receives a value handle
/// owned by the reader.
#[no_mangle]
pub unsafe extern "C" fn burrow_reader_add(
    reader: *mut burrow_reader_t,
    key: burrow_buf_t,
    out_value: *mut *const burrow_value_t,
) -> burrow_status_t {
    if let Err(e) = require_handle(reader, "reader") {
        return e;
    }
    if let Err(e) = require_out_ptr(out_value, "out_value") {
        return e;
    }
    let key = match bytes_from_buf(key, "key") {
        Ok(k) => k,
        Err(e) => return e,
    };

    let reader = &mut *reader;
    match reader.txn.add(key) {
        Ok(()) => {
            *out_value = reader_stage(reader, key);
            BURROW_OK
        }
        Err(e) => status_from_error(&e),
    }
}

/// Stage a write. `out_value` receives a value handle owned by the reader.
#[no_mangle]
pub unsafe extern "C" fn burrow_reader_put(
    reader: *mut burrow_reader_t,
    key: burrow_buf_t,
    value: burrow_buf_t,
    out_value: *mut *const burrow_value_t,
) -> burrow_status_t {
    if let Err(e) = require_handle(reader, "reader") {
        return e;
    }
    if let Err(e) = require_out_ptr(out_value, "out_value") {
        return e;
    }
    let (key, value) = match (bytes_from_buf(key, "key"), bytes_from_buf(value, "value")) {
        (Ok(k), Ok(v)) => (k, v),
        (Err(e), _) | (_, Err(e)) => return e,
    };

    let reader = &mut *reader;
    match reader.txn.put(key, value) {
        Ok(()) => {
            *out_value = reader_stage(reader, key);
            BURROW_OK
        }
        Err(e) => status_from_error(&e),
    }
}

/// Commit the reader's staged keys and resolve its value handles.
#[no_mangle]
pub unsafe extern "C" fn burrow_reader_begin(reader: *mut burrow_reader_t) -> burrow_status_t {
    if let Err(e) = require_handle(reader, "reader") {
        return e;
    }

    let reader = &mut *reader;
    match reader.txn.begin() {
        Ok(snapshot) => {
            for value in &reader.values {
                let value = &mut *value.as_ptr();
                value.record = snapshot.get(&value.key).cloned();
                value.committed = true;
            }
            BURROW_OK
        }
        Err(e) => status_from_error(&e),
    }
}

/// End the reader and free it along with every value handle it owns.
#[no_mangle]
pub unsafe extern "C" fn burrow_reader_end(reader: *mut burrow_reader_t) -> burrow_status_t {
    if reader.is_null() {
        return invalid_input("reader must not be null");
    }

    let mut reader = Box::from_raw(reader);
    let result = reader.txn.end();
    drop(reader);

    match result {
        Ok(()) => BURROW_OK,
        Err(e) => status_from_error(&e),
    }
}

/// List the reader's snapshot. Only valid once the reader has begun.
#[no_mangle]
pub unsafe extern "C" fn burrow_reader_list_items(
    reader: *const burrow_reader_t,
    prefix: burrow_buf_t,
    out_items: *mut *mut burrow_item_t,
    out_len: *mut usize,
) -> burrow_status_t {
    if let Err(e) = require_handle(reader, "reader") {
        return e;
    }
    if let Err(e) = require_out_ptr(out_items, "out_items") {
        return e;
    }
    if let Err(e) = require_out_ptr(out_len, "out_len") {
        return e;
    }
    let prefix = match bytes_from_buf(prefix, "prefix") {
        Ok(p) => p,
        Err(e) => return e,
    };

    match (*reader).txn.list_items(prefix) {
        Ok(items) => {
            export_items(items, out_items, out_len);
            BURROW_OK
        }
        Err(e) => status_from_error(&e),
    }
}

fn reader_stage(reader: &mut burrow_reader_t, key: &[u8]) -> *const burrow_value_t {
    let value = Box::new(burrow_value_t {
        key: key.to_vec(),
        record: None,
        committed: false,
    });
    let value = NonNull::from(Box::leak(value));
    reader.values.push(value);
    value.as_ptr()
}
