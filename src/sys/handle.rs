use std::sync::Arc;

use crate::engine::Engine;

use super::*;

#[no_mangle]
pub unsafe extern "C" fn burrow_open(
    config: *const burrow_config_t,
    out_handle: *mut *mut burrow_handle_t,
) -> burrow_status_t {
    if let Err(e) = require_handle(config, "config") {
        return e;
    }
    if let Err(e) = require_out_ptr(out_handle, "out_handle") {
        return e;
    }

    let config = match build_config(&*config) {
        Ok(c) => c,
        Err(e) => return e,
    };

    match Engine::open(config) {
        Ok(engine) => {
            *out_handle = Box::into_raw(Box::new(burrow_handle_t {
                engine: Arc::new(engine),
            }));
            BURROW_OK
        }
        Err(e) => status_from_error(&e),
    }
}

#[no_mangle]
pub unsafe extern "C" fn burrow_close(handle: *mut burrow_handle_t) -> burrow_status_t {
    if handle.is_null() {
        return invalid_input("handle must not be null");
    }

    let handle = Box::from_raw(handle);
    match Arc::try_unwrap(handle.engine) {
        Ok(engine) => match engine.close() {
            Ok(()) => BURROW_OK,
            Err(e) => status_from_error(&e),
        },
        // Readers still hold the engine; it shuts down with the last of them.
        Err(engine) => {
            tracing::warn!(
                readers = Arc::strong_count(&engine) - 1,
                "Handle closed while readers are still open"
            );
            BURROW_OK
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn burrow_single_stat(
    handle: *const burrow_handle_t,
    key: burrow_buf_t,
    out_stat: *mut burrow_stat_t,
) -> burrow_status_t {
    if let Err(e) = require_handle(handle, "handle") {
        return e;
    }
    if let Err(e) = require_out_ptr(out_stat, "out_stat") {
        return e;
    }
    let key = match bytes_from_buf(key, "key") {
        Ok(k) => k,
        Err(e) => return e,
    };

    match (*handle).engine.stat(key) {
        Some(stat) => {
            *out_stat = stat.into();
            BURROW_OK
        }
        None => BURROW_NO_SUCH_KEY,
    }
}

/// Returns the number of bytes written, or `BURROW_WRITE_FAILED`.
#[no_mangle]
pub unsafe extern "C" fn burrow_single_write_buf(
    handle: *const burrow_handle_t,
    key: burrow_buf_t,
    value: burrow_buf_t,
) -> usize {
    if require_handle(handle, "handle").is_err() {
        return BURROW_WRITE_FAILED;
    }
    let (key, value) = match (bytes_from_buf(key, "key"), bytes_from_buf(value, "value")) {
        (Ok(k), Ok(v)) => (k, v),
        _ => return BURROW_WRITE_FAILED,
    };

    match (*handle).engine.write(key, value) {
        Ok(written) => written,
        Err(e) => {
            status_from_error(&e);
            BURROW_WRITE_FAILED
        }
    }
}

/// `buf.size` holds the capacity of `buf.ptr` on entry and the count read on
/// return.
#[no_mangle]
pub unsafe extern "C" fn burrow_single_readat(
    handle: *const burrow_handle_t,
    key: burrow_buf_t,
    buf: *mut burrow_mut_buf_t,
    offset: u64,
) -> burrow_status_t {
    if let Err(e) = require_handle(handle, "handle") {
        return e;
    }
    if let Err(e) = require_out_ptr(buf, "buf") {
        return e;
    }
    let key = match bytes_from_buf(key, "key") {
        Ok(k) => k,
        Err(e) => return e,
    };
    let buf = &mut *buf;
    let dest = match bytes_from_mut_ptr(buf.ptr, buf.size, "buf.ptr") {
        Ok(d) => d,
        Err(e) => return e,
    };

    match (*handle).engine.read_at(key, dest, offset) {
        Ok(n) => {
            buf.size = n;
            BURROW_OK
        }
        Err(e) => status_from_error(&e),
    }
}

/// `out_stat` receives the metadata the key had when it was removed.
#[no_mangle]
pub unsafe extern "C" fn burrow_single_delete(
    handle: *const burrow_handle_t,
    key: burrow_buf_t,
    out_stat: *mut burrow_stat_t,
) -> burrow_status_t {
    if let Err(e) = require_handle(handle, "handle") {
        return e;
    }
    if let Err(e) = require_out_ptr(out_stat, "out_stat") {
        return e;
    }
    let key = match bytes_from_buf(key, "key") {
        Ok(k) => k,
        Err(e) => return e,
    };

    match (*handle).engine.delete(key) {
        Ok(Some(stat)) => {
            *out_stat = stat.into();
            BURROW_OK
        }
        Ok(None) => BURROW_NO_SUCH_KEY,
        Err(e) => status_from_error(&e),
    }
}

#[no_mangle]
pub unsafe extern "C" fn burrow_list_items(
    handle: *const burrow_handle_t,
    prefix: burrow_buf_t,
    out_items: *mut *mut burrow_item_t,
    out_len: *mut usize,
) -> burrow_status_t {
    if let Err(e) = require_handle(handle, "handle") {
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

    let items = (*handle).engine.list_items(prefix);
    export_items(items, out_items, out_len);
    BURROW_OK
}

#[no_mangle]
pub unsafe extern "C" fn burrow_set_instance_limits(
    handle: *const burrow_handle_t,
    limits: *const burrow_limits_t,
) -> burrow_status_t {
    if let Err(e) = require_handle(handle, "handle") {
        return e;
    }
    if let Err(e) = require_handle(limits, "limits") {
        return e;
    }

    (*handle).engine.set_limits((*limits).into());
    BURROW_OK
}

/// `out_removed` may be null.
#[no_mangle]
pub unsafe extern "C" fn burrow_cleanup_snapshots(
    handle: *const burrow_handle_t,
    out_removed: *mut usize,
) -> burrow_status_t {
    if let Err(e) = require_handle(handle, "handle") {
        return e;
    }

    match (*handle).engine.cleanup_snapshots() {
        Ok(removed) => {
            if !out_removed.is_null() {
                *out_removed = removed;
            }
            BURROW_OK
        }
        Err(e) => status_from_error(&e),
    }
}
