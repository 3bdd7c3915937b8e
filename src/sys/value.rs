use super::*;

/// Copy the value's bytes from `offset`. `buf.size` holds the capacity on
/// entry and the count copied on return. Only valid once the owning reader
/// has begun.
#[no_mangle]
pub unsafe extern "C" fn burrow_value_read_at(
    value: *const burrow_value_t,
    buf: *mut burrow_mut_buf_t,
    offset: u64,
) -> burrow_status_t {
    if let Err(e) = require_handle(value, "value") {
        return e;
    }
    if let Err(e) = require_out_ptr(buf, "buf") {
        return e;
    }

    let value = &*value;
    if !value.committed {
        return invalid_input("value read before its reader began");
    }
    let record = match &value.record {
        Some(record) => record,
        None => return BURROW_NO_SUCH_KEY,
    };

    let buf = &mut *buf;
    let dest = match bytes_from_mut_ptr(buf.ptr, buf.size, "buf.ptr") {
        Ok(d) => d,
        Err(e) => return e,
    };
    buf.size = record.read_at(dest, offset);
    BURROW_OK
}

#[no_mangle]
pub unsafe extern "C" fn burrow_value_stat(
    value: *const burrow_value_t,
    out_stat: *mut burrow_stat_t,
) -> burrow_status_t {
    if let Err(e) = require_handle(value, "value") {
        return e;
    }
    if let Err(e) = require_out_ptr(out_stat, "out_stat") {
        return e;
    }

    let value = &*value;
    if !value.committed {
        return invalid_input("value stat before its reader began");
    }
    match &value.record {
        Some(record) => {
            *out_stat = record.stat().into();
            BURROW_OK
        }
        None => BURROW_NO_SUCH_KEY,
    }
}
