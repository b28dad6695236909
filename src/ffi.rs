//! FFI Layer
//!
//! All C-ABI exports are defined here. Every function follows the same
//! pattern:
//! - Input: JSON string (null-terminated C string)
//! - Output: JSON string (must be freed with `algo_free_string`)
//!
//! Error handling: All functions return JSON with a `success` field.
//! On error, `success: false` and the `error` object is populated.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use crate::error::{ErrorCode, ErrorReport};
use crate::inspect;
use crate::types::ApiResponse;

// =============================================================================
// Memory Management
// =============================================================================

/// Free a string returned by any algo_* function
///
/// # Safety
/// The pointer must have been returned by an algo_* function and not freed
/// before.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn algo_free_string(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    drop(CString::from_raw(s));
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_input<'a>(input: *const c_char) -> Result<&'a str, ErrorReport> {
    if input.is_null() {
        return Err(ErrorReport::new(ErrorCode::InvalidInput, "Null input pointer"));
    }
    // Caller guarantees a valid, null-terminated string that outlives this call
    let c_str = unsafe { CStr::from_ptr(input) };
    c_str
        .to_str()
        .map_err(|_| ErrorReport::new(ErrorCode::InvalidInput, "Invalid UTF-8 string"))
}

fn respond<T: serde::Serialize>(result: Result<T, ErrorReport>) -> *mut c_char {
    let json = match result {
        Ok(data) => ApiResponse::ok(data).to_json(),
        Err(error) => ApiResponse::<()>::err(error).to_json(),
    };
    string_to_ptr(json)
}

fn string_to_ptr(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(c_str) => c_str.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

// =============================================================================
// Inspection
// =============================================================================

/// Decode, group and validate a batch without signing it
///
/// Input: `{"network": "mainnet", "transactions": [{"txn": "<base64>", "authAddr"?: "..."}],
///          "accounts"?: [...], "config"?: {...}}`
#[unsafe(no_mangle)]
pub extern "C" fn algo_inspect_batch(request_json: *const c_char) -> *mut c_char {
    respond(parse_input(request_json).and_then(inspect::inspect_json))
}
