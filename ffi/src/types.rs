//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Requests mirror `oyster_core::HttpRequest` field for field, with C strings
//! and a raw header array. Parsed payloads are handed back as JSON C strings
//! rather than one struct per DTO: the shapes (pages of transactions with
//! nested stations, optional amounts) are awkward in C, and every host that
//! embeds this library already has a JSON decoder. Money inside that JSON is
//! a decimal string, never a float.

use std::ffi::{c_char, CString};
use std::ptr;

use oyster_core::{ClientError, HttpMethod, OysterClient};
use serde::Serialize;

/// Opaque handle to an `OysterClient`. C callers receive a pointer to this
/// and pass it back into every FFI function.
pub struct FfiOysterClient {
    pub(crate) inner: OysterClient,
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
    Put = 2,
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => FfiHttpMethod::Get,
            HttpMethod::Post => FfiHttpMethod::Post,
            HttpMethod::Put => FfiHttpMethod::Put,
        }
    }
}

#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// An HTTP request described as C-compatible plain data.
///
/// Built by `oyster_build_*` functions. The C caller executes the request
/// (keeping whatever cookies the server sets) and passes the response back
/// through the matching `oyster_parse_*`.
#[repr(C)]
pub struct FfiHttpRequest {
    pub method: FfiHttpMethod,
    /// Absolute URL, query string included.
    pub url: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
    /// Null when the request has no body.
    pub body: *mut c_char,
}

impl FfiHttpRequest {
    /// Move a core request onto the heap. Null if any string holds a NUL byte.
    pub(crate) fn from_core(req: oyster_core::HttpRequest) -> *mut Self {
        let Ok(url) = CString::new(req.url) else {
            return ptr::null_mut();
        };
        let body = match req.body.map(CString::new).transpose() {
            Ok(body) => body,
            Err(_) => return ptr::null_mut(),
        };
        let headers: Result<Vec<(CString, CString)>, _> = req
            .headers
            .into_iter()
            .map(|(k, v)| Ok::<_, std::ffi::NulError>((CString::new(k)?, CString::new(v)?)))
            .collect();
        let Ok(headers) = headers else {
            return ptr::null_mut();
        };

        let headers_len = headers.len() as u32;
        let headers = if headers.is_empty() {
            ptr::null_mut()
        } else {
            let ffi_headers: Box<[FfiHeader]> = headers
                .into_iter()
                .map(|(k, v)| FfiHeader {
                    key: k.into_raw(),
                    value: v.into_raw(),
                })
                .collect();
            Box::into_raw(ffi_headers) as *mut FfiHeader
        };

        Box::into_raw(Box::new(FfiHttpRequest {
            method: req.method.into(),
            url: url.into_raw(),
            headers,
            headers_len,
            body: body.map_or(ptr::null_mut(), CString::into_raw),
        }))
    }
}

// ---------------------------------------------------------------------------
// Response input (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// An HTTP response described as C-compatible plain data.
///
/// The C caller builds this after executing a request and passes a pointer
/// to an `oyster_parse_*` function. The FFI layer reads but does not free
/// these fields. A null `body` is treated as empty.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub body: *const c_char,
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// One code per `ClientError` variant, plus the FFI-only failures.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    Transport = 1,
    InvalidRequest = 2,
    Http = 3,
    Decode = 4,
    Panic = 5,
    NullArg = 6,
}

/// What the JSON in `FfiOysterResult::data` decodes to.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiDataTag {
    None = 0,
    StationList = 1,
    Card = 2,
    CardList = 3,
    Transaction = 4,
    TransactionPage = 5,
    /// The backend's error record, set alongside `FfiErrorCode::Http`.
    ApiError = 6,
}

/// Result envelope for all parse operations.
///
/// On success `error_code` is `Ok`, `error_message` is null, and `data` is
/// the payload as JSON (tagged by `data_tag`), or null for operations with
/// no payload. On failure `error_message` is a user-facing message; for
/// `Http` failures `http_status` is set and `data` holds the `ApiError`
/// record as JSON.
#[repr(C)]
pub struct FfiOysterResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub http_status: u16,
    pub data_tag: FfiDataTag,
    pub data: *mut c_char,
}

fn c_string_lossy(s: String) -> *mut c_char {
    CString::new(s.replace('\0', "")).unwrap_or_default().into_raw()
}

impl FfiOysterResult {
    fn boxed(
        error_code: FfiErrorCode,
        error_message: *mut c_char,
        http_status: u16,
        data_tag: FfiDataTag,
        data: *mut c_char,
    ) -> *mut Self {
        Box::into_raw(Box::new(FfiOysterResult {
            error_code,
            error_message,
            http_status,
            data_tag,
            data,
        }))
    }

    pub(crate) fn ok_json<T: Serialize>(tag: FfiDataTag, value: &T) -> *mut Self {
        match serde_json::to_string(value) {
            Ok(json) => Self::boxed(
                FfiErrorCode::Ok,
                ptr::null_mut(),
                0,
                tag,
                c_string_lossy(json),
            ),
            Err(e) => Self::boxed(
                FfiErrorCode::Decode,
                c_string_lossy(format!("failed to encode payload: {e}")),
                0,
                FfiDataTag::None,
                ptr::null_mut(),
            ),
        }
    }

    pub(crate) fn ok_empty() -> *mut Self {
        Self::boxed(
            FfiErrorCode::Ok,
            ptr::null_mut(),
            0,
            FfiDataTag::None,
            ptr::null_mut(),
        )
    }

    pub(crate) fn from_error(err: ClientError) -> *mut Self {
        let message = c_string_lossy(err.message());
        match &err {
            ClientError::HttpStatus { status, error, .. } => {
                let data = serde_json::to_string(error)
                    .map_or(ptr::null_mut(), c_string_lossy);
                let tag = if data.is_null() {
                    FfiDataTag::None
                } else {
                    FfiDataTag::ApiError
                };
                Self::boxed(FfiErrorCode::Http, message, *status, tag, data)
            }
            ClientError::Transport(_) => Self::failure(FfiErrorCode::Transport, message),
            ClientError::InvalidRequest(_) => {
                Self::failure(FfiErrorCode::InvalidRequest, message)
            }
            ClientError::Decode { .. } => Self::failure(FfiErrorCode::Decode, message),
        }
    }

    fn failure(code: FfiErrorCode, message: *mut c_char) -> *mut Self {
        Self::boxed(code, message, 0, FfiDataTag::None, ptr::null_mut())
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::failure(
            FfiErrorCode::NullArg,
            c_string_lossy(format!("null argument: {name}")),
        )
    }

    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::failure(FfiErrorCode::Panic, c_string_lossy(msg.to_string()))
    }
}
