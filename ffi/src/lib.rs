//! C-ABI wrapper around `oyster-core`.
//!
//! # Overview
//! Exposes every Oyster API operation through `extern "C"` functions so a
//! native mobile shell (or any language with a C FFI) can build requests and
//! parse responses while doing the networking itself.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Per-operation `oyster_build_*` / `oyster_parse_*` mirrors the core API
//!   1:1. A build function returns null when its input is rejected;
//!   `oyster_last_error` then says why.
//! - A single `FfiOysterResult` envelope with `FfiDataTag` and a JSON payload
//!   conveys success values and errors uniformly.
//! - The C caller owns all returned pointers and must call the matching
//!   `oyster_free_*` function to release them.

pub mod types;

use std::cell::RefCell;
use std::ffi::{c_char, CStr, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;
use std::str::FromStr;

use chrono::DateTime;
use oyster_core::{
    ClientError, Credentials, HttpRequest, HttpResponse, NewUser, OysterClient, Station,
    TransactionQuery,
};
use rust_decimal::Decimal;

use types::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Borrow a C string argument as UTF-8.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives the
/// returned reference.
unsafe fn arg<'a>(ptr: *const c_char, name: &str) -> Result<&'a str, ClientError> {
    if ptr.is_null() {
        return Err(ClientError::InvalidRequest(format!("null argument: {name}")));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| ClientError::InvalidRequest(format!("{name} is not valid UTF-8")))
}

/// Why the last `oyster_build_*` on this thread returned null.
enum BuildFailure {
    Rejected(ClientError),
    NullClient,
    Panic,
}

thread_local! {
    static LAST_ERROR: RefCell<Option<BuildFailure>> = const { RefCell::new(None) };
}

fn set_last_error(failure: Option<BuildFailure>) {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = failure);
}

/// Run a build closure against the client behind `client`. Returns null on a
/// null handle, rejected input, or panic, and records the reason for
/// `oyster_last_error`. A successful build clears it.
fn build_with<F>(client: *const FfiOysterClient, build: F) -> *mut FfiHttpRequest
where
    F: FnOnce(&OysterClient) -> Result<HttpRequest, ClientError>,
{
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let Some(client) = (unsafe { client.as_ref() }) else {
            return Err(BuildFailure::NullClient);
        };
        let req = build(&client.inner).map_err(BuildFailure::Rejected)?;
        let req = FfiHttpRequest::from_core(req);
        if req.is_null() {
            return Err(BuildFailure::Rejected(ClientError::InvalidRequest(
                "request contains a NUL byte".to_string(),
            )));
        }
        Ok(req)
    }))
    .unwrap_or(Err(BuildFailure::Panic));

    match outcome {
        Ok(req) => {
            set_last_error(None);
            req
        }
        Err(failure) => {
            set_last_error(Some(failure));
            ptr::null_mut()
        }
    }
}

fn ffi_response_to_core(resp: &FfiHttpResponse) -> HttpResponse {
    let body = if resp.body.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(resp.body) }
            .to_string_lossy()
            .into_owned()
    };
    HttpResponse::new(resp.status, body)
}

/// Shared body of every `oyster_parse_*`: null checks, panic guard, and the
/// mapping of a core result into the envelope.
fn parse_with<T, P, W>(
    client: *const FfiOysterClient,
    response: *const FfiHttpResponse,
    op: &str,
    parse: P,
    wrap: W,
) -> *mut FfiOysterResult
where
    P: FnOnce(&OysterClient, HttpResponse) -> Result<T, ClientError>,
    W: FnOnce(T) -> *mut FfiOysterResult,
{
    catch_unwind(AssertUnwindSafe(|| {
        let Some(client) = (unsafe { client.as_ref() }) else {
            return FfiOysterResult::null_arg("client");
        };
        let Some(resp) = (unsafe { response.as_ref() }) else {
            return FfiOysterResult::null_arg("response");
        };
        match parse(&client.inner, ffi_response_to_core(resp)) {
            Ok(value) => wrap(value),
            Err(e) => FfiOysterResult::from_error(e),
        }
    }))
    .unwrap_or_else(|_| FfiOysterResult::panic(&format!("panic in {op}")))
}

unsafe fn station_arg(id: i64, name: *const c_char, zone: i32) -> Result<Station, ClientError> {
    Ok(Station {
        id,
        name: unsafe { arg(name, "station_name") }?.to_string(),
        zone,
    })
}

/// Nullable RFC 3339 timestamp, any offset.
unsafe fn date_arg(
    ptr: *const c_char,
    name: &str,
) -> Result<Option<DateTime<chrono::FixedOffset>>, ClientError> {
    if ptr.is_null() {
        return Ok(None);
    }
    let raw = unsafe { arg(ptr, name) }?;
    DateTime::parse_from_rfc3339(raw)
        .map(Some)
        .map_err(|e| ClientError::InvalidRequest(format!("{name}: {e}")))
}

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a new `OysterClient` bound to `base_url`, e.g.
/// `http://localhost:8080/api`.
///
/// Returns null if `base_url` is null or not UTF-8. The caller must free the
/// returned pointer with `oyster_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn oyster_client_new(base_url: *const c_char) -> *mut FfiOysterClient {
    catch_unwind(|| match unsafe { arg(base_url, "base_url") } {
        Ok(url) => Box::into_raw(Box::new(FfiOysterClient {
            inner: OysterClient::new(url),
        })),
        Err(_) => ptr::null_mut(),
    })
    .unwrap_or(ptr::null_mut())
}

/// Free a client created by `oyster_client_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn oyster_client_free(client: *mut FfiOysterClient) {
    if !client.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(client) });
        });
    }
}

// ---------------------------------------------------------------------------
// Build request functions
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub extern "C" fn oyster_build_list_stations(client: *const FfiOysterClient) -> *mut FfiHttpRequest {
    build_with(client, |c| c.build_list_stations())
}

#[unsafe(no_mangle)]
pub extern "C" fn oyster_build_list_cards(client: *const FfiOysterClient) -> *mut FfiHttpRequest {
    build_with(client, |c| c.build_list_cards())
}

#[unsafe(no_mangle)]
pub extern "C" fn oyster_build_register_new_card(
    client: *const FfiOysterClient,
) -> *mut FfiHttpRequest {
    build_with(client, |c| c.build_register_new_card())
}

/// Returns null unless `card_number` is positive.
#[unsafe(no_mangle)]
pub extern "C" fn oyster_build_register_existing_card(
    client: *const FfiOysterClient,
    card_number: i64,
) -> *mut FfiHttpRequest {
    build_with(client, |c| c.build_register_existing_card(card_number))
}

#[unsafe(no_mangle)]
pub extern "C" fn oyster_build_block_card(
    client: *const FfiOysterClient,
    card_number: i64,
) -> *mut FfiHttpRequest {
    build_with(client, |c| c.build_block_card(card_number))
}

/// `amount` is a decimal string such as `"12.50"`. Returns null if it does
/// not parse or is not positive.
#[unsafe(no_mangle)]
pub extern "C" fn oyster_build_top_up(
    client: *const FfiOysterClient,
    card_number: i64,
    amount: *const c_char,
) -> *mut FfiHttpRequest {
    build_with(client, |c| {
        let raw = unsafe { arg(amount, "amount") }?;
        let amount = Decimal::from_str(raw.trim())
            .map_err(|e| ClientError::InvalidRequest(format!("amount {raw:?}: {e}")))?;
        c.build_top_up(card_number, amount)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn oyster_build_tap_in(
    client: *const FfiOysterClient,
    card_number: i64,
    station_id: i64,
    station_name: *const c_char,
    station_zone: i32,
) -> *mut FfiHttpRequest {
    build_with(client, |c| {
        let station = unsafe { station_arg(station_id, station_name, station_zone) }?;
        c.build_tap_in(card_number, &station)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn oyster_build_tap_out(
    client: *const FfiOysterClient,
    card_number: i64,
    station_id: i64,
    station_name: *const c_char,
    station_zone: i32,
) -> *mut FfiHttpRequest {
    build_with(client, |c| {
        let station = unsafe { station_arg(station_id, station_name, station_zone) }?;
        c.build_tap_out(card_number, &station)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn oyster_build_get_transaction(
    client: *const FfiOysterClient,
    id: i64,
) -> *mut FfiHttpRequest {
    build_with(client, |c| c.build_get_transaction(id))
}

/// `start_date` and `end_date` are optional (null) RFC 3339 timestamps in
/// any offset; they are sent to the backend in UTC.
#[unsafe(no_mangle)]
pub extern "C" fn oyster_build_list_transactions(
    client: *const FfiOysterClient,
    card_number: i64,
    page: u32,
    size: u32,
    start_date: *const c_char,
    end_date: *const c_char,
) -> *mut FfiHttpRequest {
    build_with(client, |c| {
        let mut query = TransactionQuery::page(page, size);
        if let Some(start) = unsafe { date_arg(start_date, "start_date") }? {
            query = query.since(start);
        }
        if let Some(end) = unsafe { date_arg(end_date, "end_date") }? {
            query = query.until(end);
        }
        c.build_list_transactions(card_number, &query)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn oyster_build_register(
    client: *const FfiOysterClient,
    first_name: *const c_char,
    last_name: *const c_char,
    email: *const c_char,
    password: *const c_char,
) -> *mut FfiHttpRequest {
    build_with(client, |c| {
        let user = unsafe {
            NewUser {
                first_name: arg(first_name, "first_name")?.to_string(),
                last_name: arg(last_name, "last_name")?.to_string(),
                email: arg(email, "email")?.to_string(),
                password: arg(password, "password")?.to_string(),
            }
        };
        c.build_register(&user)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn oyster_build_login(
    client: *const FfiOysterClient,
    email: *const c_char,
    password: *const c_char,
) -> *mut FfiHttpRequest {
    build_with(client, |c| {
        let credentials = unsafe {
            Credentials {
                email: arg(email, "email")?.to_string(),
                password: arg(password, "password")?.to_string(),
            }
        };
        c.build_login(&credentials)
    })
}

// ---------------------------------------------------------------------------
// Parse response functions
// ---------------------------------------------------------------------------

/// `data_tag = StationList` on success.
#[unsafe(no_mangle)]
pub extern "C" fn oyster_parse_list_stations(
    client: *const FfiOysterClient,
    response: *const FfiHttpResponse,
) -> *mut FfiOysterResult {
    parse_with(
        client,
        response,
        "oyster_parse_list_stations",
        |c, r| c.parse_list_stations(r),
        |stations| FfiOysterResult::ok_json(FfiDataTag::StationList, &stations),
    )
}

/// `data_tag = CardList` on success.
#[unsafe(no_mangle)]
pub extern "C" fn oyster_parse_list_cards(
    client: *const FfiOysterClient,
    response: *const FfiHttpResponse,
) -> *mut FfiOysterResult {
    parse_with(
        client,
        response,
        "oyster_parse_list_cards",
        |c, r| c.parse_list_cards(r),
        |cards| FfiOysterResult::ok_json(FfiDataTag::CardList, &cards),
    )
}

/// `data_tag = Card` on success. Persisting the card as "selected" is up to
/// the host.
#[unsafe(no_mangle)]
pub extern "C" fn oyster_parse_register_new_card(
    client: *const FfiOysterClient,
    response: *const FfiHttpResponse,
) -> *mut FfiOysterResult {
    parse_with(
        client,
        response,
        "oyster_parse_register_new_card",
        |c, r| c.parse_register_new_card(r),
        |card| FfiOysterResult::ok_json(FfiDataTag::Card, &card),
    )
}

#[unsafe(no_mangle)]
pub extern "C" fn oyster_parse_register_existing_card(
    client: *const FfiOysterClient,
    response: *const FfiHttpResponse,
) -> *mut FfiOysterResult {
    parse_with(
        client,
        response,
        "oyster_parse_register_existing_card",
        |c, r| c.parse_register_existing_card(r),
        |card| FfiOysterResult::ok_json(FfiDataTag::Card, &card),
    )
}

#[unsafe(no_mangle)]
pub extern "C" fn oyster_parse_block_card(
    client: *const FfiOysterClient,
    response: *const FfiHttpResponse,
) -> *mut FfiOysterResult {
    parse_with(
        client,
        response,
        "oyster_parse_block_card",
        |c, r| c.parse_block_card(r),
        |()| FfiOysterResult::ok_empty(),
    )
}

#[unsafe(no_mangle)]
pub extern "C" fn oyster_parse_top_up(
    client: *const FfiOysterClient,
    response: *const FfiHttpResponse,
) -> *mut FfiOysterResult {
    parse_with(
        client,
        response,
        "oyster_parse_top_up",
        |c, r| c.parse_top_up(r),
        |()| FfiOysterResult::ok_empty(),
    )
}

#[unsafe(no_mangle)]
pub extern "C" fn oyster_parse_tap_in(
    client: *const FfiOysterClient,
    response: *const FfiHttpResponse,
) -> *mut FfiOysterResult {
    parse_with(
        client,
        response,
        "oyster_parse_tap_in",
        |c, r| c.parse_tap_in(r),
        |tx| FfiOysterResult::ok_json(FfiDataTag::Transaction, &tx),
    )
}

#[unsafe(no_mangle)]
pub extern "C" fn oyster_parse_tap_out(
    client: *const FfiOysterClient,
    response: *const FfiHttpResponse,
) -> *mut FfiOysterResult {
    parse_with(
        client,
        response,
        "oyster_parse_tap_out",
        |c, r| c.parse_tap_out(r),
        |tx| FfiOysterResult::ok_json(FfiDataTag::Transaction, &tx),
    )
}

#[unsafe(no_mangle)]
pub extern "C" fn oyster_parse_get_transaction(
    client: *const FfiOysterClient,
    response: *const FfiHttpResponse,
) -> *mut FfiOysterResult {
    parse_with(
        client,
        response,
        "oyster_parse_get_transaction",
        |c, r| c.parse_get_transaction(r),
        |tx| FfiOysterResult::ok_json(FfiDataTag::Transaction, &tx),
    )
}

/// `data_tag = TransactionPage` on success; the JSON keeps the backend's
/// page shape (`content`, `totalPages`, `totalElements`, `size`, `number`).
#[unsafe(no_mangle)]
pub extern "C" fn oyster_parse_list_transactions(
    client: *const FfiOysterClient,
    response: *const FfiHttpResponse,
) -> *mut FfiOysterResult {
    parse_with(
        client,
        response,
        "oyster_parse_list_transactions",
        |c, r| c.parse_list_transactions(r),
        |page| FfiOysterResult::ok_json(FfiDataTag::TransactionPage, &page),
    )
}

#[unsafe(no_mangle)]
pub extern "C" fn oyster_parse_register(
    client: *const FfiOysterClient,
    response: *const FfiHttpResponse,
) -> *mut FfiOysterResult {
    parse_with(
        client,
        response,
        "oyster_parse_register",
        |c, r| c.parse_register(r),
        |()| FfiOysterResult::ok_empty(),
    )
}

/// On success the host should forget any selected card it stored.
#[unsafe(no_mangle)]
pub extern "C" fn oyster_parse_login(
    client: *const FfiOysterClient,
    response: *const FfiHttpResponse,
) -> *mut FfiOysterResult {
    parse_with(
        client,
        response,
        "oyster_parse_login",
        |c, r| c.parse_login(r),
        |()| FfiOysterResult::ok_empty(),
    )
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why the most recent `oyster_build_*` call on this thread returned null.
///
/// Returns null when that call succeeded or nothing has been built yet.
/// Rejected input comes back as `InvalidRequest` with a user-facing message.
/// Taking the error clears it. Free the result with `oyster_free_result`.
#[unsafe(no_mangle)]
pub extern "C" fn oyster_last_error() -> *mut FfiOysterResult {
    catch_unwind(|| match LAST_ERROR.with(|slot| slot.borrow_mut().take()) {
        None => ptr::null_mut(),
        Some(BuildFailure::Rejected(err)) => FfiOysterResult::from_error(err),
        Some(BuildFailure::NullClient) => FfiOysterResult::null_arg("client"),
        Some(BuildFailure::Panic) => FfiOysterResult::panic("panic while building request"),
    })
    .unwrap_or_else(|_| FfiOysterResult::panic("panic in oyster_last_error"))
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiHttpRequest` returned by any `oyster_build_*` function.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn oyster_free_request(req: *mut FfiHttpRequest) {
    if req.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let req = unsafe { Box::from_raw(req) };
        oyster_free_string(req.url);
        oyster_free_string(req.body);
        if !req.headers.is_null() && req.headers_len > 0 {
            let headers = unsafe {
                Box::from_raw(ptr::slice_from_raw_parts_mut(
                    req.headers,
                    req.headers_len as usize,
                ))
            };
            for h in headers.iter() {
                oyster_free_string(h.key);
                oyster_free_string(h.value);
            }
        }
    });
}

/// Free an `FfiOysterResult` returned by any `oyster_parse_*` function.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn oyster_free_result(result: *mut FfiOysterResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        oyster_free_string(result.error_message);
        oyster_free_string(result.data);
    });
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn oyster_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { CString::from_raw(s) });
        });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
