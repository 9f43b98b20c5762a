//! Synchronous API client core for the Oyster transit-card service.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values without
//! touching the network (host-does-IO pattern). The async session crate and
//! the C ABI both sit on top of this crate and only differ in who performs
//! the exchange.
//!
//! # Design
//! - `OysterClient` is stateless: it holds only `base_url`.
//! - Each operation is split into `build_*` (validates, produces request) and
//!   `parse_*` (consumes response), so the I/O boundary is explicit.
//! - All failures surface as one `ClientError` enum.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod error;
pub mod http;
pub mod types;

pub use client::OysterClient;
pub use error::{ApiError, ClientError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use types::{
    Card, Credentials, NewUser, Page, Station, Transaction, TransactionQuery, TransactionType,
};
