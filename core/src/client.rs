//! Stateless HTTP request builder and response parser for the Oyster API.
//!
//! # Design
//! `OysterClient` holds only a `base_url` and carries no mutable state between
//! calls. Each operation is split into a `build_*` method that validates its
//! input and produces an `HttpRequest`, and a `parse_*` method that consumes
//! an `HttpResponse`. Input that can never succeed is rejected in `build_*`,
//! so a caller that checks the `Result` never reaches the network with it.
//!
//! Every `parse_*` applies the same status policy: a status of 400 or above
//! becomes `ClientError::HttpStatus` with the error body decoded when
//! possible. Anything lower is read as a normal response, so an unexpected
//! 3xx on a typed operation surfaces as `ClientError::Decode`.

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::error::ClientError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{
    format_timestamp, Card, Credentials, NewUser, Page, Station, Transaction, TransactionQuery,
};

const JSON: &str = "application/json";
const FORM: &str = "application/x-www-form-urlencoded";

/// Synchronous, stateless client for the Oyster API.
#[derive(Debug, Clone)]
pub struct OysterClient {
    base_url: String,
}

impl OysterClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -----------------------------------------------------------------------
    // Stations and cards
    // -----------------------------------------------------------------------

    pub fn build_list_stations(&self) -> Result<HttpRequest, ClientError> {
        self.request(HttpMethod::Get, "/stations/")
    }

    pub fn build_list_cards(&self) -> Result<HttpRequest, ClientError> {
        self.request(HttpMethod::Get, "/cards/")
    }

    pub fn build_register_new_card(&self) -> Result<HttpRequest, ClientError> {
        self.request(HttpMethod::Post, "/cards/")
    }

    pub fn build_register_existing_card(&self, card_number: i64) -> Result<HttpRequest, ClientError> {
        check_card_number(card_number)?;
        self.request(HttpMethod::Post, &format!("/cards/number/{card_number}"))
    }

    pub fn build_block_card(&self, card_number: i64) -> Result<HttpRequest, ClientError> {
        check_card_number(card_number)?;
        self.request(HttpMethod::Put, &format!("/cards/block/{card_number}"))
    }

    pub fn build_top_up(&self, card_number: i64, amount: Decimal) -> Result<HttpRequest, ClientError> {
        check_card_number(card_number)?;
        if amount <= Decimal::ZERO {
            return Err(ClientError::invalid(format!(
                "top-up amount must be positive, got {amount}"
            )));
        }
        let mut url = self.url(&format!("/cards/{card_number}"))?;
        url.query_pairs_mut()
            .append_pair("amount", &amount.normalize().to_string());
        Ok(HttpRequest::new(HttpMethod::Put, url.into()))
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    pub fn build_tap_in(&self, card_number: i64, station: &Station) -> Result<HttpRequest, ClientError> {
        self.build_tap(card_number, station, "tapIn")
    }

    pub fn build_tap_out(&self, card_number: i64, station: &Station) -> Result<HttpRequest, ClientError> {
        self.build_tap(card_number, station, "tapOut")
    }

    fn build_tap(&self, card_number: i64, station: &Station, action: &str) -> Result<HttpRequest, ClientError> {
        check_card_number(card_number)?;
        let body = to_json(station)?;
        Ok(self
            .request(HttpMethod::Post, &format!("/transactions/{card_number}/{action}"))?
            .with_body(JSON, body))
    }

    pub fn build_get_transaction(&self, id: i64) -> Result<HttpRequest, ClientError> {
        self.request(HttpMethod::Get, &format!("/transactions/{id}"))
    }

    pub fn build_list_transactions(
        &self,
        card_number: i64,
        query: &TransactionQuery,
    ) -> Result<HttpRequest, ClientError> {
        check_card_number(card_number)?;
        if query.size == 0 {
            return Err(ClientError::invalid("page size must be at least 1"));
        }
        if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
            if start > end {
                return Err(ClientError::invalid("start date is after end date"));
            }
        }

        let mut url = self.url(&format!("/transactions/card/{card_number}"))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("page", &query.page.to_string())
                .append_pair("size", &query.size.to_string());
            if let Some(start) = &query.start_date {
                pairs.append_pair("startDate", &format_timestamp(start));
            }
            if let Some(end) = &query.end_date {
                pairs.append_pair("endDate", &format_timestamp(end));
            }
        }
        Ok(HttpRequest::new(HttpMethod::Get, url.into()))
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    pub fn build_register(&self, user: &NewUser) -> Result<HttpRequest, ClientError> {
        require_all(&[
            ("first name", &user.first_name),
            ("last name", &user.last_name),
            ("email", &user.email),
            ("password", &user.password),
        ])?;
        let body = to_json(user)?;
        Ok(self.request(HttpMethod::Post, "/users/")?.with_body(JSON, body))
    }

    pub fn build_login(&self, credentials: &Credentials) -> Result<HttpRequest, ClientError> {
        require_all(&[
            ("email", &credentials.email),
            ("password", &credentials.password),
        ])?;
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("email", &credentials.email)
            .append_pair("password", &credentials.password)
            .finish();
        Ok(self.request(HttpMethod::Post, "/login")?.with_body(FORM, body))
    }

    // -----------------------------------------------------------------------
    // Parsing
    // -----------------------------------------------------------------------

    pub fn parse_list_stations(&self, response: HttpResponse) -> Result<Vec<Station>, ClientError> {
        parse_json(response)
    }

    pub fn parse_list_cards(&self, response: HttpResponse) -> Result<Vec<Card>, ClientError> {
        parse_json(response)
    }

    pub fn parse_register_new_card(&self, response: HttpResponse) -> Result<Card, ClientError> {
        parse_json(response)
    }

    pub fn parse_register_existing_card(&self, response: HttpResponse) -> Result<Card, ClientError> {
        parse_json(response)
    }

    pub fn parse_block_card(&self, response: HttpResponse) -> Result<(), ClientError> {
        parse_empty(response)
    }

    pub fn parse_top_up(&self, response: HttpResponse) -> Result<(), ClientError> {
        parse_empty(response)
    }

    pub fn parse_tap_in(&self, response: HttpResponse) -> Result<Transaction, ClientError> {
        parse_json(response)
    }

    pub fn parse_tap_out(&self, response: HttpResponse) -> Result<Transaction, ClientError> {
        parse_json(response)
    }

    pub fn parse_get_transaction(&self, response: HttpResponse) -> Result<Transaction, ClientError> {
        parse_json(response)
    }

    pub fn parse_list_transactions(
        &self,
        response: HttpResponse,
    ) -> Result<Page<Transaction>, ClientError> {
        parse_json(response)
    }

    pub fn parse_register(&self, response: HttpResponse) -> Result<(), ClientError> {
        parse_empty(response)
    }

    pub fn parse_login(&self, response: HttpResponse) -> Result<(), ClientError> {
        parse_empty(response)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        let raw = format!("{}{path}", self.base_url);
        Url::parse(&raw).map_err(|e| ClientError::invalid(format!("invalid URL {raw:?}: {e}")))
    }

    fn request(&self, method: HttpMethod, path: &str) -> Result<HttpRequest, ClientError> {
        Ok(HttpRequest::new(method, self.url(path)?.into()))
    }
}

fn check_card_number(card_number: i64) -> Result<(), ClientError> {
    if card_number <= 0 {
        return Err(ClientError::invalid(format!(
            "card number must be positive, got {card_number}"
        )));
    }
    Ok(())
}

/// Reject the whole form if any field is blank, naming every blank field.
fn require_all(fields: &[(&str, &String)]) -> Result<(), ClientError> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ClientError::invalid(format!("required: {}", missing.join(", "))))
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ClientError> {
    serde_json::to_string(value).map_err(|e| ClientError::invalid(format!("cannot encode body: {e}")))
}

fn check_status(response: &HttpResponse) -> Result<(), ClientError> {
    if response.is_error() {
        Err(ClientError::from_response(response))
    } else {
        Ok(())
    }
}

fn parse_json<T: DeserializeOwned>(response: HttpResponse) -> Result<T, ClientError> {
    check_status(&response)?;
    serde_json::from_str(&response.body).map_err(|e| ClientError::Decode {
        message: e.to_string(),
        body: response.body,
    })
}

fn parse_empty(response: HttpResponse) -> Result<(), ClientError> {
    check_status(&response)
}
