//! Domain DTOs for the Oyster API.
//!
//! # Design
//! Field names follow Rust conventions; `serde` maps them onto the backend's
//! camelCase JSON. Money is `Decimal` and is accepted from JSON numbers or
//! strings. Timestamps stay as the backend's strings, with parsing helpers
//! for display code.

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Timestamp layout used on the wire, in both directions.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A station on the network. Reference data owned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub id: i64,
    pub name: String,
    pub zone: i32,
}

/// A transit card owned by the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: i64,
    pub card_number: i64,
    pub user_id: i64,
    pub issued_at: String,
    pub balance: Decimal,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

fn active_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Charge,
    TopUp,
}

/// A journey leg or a top-up recorded by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    pub card_id: i64,
    pub card_number: i64,
    pub transaction_type: TransactionType,
    #[serde(default)]
    pub start_station: Option<Station>,
    #[serde(default)]
    pub end_station: Option<Station>,
    #[serde(default)]
    pub fare: Option<Decimal>,
    #[serde(default)]
    pub top_up_amount: Option<Decimal>,
    pub start_at: String,
    #[serde(default)]
    pub end_at: Option<String>,
}

impl Transaction {
    /// Whether the optional fields match the transaction type: a charge has
    /// a fare and a start station, a top-up has an amount and no stations.
    pub fn is_consistent(&self) -> bool {
        match self.transaction_type {
            TransactionType::Charge => self.fare.is_some() && self.start_station.is_some(),
            TransactionType::TopUp => {
                self.top_up_amount.is_some()
                    && self.start_station.is_none()
                    && self.end_station.is_none()
            }
        }
    }

    pub fn started_at(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.start_at)
    }

    pub fn ended_at(&self) -> Option<NaiveDateTime> {
        self.end_at.as_deref().and_then(parse_timestamp)
    }
}

/// Parse a backend timestamp. Fractional seconds are tolerated.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

/// Render an instant the way the history endpoint expects it.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// One page of a server-side collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_pages: u32,
    pub total_elements: u64,
    pub size: u32,
    #[serde(rename = "number")]
    pub page_number: u32,
}

impl<T> Page<T> {
    pub fn is_last(&self) -> bool {
        self.page_number.saturating_add(1) >= self.total_pages
    }
}

/// Registration payload for `POST /users/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// Login form for `POST /login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Paging and optional inclusive date range for a card's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionQuery {
    pub page: u32,
    pub size: u32,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl TransactionQuery {
    pub fn page(page: u32, size: u32) -> Self {
        Self {
            page,
            size,
            start_date: None,
            end_date: None,
        }
    }

    /// Only transactions starting at or after `start`. Any time zone is
    /// accepted; the value is sent in UTC.
    pub fn since<Tz: chrono::TimeZone>(mut self, start: DateTime<Tz>) -> Self {
        self.start_date = Some(start.with_timezone(&Utc));
        self
    }

    /// Only transactions starting at or before `end`.
    pub fn until<Tz: chrono::TimeZone>(mut self, end: DateTime<Tz>) -> Self {
        self.end_date = Some(end.with_timezone(&Utc));
        self
    }
}

impl Default for TransactionQuery {
    fn default() -> Self {
        Self::page(0, 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    #[test]
    fn card_defaults_to_active() {
        let card: Card = serde_json::from_str(
            r#"{"id":1,"cardNumber":12345678,"userId":9,"issuedAt":"2024-01-01T00:00:00","balance":0.0}"#,
        )
        .unwrap();
        assert!(card.is_active);
        assert_eq!(card.balance, Decimal::ZERO);
    }

    #[test]
    fn card_accepts_string_balance() {
        let card: Card = serde_json::from_str(
            r#"{"id":1,"cardNumber":1,"userId":1,"issuedAt":"x","balance":"12.50","isActive":false}"#,
        )
        .unwrap();
        assert_eq!(card.balance, Decimal::new(1250, 2));
        assert!(!card.is_active);
    }

    #[test]
    fn card_serializes_camel_case() {
        let card = Card {
            id: 1,
            card_number: 42,
            user_id: 7,
            issued_at: "2024-01-01T00:00:00".into(),
            balance: Decimal::new(500, 2),
            is_active: true,
        };
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["cardNumber"], 42);
        assert_eq!(json["userId"], 7);
        assert_eq!(json["isActive"], true);
    }

    #[test]
    fn charge_transaction_decodes() {
        let tx: Transaction = serde_json::from_str(
            r#"{"id":3,"cardId":1,"cardNumber":12345678,"transactionType":"CHARGE",
                "startStation":{"id":1,"name":"Victoria","zone":1},
                "endStation":{"id":6,"name":"Wimbledon","zone":3},
                "fare":4.0,"startAt":"2024-01-01T08:00:00","endAt":"2024-01-01T08:35:12.123"}"#,
        )
        .unwrap();
        assert_eq!(tx.transaction_type, TransactionType::Charge);
        assert_eq!(tx.fare, Some(Decimal::new(4, 0)));
        assert!(tx.top_up_amount.is_none());
        assert!(tx.is_consistent());
        assert_eq!(
            tx.ended_at().unwrap().format(TIMESTAMP_FORMAT).to_string(),
            "2024-01-01T08:35:12"
        );
    }

    #[test]
    fn top_up_with_station_is_inconsistent() {
        let tx: Transaction = serde_json::from_str(
            r#"{"id":4,"cardId":1,"cardNumber":1,"transactionType":"TOP_UP","topUpAmount":10,
                "startStation":{"id":1,"name":"Victoria","zone":1},"startAt":"2024-01-01T08:00:00"}"#,
        )
        .unwrap();
        assert_eq!(tx.transaction_type, TransactionType::TopUp);
        assert!(!tx.is_consistent());
    }

    #[test]
    fn unknown_transaction_type_is_rejected() {
        let result: Result<Transaction, _> = serde_json::from_str(
            r#"{"id":4,"cardId":1,"cardNumber":1,"transactionType":"REFUND","startAt":"x"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn page_reads_spring_number_field() {
        let page: Page<Station> = serde_json::from_str(
            r#"{"content":[{"id":1,"name":"Victoria","zone":1}],"totalPages":3,"totalElements":21,"size":10,"number":2}"#,
        )
        .unwrap();
        assert_eq!(page.page_number, 2);
        assert_eq!(page.content.len(), 1);
        assert!(page.is_last());
    }

    #[test]
    fn empty_page_is_last() {
        let page: Page<Station> = serde_json::from_str(
            r#"{"content":[],"totalPages":0,"totalElements":0,"size":10,"number":0}"#,
        )
        .unwrap();
        assert!(page.is_last());
    }

    #[test]
    fn query_converts_offsets_to_utc() {
        let plus_five = FixedOffset::east_opt(5 * 3600).unwrap();
        let start = plus_five.with_ymd_and_hms(2024, 3, 1, 2, 30, 0).unwrap();
        let query = TransactionQuery::page(0, 20).since(start);
        assert_eq!(
            format_timestamp(&query.start_date.unwrap()),
            "2024-02-29T21:30:00"
        );
    }

    #[test]
    fn new_user_serializes_camel_case() {
        let user = NewUser {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            password: "secret".into(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["firstName"], "Ada");
        assert_eq!(json["lastName"], "Lovelace");
    }
}
