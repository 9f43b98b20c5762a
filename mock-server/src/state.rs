//! In-memory model of the transit backend.
//!
//! Handlers resolve the caller from the session cookie and then call one
//! method here per route. Every rule the real backend enforces that the
//! client has to cope with (ownership, blocked cards, open journeys) lives
//! in this file.

use std::collections::HashMap;

use chrono::{NaiveDateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ApiFailure;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const FIRST_CARD_NUMBER: i64 = 10_000_001;

pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(0)
}

pub fn timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn base_fare() -> Decimal {
    Decimal::new(240, 2)
}

fn fare_per_zone() -> Decimal {
    Decimal::new(80, 2)
}

/// Charged when tapping out without an open journey.
pub fn maximum_fare() -> Decimal {
    Decimal::new(800, 2)
}

/// Base fare plus a fixed step for every zone boundary crossed.
pub fn zone_fare(from: &Station, to: &Station) -> Decimal {
    let crossed = (from.zone - to.zone).unsigned_abs();
    base_fare() + fare_per_zone() * Decimal::from(crossed)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub id: i64,
    pub name: String,
    pub zone: i32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: i64,
    pub card_number: i64,
    pub user_id: i64,
    pub issued_at: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    pub is_active: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Charge,
    TopUp,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    pub card_id: i64,
    pub card_number: i64,
    pub transaction_type: TransactionType,
    pub start_station: Option<Station>,
    pub end_station: Option<Station>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub fare: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub top_up_amount: Option<Decimal>,
    pub start_at: String,
    pub end_at: Option<String>,
}

/// Spring-style page envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_pages: u32,
    pub total_elements: u64,
    pub size: u32,
    pub number: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

struct User {
    view: UserView,
    password: String,
}

struct OpenJourney {
    station: Station,
    started: NaiveDateTime,
}

pub struct Backend {
    stations: Vec<Station>,
    users: Vec<User>,
    sessions: HashMap<String, i64>,
    cards: Vec<Card>,
    transactions: Vec<(NaiveDateTime, Transaction)>,
    open_journeys: HashMap<i64, OpenJourney>,
    next_id: i64,
}

impl Default for Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend {
    pub fn new() -> Self {
        let stations = [
            (1, "Victoria", 1),
            (2, "Oxford Circus", 1),
            (3, "King's Cross St. Pancras", 1),
            (4, "Camden Town", 2),
            (5, "Brixton", 2),
            (6, "Wimbledon", 3),
            (7, "Stratford", 3),
            (8, "Ealing Broadway", 3),
            (9, "Wembley Park", 4),
            (10, "Heathrow Terminals 2 & 3", 6),
        ]
        .into_iter()
        .map(|(id, name, zone)| Station {
            id,
            name: name.to_string(),
            zone,
        })
        .collect();

        Self {
            stations,
            users: Vec::new(),
            sessions: HashMap::new(),
            cards: Vec::new(),
            transactions: Vec::new(),
            open_journeys: HashMap::new(),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn stations(&self) -> Vec<Station> {
        self.stations.clone()
    }

    // --- users and sessions ---

    pub fn register(&mut self, input: NewUser) -> Result<UserView, ApiFailure> {
        let fields = [&input.first_name, &input.last_name, &input.email, &input.password];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(ApiFailure::bad_request("All fields are required"));
        }
        if self
            .users
            .iter()
            .any(|u| u.view.email.eq_ignore_ascii_case(&input.email))
        {
            return Err(ApiFailure::conflict("Email already registered"));
        }
        let view = UserView {
            id: self.allocate_id(),
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
        };
        self.users.push(User {
            view: view.clone(),
            password: input.password,
        });
        Ok(view)
    }

    /// Returns a fresh session token.
    pub fn login(&mut self, email: &str, password: &str) -> Result<String, ApiFailure> {
        let user_id = self
            .users
            .iter()
            .find(|u| u.view.email.eq_ignore_ascii_case(email) && u.password == password)
            .map(|u| u.view.id)
            .ok_or_else(|| {
                ApiFailure::new(
                    axum::http::StatusCode::UNAUTHORIZED,
                    "Invalid email or password",
                )
            })?;
        let token = uuid::Uuid::new_v4().to_string();
        self.sessions.insert(token.clone(), user_id);
        Ok(token)
    }

    pub fn session_user(&self, token: Option<&str>) -> Result<i64, ApiFailure> {
        token
            .and_then(|t| self.sessions.get(t).copied())
            .ok_or_else(ApiFailure::unauthorized)
    }

    // --- cards ---

    pub fn cards_of(&self, user_id: i64) -> Vec<Card> {
        self.cards
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn issue_card(&mut self, user_id: i64) -> Card {
        let mut number = FIRST_CARD_NUMBER;
        while self.cards.iter().any(|c| c.card_number == number) {
            number += 1;
        }
        self.insert_card(user_id, number)
    }

    pub fn register_card(&mut self, user_id: i64, card_number: i64) -> Result<Card, ApiFailure> {
        if card_number <= 0 {
            return Err(ApiFailure::bad_request("Invalid card number"));
        }
        match self.cards.iter().find(|c| c.card_number == card_number) {
            Some(card) if card.user_id == user_id => {
                Err(ApiFailure::conflict("Card is already registered to this account"))
            }
            Some(_) => Err(ApiFailure::conflict("Card is registered to another account")),
            None => Ok(self.insert_card(user_id, card_number)),
        }
    }

    fn insert_card(&mut self, user_id: i64, card_number: i64) -> Card {
        let card = Card {
            id: self.allocate_id(),
            card_number,
            user_id,
            issued_at: timestamp(now()),
            balance: Decimal::ZERO,
            is_active: true,
        };
        self.cards.push(card.clone());
        card
    }

    fn owned_card(&mut self, user_id: i64, card_number: i64) -> Result<&mut Card, ApiFailure> {
        self.cards
            .iter_mut()
            .find(|c| c.card_number == card_number && c.user_id == user_id)
            .ok_or_else(|| ApiFailure::not_found(format!("Card {card_number} not found")))
    }

    fn active_card(&mut self, user_id: i64, card_number: i64) -> Result<&mut Card, ApiFailure> {
        let card = self.owned_card(user_id, card_number)?;
        if !card.is_active {
            return Err(ApiFailure::bad_request("Card is blocked"));
        }
        Ok(card)
    }

    pub fn block_card(&mut self, user_id: i64, card_number: i64) -> Result<(), ApiFailure> {
        self.owned_card(user_id, card_number)?.is_active = false;
        self.open_journeys.remove(&card_number);
        Ok(())
    }

    pub fn top_up(&mut self, user_id: i64, card_number: i64, amount: Decimal) -> Result<(), ApiFailure> {
        if amount <= Decimal::ZERO {
            return Err(ApiFailure::bad_request("Top-up amount must be positive"));
        }
        let card = self.active_card(user_id, card_number)?;
        card.balance += amount;
        let card_id = card.id;

        let at = now();
        let tx = Transaction {
            id: self.allocate_id(),
            card_id,
            card_number,
            transaction_type: TransactionType::TopUp,
            start_station: None,
            end_station: None,
            fare: None,
            top_up_amount: Some(amount),
            start_at: timestamp(at),
            end_at: None,
        };
        self.transactions.push((at, tx));
        Ok(())
    }

    // --- journeys ---

    fn known_station(&self, station: &Station) -> Result<Station, ApiFailure> {
        self.stations
            .iter()
            .find(|s| s.id == station.id)
            .cloned()
            .ok_or_else(|| ApiFailure::not_found(format!("Station {} not found", station.id)))
    }

    pub fn tap_in(&mut self, user_id: i64, card_number: i64, station: &Station) -> Result<Transaction, ApiFailure> {
        let station = self.known_station(station)?;
        let card_id = self.active_card(user_id, card_number)?.id;
        if self.open_journeys.contains_key(&card_number) {
            return Err(ApiFailure::conflict("Card is already tapped in"));
        }

        let at = now();
        let tx = Transaction {
            id: self.allocate_id(),
            card_id,
            card_number,
            transaction_type: TransactionType::Charge,
            start_station: Some(station.clone()),
            end_station: None,
            fare: Some(Decimal::ZERO),
            top_up_amount: None,
            start_at: timestamp(at),
            end_at: None,
        };
        self.open_journeys
            .insert(card_number, OpenJourney { station, started: at });
        self.transactions.push((at, tx.clone()));
        Ok(tx)
    }

    pub fn tap_out(&mut self, user_id: i64, card_number: i64, station: &Station) -> Result<Transaction, ApiFailure> {
        let station = self.known_station(station)?;
        let card_id = self.active_card(user_id, card_number)?.id;

        let (origin, started, fare) = match self.open_journeys.remove(&card_number) {
            Some(journey) => {
                let fare = zone_fare(&journey.station, &station);
                (journey.station, journey.started, fare)
            }
            None => (station.clone(), now(), maximum_fare()),
        };
        self.active_card(user_id, card_number)?.balance -= fare;

        let ended = now();
        let tx = Transaction {
            id: self.allocate_id(),
            card_id,
            card_number,
            transaction_type: TransactionType::Charge,
            start_station: Some(origin),
            end_station: Some(station),
            fare: Some(fare),
            top_up_amount: None,
            start_at: timestamp(started),
            end_at: Some(timestamp(ended)),
        };
        self.transactions.push((started, tx.clone()));
        Ok(tx)
    }

    // --- history ---

    fn owns_card(&self, user_id: i64, card_number: i64) -> bool {
        self.cards
            .iter()
            .any(|c| c.card_number == card_number && c.user_id == user_id)
    }

    pub fn transaction(&self, user_id: i64, id: i64) -> Result<Transaction, ApiFailure> {
        self.transactions
            .iter()
            .map(|(_, tx)| tx)
            .find(|tx| tx.id == id && self.owns_card(user_id, tx.card_number))
            .cloned()
            .ok_or_else(|| ApiFailure::not_found(format!("Transaction {id} not found")))
    }

    /// Newest first, filtered by inclusive start time bounds.
    pub fn history(
        &self,
        user_id: i64,
        card_number: i64,
        page: u32,
        size: u32,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Page<Transaction>, ApiFailure> {
        if !self.owns_card(user_id, card_number) {
            return Err(ApiFailure::not_found(format!("Card {card_number} not found")));
        }
        if size == 0 {
            return Err(ApiFailure::bad_request("Page size must be at least 1"));
        }

        let mut matching: Vec<&Transaction> = self
            .transactions
            .iter()
            .filter(|(at, tx)| {
                tx.card_number == card_number
                    && start.is_none_or(|s| *at >= s)
                    && end.is_none_or(|e| *at <= e)
            })
            .map(|(_, tx)| tx)
            .collect();
        matching.sort_by(|a, b| b.id.cmp(&a.id));

        let total = matching.len() as u64;
        let content = matching
            .into_iter()
            .skip(page as usize * size as usize)
            .take(size as usize)
            .cloned()
            .collect();
        Ok(Page {
            content,
            total_pages: total.div_ceil(u64::from(size)) as u32,
            total_elements: total,
            size,
            number: page,
        })
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDateTime, ApiFailure> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map_err(|_| ApiFailure::bad_request(format!("Invalid date {raw:?}, expected yyyy-MM-ddTHH:mm:ss")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station(id: i64, zone: i32) -> Station {
        Station {
            id,
            name: format!("S{id}"),
            zone,
        }
    }

    fn backend_with_card() -> (Backend, i64, i64) {
        let mut backend = Backend::new();
        let user = backend
            .register(NewUser {
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                email: "ada@example.com".into(),
                password: "secret".into(),
            })
            .unwrap();
        let card = backend.issue_card(user.id);
        (backend, user.id, card.card_number)
    }

    #[test]
    fn zone_fare_grows_with_zones_crossed() {
        assert_eq!(zone_fare(&station(1, 1), &station(2, 1)), Decimal::new(240, 2));
        assert_eq!(zone_fare(&station(1, 1), &station(6, 3)), Decimal::new(400, 2));
        assert_eq!(zone_fare(&station(6, 3), &station(1, 1)), Decimal::new(400, 2));
    }

    #[test]
    fn issued_card_numbers_are_sequential() {
        let (mut backend, user, first) = backend_with_card();
        let second = backend.issue_card(user).card_number;
        assert_eq!(first, FIRST_CARD_NUMBER);
        assert_eq!(second, FIRST_CARD_NUMBER + 1);
    }

    #[test]
    fn tap_out_without_tap_in_charges_maximum() {
        let (mut backend, user, card) = backend_with_card();
        let tx = backend.tap_out(user, card, &station(1, 1)).unwrap();
        assert_eq!(tx.fare, Some(maximum_fare()));
        assert_eq!(backend.cards_of(user)[0].balance, -maximum_fare());
    }

    #[test]
    fn second_tap_in_conflicts() {
        let (mut backend, user, card) = backend_with_card();
        backend.tap_in(user, card, &station(1, 1)).unwrap();
        let err = backend.tap_in(user, card, &station(2, 1)).unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::CONFLICT);
    }

    #[test]
    fn blocked_card_rejects_top_up() {
        let (mut backend, user, card) = backend_with_card();
        backend.block_card(user, card).unwrap();
        backend.block_card(user, card).unwrap();
        let err = backend.top_up(user, card, Decimal::ONE).unwrap_err();
        assert_eq!(err.message, "Card is blocked");
    }

    #[test]
    fn history_pages_newest_first() {
        let (mut backend, user, card) = backend_with_card();
        for _ in 0..5 {
            backend.top_up(user, card, Decimal::ONE).unwrap();
        }
        let page = backend.history(user, card, 0, 2, None, None).unwrap();
        assert_eq!(page.total_elements, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.content.len(), 2);
        assert!(page.content[0].id > page.content[1].id);

        let last = backend.history(user, card, 2, 2, None, None).unwrap();
        assert_eq!(last.content.len(), 1);
    }

    #[test]
    fn history_of_foreign_card_is_not_found() {
        let (backend, _, card) = backend_with_card();
        let err = backend.history(999, card, 0, 10, None, None).unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::NOT_FOUND);
    }
}
