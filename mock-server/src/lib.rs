//! In-memory stand-in for the Oyster transit backend.
//!
//! Serves the REST contract under `/api` (and `/login` at the root, where the
//! production deployment puts it). Sessions are tracked with a `SESSION`
//! cookie issued by login; every card and transaction route requires it.

pub mod error;
pub mod state;

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Form, Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;

pub use error::ApiFailure;
pub use state::{Backend, Card, NewUser, Page, Station, Transaction, TransactionType, UserView};

pub const SESSION_COOKIE: &str = "SESSION";

pub type Db = Arc<RwLock<Backend>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Backend::new()));
    let api = Router::new()
        .route("/stations/", get(list_stations))
        .route("/cards/", get(list_cards).post(issue_card))
        .route("/cards/number/{card_number}", post(register_card))
        .route("/cards/block/{card_number}", put(block_card))
        .route("/cards/{card_number}", put(top_up))
        .route("/transactions/{id}", get(get_transaction))
        .route("/transactions/{id}/tapIn", post(tap_in))
        .route("/transactions/{id}/tapOut", post(tap_out))
        .route("/transactions/card/{card_number}", get(history))
        .route("/users/", post(register_user))
        .route("/login", post(login));

    Router::new()
        .nest("/api", api)
        .route("/login", post(login))
        .layer(TraceLayer::new_for_http())
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Extract the session token from the `Cookie` header(s).
fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
}

async fn current_user(db: &Db, headers: &HeaderMap) -> Result<i64, ApiFailure> {
    db.read().await.session_user(session_token(headers))
}

async fn list_stations(State(db): State<Db>) -> Json<Vec<Station>> {
    Json(db.read().await.stations())
}

async fn list_cards(
    State(db): State<Db>,
    headers: HeaderMap,
) -> Result<Json<Vec<Card>>, ApiFailure> {
    let user = current_user(&db, &headers).await?;
    Ok(Json(db.read().await.cards_of(user)))
}

async fn issue_card(State(db): State<Db>, headers: HeaderMap) -> Result<Json<Card>, ApiFailure> {
    let user = current_user(&db, &headers).await?;
    let card = db.write().await.issue_card(user);
    tracing::info!("Issued card {} to user {user}", card.card_number);
    Ok(Json(card))
}

async fn register_card(
    State(db): State<Db>,
    Path(card_number): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Card>, ApiFailure> {
    let user = current_user(&db, &headers).await?;
    let card = db.write().await.register_card(user, card_number)?;
    Ok(Json(card))
}

async fn block_card(
    State(db): State<Db>,
    Path(card_number): Path<i64>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiFailure> {
    let user = current_user(&db, &headers).await?;
    db.write().await.block_card(user, card_number)?;
    tracing::info!("Blocked card {card_number}");
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
struct TopUpParams {
    amount: Decimal,
}

async fn top_up(
    State(db): State<Db>,
    Path(card_number): Path<i64>,
    Query(params): Query<TopUpParams>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiFailure> {
    let user = current_user(&db, &headers).await?;
    db.write().await.top_up(user, card_number, params.amount)?;
    Ok(StatusCode::OK)
}

async fn tap_in(
    State(db): State<Db>,
    Path(card_number): Path<i64>,
    headers: HeaderMap,
    Json(station): Json<Station>,
) -> Result<Json<Transaction>, ApiFailure> {
    let user = current_user(&db, &headers).await?;
    let tx = db.write().await.tap_in(user, card_number, &station)?;
    Ok(Json(tx))
}

async fn tap_out(
    State(db): State<Db>,
    Path(card_number): Path<i64>,
    headers: HeaderMap,
    Json(station): Json<Station>,
) -> Result<Json<Transaction>, ApiFailure> {
    let user = current_user(&db, &headers).await?;
    let tx = db.write().await.tap_out(user, card_number, &station)?;
    tracing::debug!("Card {card_number} tapped out at {}, fare {:?}", station.name, tx.fare);
    Ok(Json(tx))
}

async fn get_transaction(
    State(db): State<Db>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Transaction>, ApiFailure> {
    let user = current_user(&db, &headers).await?;
    Ok(Json(db.read().await.transaction(user, id)?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryParams {
    page: Option<u32>,
    size: Option<u32>,
    start_date: Option<String>,
    end_date: Option<String>,
}

async fn history(
    State(db): State<Db>,
    Path(card_number): Path<i64>,
    Query(params): Query<HistoryParams>,
    headers: HeaderMap,
) -> Result<Json<Page<Transaction>>, ApiFailure> {
    let user = current_user(&db, &headers).await?;
    let start = params.start_date.as_deref().map(state::parse_date).transpose()?;
    let end = params.end_date.as_deref().map(state::parse_date).transpose()?;
    let page = db.read().await.history(
        user,
        card_number,
        params.page.unwrap_or(0),
        params.size.unwrap_or(10),
        start,
        end,
    )?;
    Ok(Json(page))
}

async fn register_user(
    State(db): State<Db>,
    Json(input): Json<NewUser>,
) -> Result<Json<UserView>, ApiFailure> {
    let user = db.write().await.register(input)?;
    tracing::info!("Registered user {}", user.id);
    Ok(Json(user))
}

#[derive(Deserialize)]
struct LoginForm {
    email: String,
    password: String,
}

async fn login(
    State(db): State<Db>,
    Form(form): Form<LoginForm>,
) -> Result<impl IntoResponse, ApiFailure> {
    let token = db.write().await.login(&form.email, &form.password)?;
    let cookie = format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly");
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn session_token_found_among_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; SESSION=abc-123; lang=en"),
        );
        assert_eq!(session_token(&headers), Some("abc-123"));
    }

    #[test]
    fn session_token_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(session_token(&headers), None);
        assert_eq!(session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn card_serializes_balance_as_number() {
        let card = Card {
            id: 1,
            card_number: 12345678,
            user_id: 9,
            issued_at: "2024-01-01T00:00:00".to_string(),
            balance: Decimal::new(1250, 2),
            is_active: true,
        };
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["balance"], 12.5);
        assert_eq!(json["cardNumber"], 12345678);
        assert_eq!(json["isActive"], true);
    }

    #[test]
    fn transaction_serializes_missing_amounts_as_null() {
        let tx = Transaction {
            id: 1,
            card_id: 1,
            card_number: 1,
            transaction_type: TransactionType::TopUp,
            start_station: None,
            end_station: None,
            fare: None,
            top_up_amount: Some(Decimal::new(20, 0)),
            start_at: "2024-01-01T00:00:00".to_string(),
            end_at: None,
        };
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["transactionType"], "TOP_UP");
        assert!(json["fare"].is_null());
        assert_eq!(json["topUpAmount"], 20.0);
    }
}
