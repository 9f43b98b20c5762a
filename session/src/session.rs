//! `SessionClient`: the async operations plus the selected-card preference.

use std::fmt;
use std::sync::Arc;

use oyster_core::{
    Card, ClientError, Credentials, HttpRequest, HttpResponse, NewUser, OysterClient, Page,
    Station, Transaction, TransactionQuery,
};
use rust_decimal::Decimal;

use crate::config::SessionConfig;
use crate::store::{FileStore, MemoryStore, PreferenceStore, StoreError};
use crate::transport::{ReqwestTransport, Transport};

/// Preference key holding the JSON of the currently selected card.
pub const SELECTED_CARD_KEY: &str = "selectedCard";

/// Async façade over the Oyster API for one user.
///
/// Each operation builds a request with `OysterClient`, runs it through the
/// `Transport` and parses the response. Clones share the transport (and so
/// the login cookie) and the preference store; a `SessionClient` can be moved
/// into spawned tasks and called concurrently.
#[derive(Clone)]
pub struct SessionClient {
    api: OysterClient,
    transport: Arc<dyn Transport>,
    store: Arc<dyn PreferenceStore>,
}

impl fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionClient")
            .field("base_url", &self.api.base_url())
            .finish_non_exhaustive()
    }
}

impl SessionClient {
    /// A session over `reqwest`, with preferences in `config.preferences_path`
    /// or in memory when unset.
    pub fn new(config: &SessionConfig) -> Result<Self, ClientError> {
        let transport = Arc::new(ReqwestTransport::new(config)?);
        let store: Arc<dyn PreferenceStore> = match &config.preferences_path {
            Some(path) => Arc::new(FileStore::new(path)),
            None => Arc::new(MemoryStore::new()),
        };
        tracing::debug!("Oyster session for {}", config.base_url);
        Ok(Self::with_parts(
            OysterClient::new(&config.base_url),
            transport,
            store,
        ))
    }

    pub fn with_parts(
        api: OysterClient,
        transport: Arc<dyn Transport>,
        store: Arc<dyn PreferenceStore>,
    ) -> Self {
        Self {
            api,
            transport,
            store,
        }
    }

    pub fn api(&self) -> &OysterClient {
        &self.api
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        let method = request.method.as_str();
        let url = request.url.clone();
        tracing::debug!("{method} {url}");
        match self.transport.execute(request).await {
            Ok(response) => {
                if response.is_error() {
                    tracing::warn!("{method} {url} -> {}", response.status);
                } else {
                    tracing::debug!("{method} {url} -> {}", response.status);
                }
                Ok(response)
            }
            Err(e) => {
                tracing::warn!("{method} {url} failed: {e}");
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Stations and cards
    // -----------------------------------------------------------------------

    pub async fn list_stations(&self) -> Result<Vec<Station>, ClientError> {
        let request = self.api.build_list_stations()?;
        self.api.parse_list_stations(self.send(request).await?)
    }

    pub async fn list_cards(&self) -> Result<Vec<Card>, ClientError> {
        let request = self.api.build_list_cards()?;
        self.api.parse_list_cards(self.send(request).await?)
    }

    /// Issue a fresh card and make it the selected card.
    pub async fn register_new_card(&self) -> Result<Card, ClientError> {
        let request = self.api.build_register_new_card()?;
        let card = self.api.parse_register_new_card(self.send(request).await?)?;
        self.remember(&card);
        Ok(card)
    }

    /// Attach an existing physical card and make it the selected card.
    pub async fn register_existing_card(&self, card_number: i64) -> Result<Card, ClientError> {
        let request = self.api.build_register_existing_card(card_number)?;
        let card = self
            .api
            .parse_register_existing_card(self.send(request).await?)?;
        self.remember(&card);
        Ok(card)
    }

    pub async fn block_card(&self, card_number: i64) -> Result<(), ClientError> {
        let request = self.api.build_block_card(card_number)?;
        self.api.parse_block_card(self.send(request).await?)
    }

    /// Rejected locally, without a request, unless `amount` is positive.
    pub async fn top_up(&self, card_number: i64, amount: Decimal) -> Result<(), ClientError> {
        let request = self.api.build_top_up(card_number, amount)?;
        self.api.parse_top_up(self.send(request).await?)
    }

    // -----------------------------------------------------------------------
    // Journeys
    // -----------------------------------------------------------------------

    pub async fn tap_in(&self, card_number: i64, station: &Station) -> Result<Transaction, ClientError> {
        let request = self.api.build_tap_in(card_number, station)?;
        let tx = self.api.parse_tap_in(self.send(request).await?)?;
        check_consistency(&tx);
        Ok(tx)
    }

    pub async fn tap_out(&self, card_number: i64, station: &Station) -> Result<Transaction, ClientError> {
        let request = self.api.build_tap_out(card_number, station)?;
        let tx = self.api.parse_tap_out(self.send(request).await?)?;
        check_consistency(&tx);
        Ok(tx)
    }

    pub async fn get_transaction(&self, id: i64) -> Result<Transaction, ClientError> {
        let request = self.api.build_get_transaction(id)?;
        let tx = self.api.parse_get_transaction(self.send(request).await?)?;
        check_consistency(&tx);
        Ok(tx)
    }

    pub async fn list_transactions(
        &self,
        card_number: i64,
        query: &TransactionQuery,
    ) -> Result<Page<Transaction>, ClientError> {
        let request = self.api.build_list_transactions(card_number, query)?;
        let page = self
            .api
            .parse_list_transactions(self.send(request).await?)?;
        page.content.iter().for_each(check_consistency);
        Ok(page)
    }

    // -----------------------------------------------------------------------
    // Account
    // -----------------------------------------------------------------------

    pub async fn register(&self, user: &NewUser) -> Result<(), ClientError> {
        let request = self.api.build_register(user)?;
        self.api.parse_register(self.send(request).await?)?;
        tracing::debug!("Registered a new account");
        Ok(())
    }

    /// Log in. On success the previous user's selected card is forgotten; on
    /// failure it is left untouched.
    pub async fn login(&self, credentials: &Credentials) -> Result<(), ClientError> {
        let request = self.api.build_login(credentials)?;
        self.api.parse_login(self.send(request).await?)?;
        tracing::debug!("Logged in");
        if let Err(e) = self.store.clear(SELECTED_CARD_KEY) {
            tracing::warn!("Could not clear the selected card after login: {e}");
        }
        Ok(())
    }

    /// Local only: forgets the selected card. The server session is not
    /// invalidated.
    pub fn logout(&self) -> Result<(), StoreError> {
        tracing::info!("Logged out");
        self.store.clear(SELECTED_CARD_KEY)
    }

    // -----------------------------------------------------------------------
    // Selected card
    // -----------------------------------------------------------------------

    /// The selected card, or `None` when nothing is stored or the stored value
    /// cannot be read back.
    pub fn selected_card(&self) -> Option<Card> {
        let raw = match self.store.get(SELECTED_CARD_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Could not read the selected card: {e}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(card) => Some(card),
            Err(e) => {
                tracing::warn!("Ignoring unreadable selected card: {e}");
                None
            }
        }
    }

    pub fn set_selected_card(&self, card: &Card) -> Result<(), StoreError> {
        let raw = serde_json::to_string(card)?;
        self.store.set(SELECTED_CARD_KEY, &raw)
    }

    fn remember(&self, card: &Card) {
        match self.set_selected_card(card) {
            Ok(()) => tracing::debug!("Selected card {}", card.card_number),
            Err(e) => tracing::warn!("Could not store card {} as selected: {e}", card.card_number),
        }
    }
}

fn check_consistency(tx: &Transaction) {
    if !tx.is_consistent() {
        tracing::warn!(
            "Transaction {} ({:?}) has inconsistent amounts",
            tx.id,
            tx.transaction_type
        );
    }
}
