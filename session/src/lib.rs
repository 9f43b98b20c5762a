//! Async session for the Oyster transit-card API.
//!
//! Wraps the sans-IO `oyster_core::OysterClient` with an HTTP transport, a
//! cookie-carrying login and a small preference store for the card the user
//! is currently working with.
//!
//! ```no_run
//! use oyster_session::{SessionClient, SessionConfig};
//! use oyster_core::Credentials;
//!
//! # async fn demo() -> Result<(), oyster_core::ClientError> {
//! let session = SessionClient::new(&SessionConfig::from_env())?;
//! session
//!     .login(&Credentials {
//!         email: "ada@example.com".into(),
//!         password: "secret".into(),
//!     })
//!     .await?;
//! let card = session.register_new_card().await?;
//! assert_eq!(session.selected_card(), Some(card));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod session;
pub mod store;
pub mod transport;

pub use config::SessionConfig;
pub use session::{SessionClient, SELECTED_CARD_KEY};
pub use store::{FileStore, MemoryStore, PreferenceStore, StoreError};
pub use transport::{ReqwestTransport, Transport};
