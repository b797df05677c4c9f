//! Authenticated request pipeline.
//!
//! # Architecture
//!
//! - One `reqwest::Client` per [`SessionClient`]; handles are cheap clones
//!   over shared internals
//! - Credential expiry is invisible to callers: a 401 on an authenticated
//!   request triggers one refresh and one retry, nothing else
//! - The refresh itself is single-flight: concurrent failures queue behind
//!   the one in-flight call and are resumed in arrival order
//! - All credential mutation goes through the injected [`CredentialStore`];
//!   there is no ambient global state
//!
//! # Example
//!
//! ```rust,ignore
//! let session = SessionClient::new(&config, Arc::new(MemoryCredentialStore::new()));
//! let mut events = session.subscribe();
//!
//! let cart: CartPayload = session.get("/cart/", Auth::Bearer).await?;
//! ```

mod refresh;
mod store;

pub use store::{CredentialPair, CredentialStore, FileCredentialStore, MemoryCredentialStore};

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use marbelle_core::UserProfile;

use crate::api::{Envelope, Page, Pagination, RefreshData, RefreshRequest};
use crate::config::ClientConfig;
use crate::error::ApiError;

use refresh::{RefreshGate, RefreshResult, RefreshTicket, SessionExpired};

/// The HTTP header used for request correlation.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// The HTTP header carrying the guest session ID on cart endpoints.
pub const GUEST_SESSION_HEADER: &str = "X-Session-ID";

const REFRESH_PATH: &str = "/auth/refresh/";

/// How an outbound request authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    /// Attach `Authorization: Bearer <access>` when a pair is stored and
    /// refresh transparently on a 401.
    Bearer,
    /// Never attach credentials; a 401 is surfaced as-is.
    None,
}

/// Session lifecycle events observable by the rest of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The credential pair could not be refreshed; the session is over and
    /// the user must log in again.
    Expired,
}

/// Client for the Marbelle backend API.
///
/// Wraps `reqwest` with bearer-credential injection, envelope decoding, and
/// transparent single-flight credential refresh.
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<SessionClientInner>,
}

struct SessionClientInner {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    store: Arc<dyn CredentialStore>,
    refresh_gate: RefreshGate,
    events: broadcast::Sender<SessionEvent>,
    guest_session: Mutex<Option<String>>,
}

impl SessionClient {
    /// Create a new session client.
    ///
    /// The credential store is injected so callers control persistence and
    /// tests can observe every token mutation.
    #[must_use]
    pub fn new(config: &ClientConfig, store: Arc<dyn CredentialStore>) -> Self {
        let (events, _) = broadcast::channel(16);

        Self {
            inner: Arc::new(SessionClientInner {
                http: reqwest::Client::new(),
                base_url: config.base_url.as_str().trim_end_matches('/').to_owned(),
                timeout: config.timeout,
                store,
                refresh_gate: RefreshGate::new(),
                events,
                guest_session: Mutex::new(None),
            }),
        }
    }

    /// Build a client with the store the configuration implies: a
    /// [`FileCredentialStore`] at `credentials_path` when set, otherwise a
    /// process-lifetime [`MemoryCredentialStore`].
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        let store: Arc<dyn CredentialStore> = match &config.credentials_path {
            Some(path) => Arc::new(FileCredentialStore::open(path)),
            None => Arc::new(MemoryCredentialStore::new()),
        };
        Self::new(config, store)
    }

    // =========================================================================
    // Credential Store Operations
    // =========================================================================

    /// True when a credential pair is stored.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.store.credentials().is_some()
    }

    /// Store a freshly issued credential pair.
    pub fn store_tokens(&self, pair: CredentialPair) {
        self.inner.store.set_credentials(pair);
    }

    /// The stored pair, for services that need the refresh token (logout).
    pub(crate) fn credentials(&self) -> Option<CredentialPair> {
        self.inner.store.credentials()
    }

    /// Cache the signed-in user's profile next to the tokens.
    pub fn store_profile(&self, profile: UserProfile) {
        self.inner.store.set_profile(profile);
    }

    /// The cached profile, if any.
    #[must_use]
    pub fn cached_profile(&self) -> Option<UserProfile> {
        self.inner.store.profile()
    }

    /// Clear all stored session state: tokens, profile, guest session.
    pub fn clear_tokens(&self) {
        self.inner.store.clear();
        *self.guest_session_lock() = None;
    }

    /// Subscribe to session lifecycle events.
    ///
    /// [`SessionEvent::Expired`] fires exactly once per terminal refresh
    /// failure, so authentication-aware UI can react without this layer
    /// knowing about it.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    // =========================================================================
    // Typed Requests
    // =========================================================================

    /// `GET` a typed payload.
    ///
    /// # Errors
    ///
    /// Fails with one of the [`ApiError`] variants; see the crate docs for
    /// the taxonomy.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, auth: Auth) -> Result<T, ApiError> {
        let (data, _) = self.execute(Method::GET, path, None, auth).await?;
        Ok(serde_json::from_value(data)?)
    }

    /// `GET` a paginated list.
    ///
    /// # Errors
    ///
    /// Fails with one of the [`ApiError`] variants.
    pub async fn get_paged<T: DeserializeOwned>(
        &self,
        path: &str,
        auth: Auth,
    ) -> Result<Page<T>, ApiError> {
        let (data, pagination) = self.execute(Method::GET, path, None, auth).await?;
        let results: Vec<T> = serde_json::from_value(data)?;
        Ok(match pagination {
            Some(Pagination {
                count,
                next,
                previous,
            }) => Page {
                results,
                count,
                next,
                previous,
            },
            None => Page {
                count: u64::try_from(results.len()).unwrap_or_default(),
                results,
                next: None,
                previous: None,
            },
        })
    }

    /// `POST` a body and decode a typed payload.
    ///
    /// # Errors
    ///
    /// Fails with one of the [`ApiError`] variants.
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        auth: Auth,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body)?;
        let (data, _) = self.execute(Method::POST, path, Some(body), auth).await?;
        Ok(serde_json::from_value(data)?)
    }

    /// `PUT` a body and decode a typed payload.
    ///
    /// # Errors
    ///
    /// Fails with one of the [`ApiError`] variants.
    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        auth: Auth,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body)?;
        let (data, _) = self.execute(Method::PUT, path, Some(body), auth).await?;
        Ok(serde_json::from_value(data)?)
    }

    /// `PATCH` a body and decode a typed payload.
    ///
    /// # Errors
    ///
    /// Fails with one of the [`ApiError`] variants.
    pub async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        auth: Auth,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body)?;
        let (data, _) = self.execute(Method::PATCH, path, Some(body), auth).await?;
        Ok(serde_json::from_value(data)?)
    }

    /// `DELETE` and decode a typed payload.
    ///
    /// # Errors
    ///
    /// Fails with one of the [`ApiError`] variants.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str, auth: Auth) -> Result<T, ApiError> {
        let (data, _) = self.execute(Method::DELETE, path, None, auth).await?;
        Ok(serde_json::from_value(data)?)
    }

    // =========================================================================
    // Request Pipeline
    // =========================================================================

    /// Dispatch a request, transparently refreshing credentials on a 401.
    ///
    /// A request is retried at most once per call, so a backend that keeps
    /// answering 401 cannot loop the client.
    #[instrument(skip(self, body), fields(method = %method, path))]
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        auth: Auth,
    ) -> Result<(Value, Option<Pagination>), ApiError> {
        let mut token = match auth {
            Auth::Bearer => self
                .inner
                .store
                .credentials()
                .map(|pair| pair.access_token().to_owned()),
            Auth::None => None,
        };
        let mut retried = false;

        loop {
            let response = self
                .dispatch(method.clone(), path, body.as_ref(), token.as_deref())
                .await?;

            let guest = response
                .headers()
                .get(GUEST_SESSION_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(String::from);
            self.record_guest_session(guest);

            if response.status() == StatusCode::UNAUTHORIZED
                && !retried
                && let Some(sent) = token.clone()
            {
                retried = true;
                // Another request may have swapped the pair while this one
                // was in flight; only refresh when our token is current.
                let stored = self
                    .inner
                    .store
                    .credentials()
                    .map(|pair| pair.access_token().to_owned());
                token = match stored {
                    Some(current) if current != sent => {
                        debug!("credentials already rotated, retrying with stored token");
                        Some(current)
                    }
                    _ => Some(self.refresh_access_token().await?),
                };
                continue;
            }

            return Self::decode(response).await;
        }
    }

    /// Build and send one HTTP attempt.
    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ApiError> {
        let request_id = Uuid::new_v4();
        debug!(%request_id, "dispatching request");

        let mut request = self
            .inner
            .http
            .request(method, self.endpoint(path))
            .timeout(self.inner.timeout)
            .header(REQUEST_ID_HEADER, request_id.to_string());

        if let Some(token) = token {
            request = request.bearer_auth(token);
        } else if let Some(guest) = self.guest_session_lock().clone() {
            request = request.header(GUEST_SESSION_HEADER, guest);
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        Ok(request.send().await?)
    }

    /// Decode a response into envelope `data` (+ pagination, when present).
    ///
    /// Precedence: 401 -> `Unauthorized`, 5xx -> `Server`, then the envelope
    /// decides; `success: false` is a `Validation` error even on HTTP 200.
    async fn decode(response: reqwest::Response) -> Result<(Value, Option<Pagination>), ApiError> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        if status.is_server_error() {
            return Err(ApiError::Server {
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        let envelope: Envelope = serde_json::from_str(&text)?;

        if !envelope.success {
            return Err(ApiError::validation(envelope.message, envelope.errors));
        }

        Ok((
            envelope.data.unwrap_or(Value::Null),
            envelope.pagination,
        ))
    }

    // =========================================================================
    // Credential Refresh
    // =========================================================================

    /// Get a usable access token after a 401, refreshing at most once across
    /// all concurrent callers.
    async fn refresh_access_token(&self) -> Result<String, ApiError> {
        match self.inner.refresh_gate.acquire() {
            RefreshTicket::Follower(rx) => {
                debug!("refresh already in flight, queueing request");
                rx.await
                    .map_err(|_| ApiError::Unauthorized)?
                    .map_err(|SessionExpired| ApiError::Unauthorized)
            }
            RefreshTicket::Leader => {
                let result = self.perform_refresh().await;
                self.inner.refresh_gate.complete(&result);
                result.map_err(|SessionExpired| ApiError::Unauthorized)
            }
        }
    }

    /// The one refresh call. Success swaps the stored pair atomically; any
    /// failure is terminal: stored credentials are cleared and the expiry
    /// event is broadcast.
    async fn perform_refresh(&self) -> RefreshResult {
        let Some(pair) = self.inner.store.credentials() else {
            debug!("no stored credentials to refresh");
            return Err(SessionExpired);
        };

        match self.call_refresh_endpoint(pair.refresh_token()).await {
            Ok(data) => {
                self.inner
                    .store
                    .set_credentials(CredentialPair::new(data.access.clone(), data.refresh));
                info!("credential refresh succeeded");
                Ok(data.access)
            }
            Err(error) => {
                warn!(%error, "credential refresh failed, ending session");
                self.inner.store.clear();
                // Nobody listening is fine; the send result is irrelevant.
                let _ = self.inner.events.send(SessionEvent::Expired);
                Err(SessionExpired)
            }
        }
    }

    /// Call `POST /auth/refresh/` with the stored refresh token.
    ///
    /// Unauthenticated and never retried: a failing refresh ends the session.
    async fn call_refresh_endpoint(&self, refresh_token: &str) -> Result<RefreshData, ApiError> {
        let request_id = Uuid::new_v4();
        let response = self
            .inner
            .http
            .post(self.endpoint(REFRESH_PATH))
            .timeout(self.inner.timeout)
            .header(REQUEST_ID_HEADER, request_id.to_string())
            .json(&RefreshRequest {
                refresh: refresh_token,
            })
            .send()
            .await?;

        let (data, _) = Self::decode(response).await?;
        Ok(serde_json::from_value(data)?)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.inner.base_url, path)
    }

    fn record_guest_session(&self, header: Option<String>) {
        if let Some(session_id) = header {
            *self.guest_session_lock() = Some(session_id);
        }
    }

    fn guest_session_lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.inner
            .guest_session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
