//! Credential persistence.
//!
//! The store is the single place token material lives. Both tokens travel
//! together in a [`CredentialPair`], so a swap or a clear can never leave
//! one token behind without the other.

use core::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use marbelle_core::UserProfile;

// =============================================================================
// CredentialPair
// =============================================================================

/// The access/refresh token pair representing an authenticated session.
///
/// Created on login, replaced as a unit on refresh, dropped as a unit on
/// logout or terminal refresh failure.
#[derive(Clone)]
pub struct CredentialPair {
    access: SecretString,
    refresh: SecretString,
}

impl CredentialPair {
    /// Create a pair from freshly issued tokens.
    #[must_use]
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: SecretString::from(access.into()),
            refresh: SecretString::from(refresh.into()),
        }
    }

    /// The short-lived access token, attached to authorized requests.
    #[must_use]
    pub fn access_token(&self) -> &str {
        self.access.expose_secret()
    }

    /// The long-lived refresh token, exchanged for a new pair.
    #[must_use]
    pub fn refresh_token(&self) -> &str {
        self.refresh.expose_secret()
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access", &"[REDACTED]")
            .field("refresh", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// CredentialStore
// =============================================================================

/// Durable storage for the credential pair and the cached user profile.
///
/// All operations are synchronous and side-effect-only; the session client
/// is the only caller that mutates stored credentials.
pub trait CredentialStore: Send + Sync {
    /// The stored pair, if the session is authenticated.
    fn credentials(&self) -> Option<CredentialPair>;

    /// Replace the stored pair atomically.
    fn set_credentials(&self, pair: CredentialPair);

    /// The cached profile of the signed-in user, if any.
    fn profile(&self) -> Option<UserProfile>;

    /// Replace the cached profile.
    fn set_profile(&self, profile: UserProfile);

    /// Clear everything: tokens and profile.
    fn clear(&self);
}

#[derive(Debug, Clone, Default)]
struct StoredState {
    credentials: Option<CredentialPair>,
    profile: Option<UserProfile>,
}

// =============================================================================
// MemoryCredentialStore
// =============================================================================

/// Process-lifetime credential store.
///
/// The default choice for tests and short-lived tools; nothing survives the
/// process.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    state: Mutex<StoredState>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoredState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn credentials(&self) -> Option<CredentialPair> {
        self.lock().credentials.clone()
    }

    fn set_credentials(&self, pair: CredentialPair) {
        self.lock().credentials = Some(pair);
    }

    fn profile(&self) -> Option<UserProfile> {
        self.lock().profile.clone()
    }

    fn set_profile(&self, profile: UserProfile) {
        self.lock().profile = Some(profile);
    }

    fn clear(&self) {
        *self.lock() = StoredState::default();
    }
}

// =============================================================================
// FileCredentialStore
// =============================================================================

/// JSON document written to disk by [`FileCredentialStore`].
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedState {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user_data: Option<UserProfile>,
}

/// Credential store persisted to a JSON file.
///
/// Loads once at construction; every mutation rewrites the file via a
/// temp-file-and-rename so the pair on disk is never half written. Write
/// failures are logged at `warn` and never surfaced to the request path.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    state: Mutex<StoredState>,
}

impl FileCredentialStore {
    /// Open (or create on first write) the store at `path`.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = load_state(&path);
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoredState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, state: &StoredState) {
        let persisted = PersistedState {
            access_token: state
                .credentials
                .as_ref()
                .map(|pair| pair.access_token().to_owned()),
            refresh_token: state
                .credentials
                .as_ref()
                .map(|pair| pair.refresh_token().to_owned()),
            user_data: state.profile.clone(),
        };

        if let Err(error) = write_state(&self.path, &persisted) {
            tracing::warn!(path = %self.path.display(), %error, "failed to persist credentials");
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn credentials(&self) -> Option<CredentialPair> {
        self.lock().credentials.clone()
    }

    fn set_credentials(&self, pair: CredentialPair) {
        let mut state = self.lock();
        state.credentials = Some(pair);
        self.persist(&state);
    }

    fn profile(&self) -> Option<UserProfile> {
        self.lock().profile.clone()
    }

    fn set_profile(&self, profile: UserProfile) {
        let mut state = self.lock();
        state.profile = Some(profile);
        self.persist(&state);
    }

    fn clear(&self) {
        let mut state = self.lock();
        *state = StoredState::default();
        self.persist(&state);
    }
}

fn load_state(path: &std::path::Path) -> StoredState {
    let Ok(contents) = fs::read_to_string(path) else {
        return StoredState::default();
    };

    let persisted: PersistedState = match serde_json::from_str(&contents) {
        Ok(persisted) => persisted,
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "ignoring unreadable credential file");
            return StoredState::default();
        }
    };

    // A pair is only a pair with both halves; anything else counts as logged out.
    let credentials = match (persisted.access_token, persisted.refresh_token) {
        (Some(access), Some(refresh)) => Some(CredentialPair::new(access, refresh)),
        (None, None) => None,
        _ => {
            tracing::warn!(path = %path.display(), "discarding partial credential pair");
            None
        }
    };

    StoredState {
        credentials,
        profile: persisted.user_data,
    }
}

fn write_state(path: &std::path::Path, persisted: &PersistedState) -> std::io::Result<()> {
    let contents = serde_json::to_vec_pretty(persisted)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}
