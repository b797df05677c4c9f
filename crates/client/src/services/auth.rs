//! Authentication service.

use tracing::{info, instrument};

use marbelle_core::{Email, UserId, UserProfile};

use crate::api::{LoginRequest, RefreshRequest, RegistrationData, RegistrationRequest, TokenData};
use crate::error::ApiError;
use crate::session::{Auth, CredentialPair, SessionClient};

const REGISTER_PATH: &str = "/auth/register/";
const LOGIN_PATH: &str = "/auth/login/";
const LOGOUT_PATH: &str = "/auth/logout/";

/// Registration, login, and logout against the backend auth endpoints.
#[derive(Clone)]
pub struct AuthService {
    session: SessionClient,
}

impl AuthService {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(session: SessionClient) -> Self {
        Self { session }
    }

    /// Register a new account.
    ///
    /// The account starts inactive; the backend sends a verification email.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` for rejected input.
    pub async fn register(&self, request: RegistrationRequest) -> Result<UserId, ApiError> {
        let data: RegistrationData = self
            .session
            .post(REGISTER_PATH, &request, Auth::None)
            .await?;
        Ok(data.user_id)
    }

    /// Log in with email and password.
    ///
    /// On success the credential pair and the profile are stored through the
    /// session client, which makes every later `Auth::Bearer` request
    /// authenticated.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` for a malformed email or rejected
    /// credentials.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, ApiError> {
        let email = Email::parse(email)?;

        let data: TokenData = self
            .session
            .post(
                LOGIN_PATH,
                &LoginRequest {
                    email: email.as_str(),
                    password,
                },
                Auth::None,
            )
            .await?;

        self.session
            .store_tokens(CredentialPair::new(data.access, data.refresh));
        self.session.store_profile(data.user.clone());
        info!(user_id = %data.user.id, "login succeeded");

        Ok(data.user)
    }

    /// Log out.
    ///
    /// Asks the backend to blacklist the refresh token, then clears local
    /// session state regardless of what the server answered; a dead network
    /// must not keep a client logged in.
    ///
    /// # Errors
    ///
    /// Returns the server-side error, if any, after local state is cleared.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result = match self.session.credentials() {
            Some(pair) => {
                self.session
                    .post::<(), _>(
                        LOGOUT_PATH,
                        &RefreshRequest {
                            refresh: pair.refresh_token(),
                        },
                        Auth::Bearer,
                    )
                    .await
            }
            None => Ok(()),
        };

        self.session.clear_tokens();
        info!("logged out");
        result
    }
}
