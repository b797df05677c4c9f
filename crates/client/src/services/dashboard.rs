//! Dashboard service.
//!
//! Profile and password management for the signed-in user.

use tracing::instrument;

use marbelle_core::UserProfile;

use crate::api::{ChangePasswordRequest, ProfileUpdate};
use crate::error::ApiError;
use crate::session::{Auth, SessionClient};

const PROFILE_PATH: &str = "/auth/user/";
const CHANGE_PASSWORD_PATH: &str = "/auth/change-password/";

/// Typed access to the authenticated dashboard endpoints.
#[derive(Clone)]
pub struct DashboardService {
    session: SessionClient,
}

impl DashboardService {
    /// Create a new dashboard service.
    #[must_use]
    pub const fn new(session: SessionClient) -> Self {
        Self { session }
    }

    /// Fetch the current profile and refresh the cached copy.
    ///
    /// # Errors
    ///
    /// Fails with one of the [`ApiError`] variants.
    #[instrument(skip(self))]
    pub async fn profile(&self) -> Result<UserProfile, ApiError> {
        let profile: UserProfile = self.session.get(PROFILE_PATH, Auth::Bearer).await?;
        self.session.store_profile(profile.clone());
        Ok(profile)
    }

    /// Apply a partial profile update and refresh the cached copy.
    ///
    /// # Errors
    ///
    /// Fails with one of the [`ApiError`] variants.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, ApiError> {
        let profile: UserProfile = self.session.put(PROFILE_PATH, update, Auth::Bearer).await?;
        self.session.store_profile(profile.clone());
        Ok(profile)
    }

    /// Change the account password.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Validation` if the current password is wrong or
    /// the new one is rejected.
    #[instrument(skip_all)]
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        self.session
            .post::<(), _>(
                CHANGE_PASSWORD_PATH,
                &ChangePasswordRequest {
                    current_password,
                    new_password,
                    new_password_confirm: new_password,
                },
                Auth::Bearer,
            )
            .await
    }
}
