//! Wire-level types for the Marbelle backend API.
//!
//! Every backend response uses the envelope
//! `{"success": bool, "message": str, "data"?: ..., "errors"?: ..., "pagination"?: ...}`.
//! The session client decodes the envelope; the payload types here describe
//! the `data` shapes, and [`conversions`] turns them into the domain types
//! from `marbelle-core`.

mod conversions;

pub use conversions::{convert_cart, convert_cart_item};

use core::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use marbelle_core::{CartItemId, CartProduct, CartTotals, ProductId, UserId, UserProfile};

// =============================================================================
// Envelope
// =============================================================================

/// The response envelope shared by every backend endpoint.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    /// Application-level success flag; `false` means the request was
    /// rejected even when the HTTP status is 200.
    pub success: bool,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Endpoint-specific payload.
    #[serde(default)]
    pub data: Option<Value>,
    /// Field-level error details on failure.
    #[serde(default)]
    pub errors: Option<Value>,
    /// Present on paginated list responses.
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// Pagination metadata for list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Pagination {
    /// Total number of results across all pages.
    pub count: u64,
    /// URL of the next page, if any.
    pub next: Option<String>,
    /// URL of the previous page, if any.
    pub previous: Option<String>,
}

/// A page of results together with its pagination metadata.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Results for this page.
    pub results: Vec<T>,
    /// Total number of results across all pages.
    pub count: u64,
    /// URL of the next page, if any.
    pub next: Option<String>,
    /// URL of the previous page, if any.
    pub previous: Option<String>,
}

// =============================================================================
// Auth Payloads
// =============================================================================

/// `data` of a successful login: the credential pair plus the profile.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenData {
    /// Short-lived access token.
    pub access: String,
    /// Long-lived refresh token.
    pub refresh: String,
    /// Profile of the authenticated user.
    pub user: UserProfile,
}

/// `data` of a successful credential refresh (rotation: a full new pair).
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshData {
    /// New access token.
    pub access: String,
    /// New refresh token.
    pub refresh: String,
}

/// `data` of a successful registration.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationData {
    /// ID of the newly created (inactive) account.
    pub user_id: UserId,
}

// =============================================================================
// Cart Payloads
// =============================================================================

/// `data` of `GET /cart/`.
///
/// The backend also sends precomputed totals; they are intentionally not
/// modeled here; totals are always re-derived from the item list.
#[derive(Debug, Clone, Deserialize)]
pub struct CartPayload {
    /// Cart lines, in display order.
    #[serde(default)]
    pub items: Vec<CartItemPayload>,
}

/// A cart line as serialized by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct CartItemPayload {
    /// Server-assigned line ID.
    pub id: CartItemId,
    /// Product snapshot.
    pub product: CartProduct,
    /// Quantity.
    pub quantity: u32,
    /// Unit price frozen at add time (decimal string on the wire).
    pub unit_price: Decimal,
    /// When the line was added.
    pub created_at: DateTime<Utc>,
}

/// `data` of add/update cart mutations: the touched line plus fresh totals.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemMutationPayload {
    /// The created or updated line.
    pub item: CartItemPayload,
    /// Server-computed totals after the mutation.
    pub cart_totals: CartTotals,
}

/// `data` of remove/clear cart mutations.
#[derive(Debug, Clone, Deserialize)]
pub struct TotalsPayload {
    /// Server-computed totals after the mutation.
    pub cart_totals: CartTotals,
}

// =============================================================================
// Request Bodies
// =============================================================================

/// Body of `POST /auth/login/`.
#[derive(Serialize)]
pub struct LoginRequest<'a> {
    /// Account email.
    pub email: &'a str,
    /// Account password.
    pub password: &'a str,
}

impl fmt::Debug for LoginRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Body of `POST /auth/refresh/` and `POST /auth/logout/`.
#[derive(Serialize)]
pub struct RefreshRequest<'a> {
    /// The stored refresh token.
    pub refresh: &'a str,
}

impl fmt::Debug for RefreshRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshRequest")
            .field("refresh", &"[REDACTED]")
            .finish()
    }
}

/// Body of `POST /auth/register/`.
#[derive(Clone, Serialize)]
pub struct RegistrationRequest {
    /// Account email.
    pub email: String,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Company name, for business customers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    /// Contact phone number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Password.
    pub password: String,
    /// Password confirmation; must match `password`.
    pub password_confirm: String,
}

impl fmt::Debug for RegistrationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationRequest")
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("company_name", &self.company_name)
            .field("phone", &self.phone)
            .field("password", &"[REDACTED]")
            .field("password_confirm", &"[REDACTED]")
            .finish()
    }
}

/// Body of `POST /cart/items/`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AddItemRequest {
    /// Product to add.
    pub product_id: ProductId,
    /// Quantity to add, `1..=99`.
    pub quantity: u32,
}

/// Body of `PATCH /cart/items/{id}/`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct UpdateItemRequest {
    /// New quantity, `1..=99`.
    pub quantity: u32,
}

/// Body of `PUT /auth/user/` (partial update; unset fields are left as-is).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    /// New first name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// New last name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// New company name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    /// New phone number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Body of `POST /auth/change-password/`.
#[derive(Serialize)]
pub struct ChangePasswordRequest<'a> {
    /// The current password, for verification.
    pub current_password: &'a str,
    /// The new password.
    pub new_password: &'a str,
    /// Confirmation; must match `new_password`.
    pub new_password_confirm: &'a str,
}

impl fmt::Debug for ChangePasswordRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangePasswordRequest")
            .field("current_password", &"[REDACTED]")
            .field("new_password", &"[REDACTED]")
            .field("new_password_confirm", &"[REDACTED]")
            .finish()
    }
}
