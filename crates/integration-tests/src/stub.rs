//! In-process stub of the Marbelle backend.
//!
//! Implements the auth/cart/catalog endpoints with the production response
//! envelope, plus the knobs the tests need: forced access-token expiry,
//! failing refresh, failing cart mutations, a refresh-call counter, and a
//! request log.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Value, json};

/// Email of the one seeded account.
pub const TEST_EMAIL: &str = "ada@example.com";

/// Password of the one seeded account.
pub const TEST_PASSWORD: &str = "marble-and-stone";

/// Guest session ID the stub hands out on unauthenticated cart requests.
pub const GUEST_SESSION_ID: &str = "guest-session-1";

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone)]
struct StubProduct {
    id: i64,
    name: String,
    price: Decimal,
    stock_quantity: u32,
}

#[derive(Debug, Clone)]
struct StubItem {
    id: i64,
    product_id: i64,
    quantity: u32,
    unit_price: Decimal,
    created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct StubBackend {
    serial: u32,
    access_token: String,
    refresh_token: String,
    password: String,
    phone: Option<String>,
    refresh_calls: u32,
    refresh_delay: Duration,
    fail_refresh: bool,
    fail_next_cart_mutation: bool,
    always_unauthorized: bool,
    products: Vec<StubProduct>,
    items: Vec<StubItem>,
    next_item_id: i64,
    request_log: Vec<String>,
    guest_tagged_requests: u32,
}

impl StubBackend {
    fn log(&mut self, entry: impl Into<String>) {
        self.request_log.push(entry.into());
    }

    fn rotate_tokens(&mut self) -> (String, String) {
        self.serial += 1;
        self.access_token = format!("access-{}", self.serial);
        self.refresh_token = format!("refresh-{}", self.serial);
        (self.access_token.clone(), self.refresh_token.clone())
    }

    fn product(&self, id: i64) -> Option<StubProduct> {
        self.products.iter().find(|p| p.id == id).cloned()
    }

    fn item_json(&self, item: &StubItem) -> Value {
        let product = self
            .product(item.product_id)
            .expect("cart item references a seeded product");
        json!({
            "id": item.id,
            "product": {
                "id": product.id,
                "name": product.name,
                "sku": format!("SKU-{:03}", product.id),
                "stock_quantity": product.stock_quantity,
                "in_stock": product.stock_quantity > 0,
                "image": null,
            },
            "quantity": item.quantity,
            "unit_price": item.unit_price.to_string(),
            "subtotal": (item.unit_price * Decimal::from(item.quantity)).to_string(),
            "created_at": item.created_at.to_rfc3339(),
        })
    }

    fn totals_json(&self) -> Value {
        let subtotal: Decimal = self
            .items
            .iter()
            .map(|item| item.unit_price * Decimal::from(item.quantity))
            .sum::<Decimal>()
            .round_dp(2);
        let tax_amount = (subtotal * Decimal::new(9, 2)).round_dp(2);
        let item_count: u32 = self.items.iter().map(|item| item.quantity).sum();
        json!({
            "item_count": item_count,
            "subtotal": subtotal.to_string(),
            "tax_amount": tax_amount.to_string(),
            "total": (subtotal + tax_amount).to_string(),
        })
    }

    fn cart_json(&self) -> Value {
        let items: Vec<Value> = self.items.iter().map(|item| self.item_json(item)).collect();
        let Value::Object(mut cart) = self.totals_json() else {
            unreachable!("totals_json always builds an object");
        };
        cart.insert("id".to_owned(), json!(1));
        cart.insert("items".to_owned(), json!(items));
        Value::Object(cart)
    }

    fn profile_json(&self) -> Value {
        json!({
            "id": 1,
            "email": TEST_EMAIL,
            "first_name": "Ada",
            "last_name": "Lovelace",
            "company_name": null,
            "phone": self.phone,
            "is_business_customer": false,
        })
    }
}

/// Shared handle to the stub backend, given both to the router and to tests.
#[derive(Clone)]
pub struct StubState {
    inner: Arc<Mutex<StubBackend>>,
}

impl Default for StubState {
    fn default() -> Self {
        Self::new()
    }
}

impl StubState {
    /// Create a stub with the seeded catalog and no session.
    #[must_use]
    pub fn new() -> Self {
        let products = vec![
            StubProduct {
                id: 1,
                name: "Bianco Tile".to_owned(),
                price: Decimal::new(2000, 2), // 20.00
                stock_quantity: 25,
            },
            StubProduct {
                id: 2,
                name: "Carrara Slab".to_owned(),
                price: Decimal::new(14950, 2), // 149.50
                stock_quantity: 4,
            },
            StubProduct {
                id: 3,
                name: "Fior di Pesco".to_owned(),
                price: Decimal::new(10997, 2), // 109.97
                stock_quantity: 8,
            },
        ];

        Self {
            inner: Arc::new(Mutex::new(StubBackend {
                serial: 0,
                access_token: String::new(),
                refresh_token: String::new(),
                password: TEST_PASSWORD.to_owned(),
                phone: None,
                refresh_calls: 0,
                refresh_delay: Duration::ZERO,
                fail_refresh: false,
                fail_next_cart_mutation: false,
                always_unauthorized: false,
                products,
                items: Vec::new(),
                next_item_id: 1,
                request_log: Vec::new(),
                guest_tagged_requests: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StubBackend> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ====== Test Knobs ======

    /// Invalidate the outstanding access token server-side; the refresh
    /// token stays valid, as with a normal expiry.
    pub fn expire_access_token(&self) {
        let mut guard = self.lock();
        guard.serial += 1;
        guard.access_token = format!("access-{}", guard.serial);
    }

    /// Delay every refresh call, widening the single-flight race window.
    pub fn set_refresh_delay(&self, delay: Duration) {
        self.lock().refresh_delay = delay;
    }

    /// Make every refresh call fail.
    pub fn set_fail_refresh(&self, fail: bool) {
        self.lock().fail_refresh = fail;
    }

    /// Make the next cart mutation fail with a validation error.
    pub fn fail_next_cart_mutation(&self) {
        self.lock().fail_next_cart_mutation = true;
    }

    /// Answer 401 to every bearer-authenticated request, valid or not.
    pub fn set_always_unauthorized(&self, always: bool) {
        self.lock().always_unauthorized = always;
    }

    // ====== Test Observations ======

    /// Number of `POST /auth/refresh/` calls received.
    #[must_use]
    pub fn refresh_calls(&self) -> u32 {
        self.lock().refresh_calls
    }

    /// The currently valid access token.
    #[must_use]
    pub fn current_access_token(&self) -> String {
        self.lock().access_token.clone()
    }

    /// The currently valid refresh token.
    #[must_use]
    pub fn current_refresh_token(&self) -> String {
        self.lock().refresh_token.clone()
    }

    /// How many logged requests start with `prefix` (e.g. `"GET /cart/"`).
    #[must_use]
    pub fn request_count(&self, prefix: &str) -> usize {
        self.lock()
            .request_log
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .count()
    }

    /// How many requests carried the guest session header.
    #[must_use]
    pub fn guest_tagged_requests(&self) -> u32 {
        self.lock().guest_tagged_requests
    }
}

// =============================================================================
// Router
// =============================================================================

/// Build the stub router.
pub fn router(state: StubState) -> Router {
    Router::new()
        .route("/auth/register/", post(register))
        .route("/auth/login/", post(login))
        .route("/auth/logout/", post(logout))
        .route("/auth/refresh/", post(refresh))
        .route("/auth/user/", get(get_profile).put(update_profile))
        .route("/auth/change-password/", post(change_password))
        .route("/cart/", get(get_cart))
        .route("/cart/items/", post(add_to_cart))
        .route("/cart/items/{id}/", patch(update_cart_item))
        .route("/cart/items/{id}/remove/", delete(remove_cart_item))
        .route("/cart/clear/", delete(clear_cart))
        .route("/products/", get(list_products))
        .route("/products/{id}/", get(get_product))
        .with_state(state)
}

// =============================================================================
// Response Helpers
// =============================================================================

fn success(message: &str, data: Value) -> Response {
    Json(json!({
        "success": true,
        "message": message,
        "data": data,
    }))
    .into_response()
}

fn error(status: StatusCode, message: &str, errors: Option<Value>) -> Response {
    let body = match errors {
        Some(errors) => json!({
            "success": false,
            "message": message,
            "errors": errors,
        }),
        None => json!({
            "success": false,
            "message": message,
        }),
    };
    (status, Json(body)).into_response()
}

fn unauthorized() -> Response {
    error(
        StatusCode::UNAUTHORIZED,
        "Authentication credentials were not provided or are invalid.",
        None,
    )
}

fn with_guest_header(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert("X-Session-ID", HeaderValue::from_static(GUEST_SESSION_ID));
    response
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(String::from)
}

enum CartAuth {
    User,
    Guest,
}

fn check_auth(guard: &StubBackend, headers: &HeaderMap) -> Result<(), Response> {
    match bearer_token(headers) {
        Some(token) if !guard.always_unauthorized && token == guard.access_token => Ok(()),
        _ => Err(unauthorized()),
    }
}

fn check_cart_auth(guard: &StubBackend, headers: &HeaderMap) -> Result<CartAuth, Response> {
    match bearer_token(headers) {
        Some(token) if !guard.always_unauthorized && token == guard.access_token => {
            Ok(CartAuth::User)
        }
        Some(_) => Err(unauthorized()),
        None => Ok(CartAuth::Guest),
    }
}

fn note_guest_tag(guard: &mut StubBackend, headers: &HeaderMap) {
    if headers.contains_key("X-Session-ID") {
        guard.guest_tagged_requests += 1;
    }
}

// =============================================================================
// Auth Handlers
// =============================================================================

async fn register(State(state): State<StubState>, Json(body): Json<Value>) -> Response {
    let mut guard = state.lock();
    guard.log("POST /auth/register/");

    let password = body.get("password").and_then(Value::as_str).unwrap_or("");
    let confirm = body
        .get("password_confirm")
        .and_then(Value::as_str)
        .unwrap_or("");
    if password != confirm {
        return error(
            StatusCode::BAD_REQUEST,
            "Registration failed.",
            Some(json!({"password_confirm": ["Passwords do not match."]})),
        );
    }

    (
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Registration successful. Please check your email for verification instructions.",
            "data": {"user_id": 2},
        })),
    )
        .into_response()
}

async fn login(State(state): State<StubState>, Json(body): Json<Value>) -> Response {
    let mut guard = state.lock();
    guard.log("POST /auth/login/");

    let email = body.get("email").and_then(Value::as_str).unwrap_or("");
    let password = body.get("password").and_then(Value::as_str).unwrap_or("");
    if email != TEST_EMAIL || password != guard.password {
        return error(
            StatusCode::BAD_REQUEST,
            "Login failed.",
            Some(json!({"non_field_errors": ["Invalid email or password."]})),
        );
    }

    let (access, refresh) = guard.rotate_tokens();
    let user = guard.profile_json();
    success(
        "Login successful.",
        json!({"access": access, "refresh": refresh, "user": user}),
    )
}

async fn logout(State(state): State<StubState>, headers: HeaderMap) -> Response {
    let mut guard = state.lock();
    guard.log("POST /auth/logout/");
    if let Err(response) = check_auth(&guard, &headers) {
        return response;
    }

    // Blacklist: the outstanding pair stops working.
    guard.rotate_tokens();
    success("Logout successful.", Value::Null)
}

async fn refresh(State(state): State<StubState>, Json(body): Json<Value>) -> Response {
    let (delay, valid) = {
        let mut guard = state.lock();
        guard.log("POST /auth/refresh/");
        guard.refresh_calls += 1;

        let supplied = body.get("refresh").and_then(Value::as_str).unwrap_or("");
        let valid = !guard.fail_refresh
            && !guard.refresh_token.is_empty()
            && supplied == guard.refresh_token;
        (guard.refresh_delay, valid)
    };

    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    if !valid {
        return error(
            StatusCode::UNAUTHORIZED,
            "Token is invalid or expired.",
            None,
        );
    }

    let mut guard = state.lock();
    let (access, refresh) = guard.rotate_tokens();
    success(
        "Token refreshed.",
        json!({"access": access, "refresh": refresh}),
    )
}

async fn get_profile(State(state): State<StubState>, headers: HeaderMap) -> Response {
    let mut guard = state.lock();
    guard.log("GET /auth/user/");
    if let Err(response) = check_auth(&guard, &headers) {
        return response;
    }
    success("Profile retrieved successfully.", guard.profile_json())
}

async fn update_profile(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut guard = state.lock();
    guard.log("PUT /auth/user/");
    if let Err(response) = check_auth(&guard, &headers) {
        return response;
    }

    if let Some(phone) = body.get("phone").and_then(Value::as_str) {
        guard.phone = Some(phone.to_owned());
    }
    success("Profile updated successfully.", guard.profile_json())
}

async fn change_password(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut guard = state.lock();
    guard.log("POST /auth/change-password/");
    if let Err(response) = check_auth(&guard, &headers) {
        return response;
    }

    let current = body
        .get("current_password")
        .and_then(Value::as_str)
        .unwrap_or("");
    if current != guard.password {
        return error(
            StatusCode::BAD_REQUEST,
            "Password change failed.",
            Some(json!({"current_password": ["Current password is incorrect."]})),
        );
    }

    if let Some(new_password) = body.get("new_password").and_then(Value::as_str) {
        guard.password = new_password.to_owned();
    }
    success("Password changed successfully.", Value::Null)
}

// =============================================================================
// Cart Handlers
// =============================================================================

fn take_cart_mutation_failure(guard: &mut StubBackend) -> Option<Response> {
    if guard.fail_next_cart_mutation {
        guard.fail_next_cart_mutation = false;
        return Some(error(StatusCode::BAD_REQUEST, "Cart update failed.", None));
    }
    None
}

fn finish_cart_response(auth: &CartAuth, response: Response) -> Response {
    match auth {
        CartAuth::Guest => with_guest_header(response),
        CartAuth::User => response,
    }
}

async fn get_cart(State(state): State<StubState>, headers: HeaderMap) -> Response {
    let mut guard = state.lock();
    guard.log("GET /cart/");
    note_guest_tag(&mut guard, &headers);
    let auth = match check_cart_auth(&guard, &headers) {
        Ok(auth) => auth,
        Err(response) => return response,
    };

    let response = success("Cart retrieved successfully.", guard.cart_json());
    finish_cart_response(&auth, response)
}

async fn add_to_cart(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut guard = state.lock();
    guard.log("POST /cart/items/");
    note_guest_tag(&mut guard, &headers);
    let auth = match check_cart_auth(&guard, &headers) {
        Ok(auth) => auth,
        Err(response) => return response,
    };
    if let Some(response) = take_cart_mutation_failure(&mut guard) {
        return response;
    }

    let product_id = body.get("product_id").and_then(Value::as_i64).unwrap_or(0);
    let quantity = body.get("quantity").and_then(Value::as_u64).unwrap_or(0);
    let quantity = u32::try_from(quantity).unwrap_or(0);
    if !(1..=99).contains(&quantity) {
        return error(
            StatusCode::BAD_REQUEST,
            "Quantity must be between 1 and 99.",
            None,
        );
    }

    let Some(product) = guard.product(product_id) else {
        return error(StatusCode::NOT_FOUND, "Product not found.", None);
    };

    let item_id = if let Some(existing) = guard
        .items
        .iter_mut()
        .find(|item| item.product_id == product_id)
    {
        let new_quantity = existing.quantity + quantity;
        if new_quantity > 99 {
            return error(
                StatusCode::BAD_REQUEST,
                "Maximum quantity per product is 99.",
                None,
            );
        }
        existing.quantity = new_quantity;
        existing.id
    } else {
        let id = guard.next_item_id;
        guard.next_item_id += 1;
        guard.items.push(StubItem {
            id,
            product_id,
            quantity,
            unit_price: product.price,
            created_at: Utc::now(),
        });
        id
    };

    let item = guard
        .items
        .iter()
        .find(|item| item.id == item_id)
        .cloned()
        .expect("just inserted");
    let data = json!({
        "item": guard.item_json(&item),
        "cart_totals": guard.totals_json(),
    });
    let response = success(
        &format!("Added {} x {} to cart.", quantity, product.name),
        data,
    );
    finish_cart_response(&auth, response)
}

async fn update_cart_item(
    State(state): State<StubState>,
    Path(item_id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut guard = state.lock();
    guard.log(format!("PATCH /cart/items/{item_id}/"));
    note_guest_tag(&mut guard, &headers);
    let auth = match check_cart_auth(&guard, &headers) {
        Ok(auth) => auth,
        Err(response) => return response,
    };
    if let Some(response) = take_cart_mutation_failure(&mut guard) {
        return response;
    }

    let quantity = body.get("quantity").and_then(Value::as_u64).unwrap_or(0);
    let quantity = u32::try_from(quantity).unwrap_or(0);
    if !(1..=99).contains(&quantity) {
        return error(
            StatusCode::BAD_REQUEST,
            "Quantity must be between 1 and 99.",
            None,
        );
    }

    let Some(item) = guard.items.iter_mut().find(|item| item.id == item_id) else {
        return error(StatusCode::NOT_FOUND, "Cart item not found.", None);
    };
    item.quantity = quantity;
    let item = item.clone();

    let data = json!({
        "item": guard.item_json(&item),
        "cart_totals": guard.totals_json(),
    });
    let response = success("Cart item updated successfully.", data);
    finish_cart_response(&auth, response)
}

async fn remove_cart_item(
    State(state): State<StubState>,
    Path(item_id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let mut guard = state.lock();
    guard.log(format!("DELETE /cart/items/{item_id}/remove/"));
    note_guest_tag(&mut guard, &headers);
    let auth = match check_cart_auth(&guard, &headers) {
        Ok(auth) => auth,
        Err(response) => return response,
    };
    if let Some(response) = take_cart_mutation_failure(&mut guard) {
        return response;
    }

    let before = guard.items.len();
    guard.items.retain(|item| item.id != item_id);
    if guard.items.len() == before {
        return error(StatusCode::NOT_FOUND, "Cart item not found.", None);
    }

    let data = json!({"cart_totals": guard.totals_json()});
    let response = success("Removed item from cart.", data);
    finish_cart_response(&auth, response)
}

async fn clear_cart(State(state): State<StubState>, headers: HeaderMap) -> Response {
    let mut guard = state.lock();
    guard.log("DELETE /cart/clear/");
    note_guest_tag(&mut guard, &headers);
    let auth = match check_cart_auth(&guard, &headers) {
        Ok(auth) => auth,
        Err(response) => return response,
    };
    if let Some(response) = take_cart_mutation_failure(&mut guard) {
        return response;
    }

    guard.items.clear();
    let data = json!({"cart_totals": guard.totals_json()});
    let response = success("Cart cleared successfully.", data);
    finish_cart_response(&auth, response)
}

// =============================================================================
// Catalog Handlers
// =============================================================================

fn product_json(product: &StubProduct) -> Value {
    json!({
        "id": product.id,
        "name": product.name,
        "description": format!("{}, natural stone, sold per square meter.", product.name),
        "sku": format!("SKU-{:03}", product.id),
        "price": product.price.to_string(),
        "stock_quantity": product.stock_quantity,
        "in_stock": product.stock_quantity > 0,
        "image": null,
    })
}

async fn list_products(State(state): State<StubState>) -> Response {
    let mut guard = state.lock();
    guard.log("GET /products/");

    let results: Vec<Value> = guard.products.iter().map(product_json).collect();
    Json(json!({
        "success": true,
        "message": "Products retrieved successfully.",
        "data": results,
        "pagination": {
            "count": guard.products.len(),
            "next": null,
            "previous": null,
        },
    }))
    .into_response()
}

async fn get_product(State(state): State<StubState>, Path(product_id): Path<i64>) -> Response {
    let mut guard = state.lock();
    guard.log(format!("GET /products/{product_id}/"));

    match guard.product(product_id) {
        Some(product) => success("Product retrieved successfully.", product_json(&product)),
        None => error(StatusCode::NOT_FOUND, "Product not found.", None),
    }
}
