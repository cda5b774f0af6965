//! Integration tests for Tienda.
//!
//! Provides [`FakeApi`], an in-memory `axum` server speaking the Tienda REST
//! API on `127.0.0.1:0`. Tests drive a real [`StoreClient`] against it, so
//! requests cross a socket and go through the same `reqwest` stack as in
//! production.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p tienda-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `auth` - Login, register, refresh, logout and rejected tokens
//! - `cart` / `wishlist` - Mutations and their change events
//! - `bindings` - Mounted views re-fetching, reverting and going anonymous
//! - `checkout` - Orders placed from a fetched cart
//!
//! # Knobs
//!
//! - [`FakeApi::set_delay`] - Delay every response (timeouts, stale fetches)
//! - [`FakeApi::fail_mutations`] - Answer cart/wishlist writes with 500
//! - [`FakeApi::revoke_tokens`] - Reject every token issued so far
//! - [`FakeApi::hits`] - Count requests per route

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use uuid::Uuid;

use tienda_client::{ClientConfig, EventBus, MemorySessionStore, Session, StoreClient};
use tienda_core::{Price, ProductRef};

/// Seeded account.
pub const ANA_EMAIL: &str = "ana@example.com";
pub const ANA_PASSWORD: &str = "secret1";
pub const ANA_USERNAME: &str = "ana";

/// Seeded product ids.
pub const MATE: &str = "p-mate";
pub const TERMO: &str = "p-termo";
pub const YERBA: &str = "p-yerba";

const ACCESS_TTL_SECS: i64 = 3600;
const REFRESH_TTL_SECS: i64 = 30 * 24 * 3600;
const RESET_TTL_SECS: i64 = 15 * 60;

// =============================================================================
// State
// =============================================================================

struct User {
    id: String,
    email: String,
    username: String,
    password: String,
    cart: Vec<(String, u32)>,
    wishlist: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Access,
    Refresh,
    Reset,
}

struct IssuedToken {
    user_id: String,
    kind: TokenKind,
    exp: i64,
}

#[derive(Default)]
struct Store {
    products: Vec<ProductRef>,
    users: Vec<User>,
    tokens: HashMap<String, IssuedToken>,
    orders: HashMap<String, (String, Value)>,
    hits: HashMap<String, usize>,
}

impl Store {
    fn seeded() -> Self {
        let mut mate = ProductRef::new(MATE, "Mate de calabaza", Price::from_units(1200));
        mate.category = Some("Mates".to_string());
        mate.stock = 10;
        mate.description = "Mate tradicional curado".to_string();

        let mut termo = ProductRef::new(TERMO, "Termo acero", Price::from_units(9000));
        termo.category = Some("Termos".to_string());
        termo.stock = 3;
        termo.original_price = Some(Price::from_units(11000));

        let mut yerba = ProductRef::new(YERBA, "Yerba suave", Price::from_units(1500));
        yerba.category = Some("Yerba Mate".to_string());
        yerba.stock = 40;

        Self {
            products: vec![mate, termo, yerba],
            users: vec![User {
                id: Uuid::new_v4().simple().to_string(),
                email: ANA_EMAIL.to_string(),
                username: ANA_USERNAME.to_string(),
                password: ANA_PASSWORD.to_string(),
                cart: Vec::new(),
                wishlist: Vec::new(),
            }],
            ..Self::default()
        }
    }

    fn product(&self, id: &str) -> Option<&ProductRef> {
        self.products.iter().find(|p| p.id.as_str() == id)
    }

    fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users.iter().find(|u| u.email.eq_ignore_ascii_case(email))
    }

    fn user_mut(&mut self, id: &str) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }

    fn issue(&mut self, user_id: &str, kind: TokenKind, ttl_secs: i64) -> String {
        let exp = Utc::now().timestamp() + ttl_secs;
        let token = encode_token(user_id, exp);
        self.tokens.insert(
            token.clone(),
            IssuedToken {
                user_id: user_id.to_string(),
                kind,
                exp,
            },
        );
        token
    }
}

/// `header.claims.signature`, each part base64url without padding.
fn encode_token(user_id: &str, exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = json!({ "sub": user_id, "exp": exp, "jti": Uuid::new_v4().to_string() });
    let claims = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{claims}.fake-signature")
}

#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<Store>>,
    delay_ms: Arc<AtomicU64>,
    fail_mutations: Arc<AtomicBool>,
}

impl AppState {
    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the hit, then apply the configured delay.
    async fn enter(&self, route: &str) {
        *self.store().hits.entry(route.to_string()).or_default() += 1;
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }

    fn mutation_guard(&self) -> Result<(), Response> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(error(StatusCode::INTERNAL_SERVER_ERROR, "injected failure"));
        }
        Ok(())
    }

    /// Resolve the bearer token to a user id, the way `jwt_required` does.
    fn authenticate(&self, headers: &HeaderMap, kind: TokenKind) -> Result<String, Response> {
        let unauthorized = |msg: &str| {
            (StatusCode::UNAUTHORIZED, Json(json!({ "msg": msg }))).into_response()
        };
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| unauthorized("Missing Authorization Header"))?;

        let store = self.store();
        let issued = store
            .tokens
            .get(token)
            .ok_or_else(|| unauthorized("Signature verification failed"))?;
        if issued.kind != kind {
            return Err(unauthorized("Wrong token type"));
        }
        if issued.exp <= Utc::now().timestamp() {
            return Err(unauthorized("Token has expired"));
        }
        Ok(issued.user_id.clone())
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "error": message }))).into_response()
}

// =============================================================================
// FakeApi
// =============================================================================

/// A running fake API. The server stops when this is dropped.
pub struct FakeApi {
    addr: SocketAddr,
    state: AppState,
    task: JoinHandle<()>,
}

impl FakeApi {
    /// Bind to an ephemeral port and serve the seeded store.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        let state = AppState {
            store: Arc::new(Mutex::new(Store::seeded())),
            delay_ms: Arc::new(AtomicU64::new(0)),
            fail_mutations: Arc::new(AtomicBool::new(false)),
        };
        let app = router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake API listener");
        let addr = listener.local_addr().expect("Listener has no address");
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self { addr, state, task }
    }

    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Client configuration pointing at this server with a short timeout.
    ///
    /// # Panics
    ///
    /// Never for a bound loopback address.
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(&self.base_url())
            .expect("Loopback URL is valid")
            .with_timeout(Duration::from_secs(2))
    }

    /// A client with an empty in-memory session and a fresh event bus.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn client(&self) -> StoreClient {
        Self::client_with(&self.config(), MemorySessionStore::new())
    }

    /// A client that starts signed in as the seeded user.
    #[must_use]
    pub fn signed_in_client(&self) -> StoreClient {
        let token = self.issue_token(ANA_EMAIL, ACCESS_TTL_SECS);
        Self::client_with(
            &self.config(),
            MemorySessionStore::with_session(Session::new(token)),
        )
    }

    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn client_with(config: &ClientConfig, store: MemorySessionStore) -> StoreClient {
        StoreClient::new(config, Arc::new(store), EventBus::new())
            .expect("Failed to build client")
    }

    /// Issue an access token for `email` valid for `ttl_secs` (negative for
    /// an already expired token).
    ///
    /// # Panics
    ///
    /// Panics if no account has that email.
    #[must_use]
    pub fn issue_token(&self, email: &str, ttl_secs: i64) -> String {
        let mut store = self.state.store();
        let user_id = store
            .user_by_email(email)
            .map(|u| u.id.clone())
            .expect("Unknown test account");
        store.issue(&user_id, TokenKind::Access, ttl_secs)
    }

    /// Delay every response by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.state.delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Answer every cart and wishlist write with 500 while set.
    pub fn fail_mutations(&self, fail: bool) {
        self.state.fail_mutations.store(fail, Ordering::SeqCst);
    }

    /// Forget every issued token, as after a server-side key rotation.
    pub fn revoke_tokens(&self) {
        self.state.store().tokens.clear();
    }

    /// Requests seen for a route such as `"GET /api/cart"`.
    #[must_use]
    pub fn hits(&self, route: &str) -> usize {
        self.state.store().hits.get(route).copied().unwrap_or(0)
    }

    /// Cart of `email` as `(product_id, quantity)` pairs.
    #[must_use]
    pub fn cart_of(&self, email: &str) -> Vec<(String, u32)> {
        self.state
            .store()
            .user_by_email(email)
            .map(|u| u.cart.clone())
            .unwrap_or_default()
    }

    /// Wishlist of `email` as product ids.
    #[must_use]
    pub fn wishlist_of(&self, email: &str) -> Vec<String> {
        self.state
            .store()
            .user_by_email(email)
            .map(|u| u.wishlist.clone())
            .unwrap_or_default()
    }

    /// Add to a user's cart behind the client's back, as another device would.
    pub fn put_in_cart(&self, email: &str, product_id: &str, quantity: u32) {
        let mut store = self.state.store();
        let Some(user_id) = store.user_by_email(email).map(|u| u.id.clone()) else {
            return;
        };
        if let Some(user) = store.user_mut(&user_id) {
            add_line(&mut user.cart, product_id, quantity);
        }
    }

    /// Number of orders placed so far.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.state.store().orders.len()
    }
}

impl Drop for FakeApi {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn add_line(cart: &mut Vec<(String, u32)>, product_id: &str, quantity: u32) {
    match cart.iter_mut().find(|(id, _)| id == product_id) {
        Some((_, q)) => *q += quantity,
        None => cart.push((product_id.to_string(), quantity)),
    }
}

// =============================================================================
// Routes
// =============================================================================

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/request-reset", post(request_reset))
        .route("/api/auth/reset-password", post(reset_password))
        .route("/api/dashboard", get(dashboard))
        .route("/api/products", get(list_products))
        .route("/api/products/search", get(search_products))
        .route("/api/products/category/{name}", get(products_by_category))
        .route("/api/products/{id}", get(get_product))
        .route("/api/cart", get(get_cart))
        .route("/api/cart/", get(get_cart))
        .route("/api/cart/add", post(add_to_cart))
        .route("/api/cart/update", put(update_cart))
        .route("/api/cart/remove/{id}", delete(remove_from_cart))
        .route("/api/wishlist", get(get_wishlist))
        .route("/api/wishlist/", get(get_wishlist))
        .route("/api/wishlist/add", post(add_to_wishlist))
        .route("/api/wishlist/remove/{id}", delete(remove_from_wishlist))
        .route("/api/wishlist/check/{id}", get(check_wishlist))
        .route("/api/orders/checkout", post(checkout))
        .route("/api/orders/{id}", get(get_order))
        .with_state(state)
}

#[derive(Deserialize)]
struct LoginBody {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

async fn login(State(state): State<AppState>, Json(body): Json<LoginBody>) -> Response {
    state.enter("POST /api/auth/login").await;
    let mut store = state.store();
    let Some(user) = store
        .user_by_email(&body.email)
        .filter(|u| u.password == body.password)
    else {
        return error(StatusCode::UNAUTHORIZED, "Credenciales inválidas");
    };
    let user_json = json!({ "id": user.id, "name": user.username, "email": user.email });
    let user_id = user.id.clone();

    let access_token = store.issue(&user_id, TokenKind::Access, ACCESS_TTL_SECS);
    let refresh_token = store.issue(&user_id, TokenKind::Refresh, REFRESH_TTL_SECS);
    Json(json!({
        "success": true,
        "access_token": access_token,
        "refresh_token": refresh_token,
        "user": user_json,
    }))
    .into_response()
}

#[derive(Deserialize)]
struct RegisterBody {
    #[serde(default)]
    email: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

async fn register(State(state): State<AppState>, Json(body): Json<RegisterBody>) -> Response {
    state.enter("POST /api/auth/register").await;
    if body.email.is_empty() || body.username.is_empty() || body.password.is_empty() {
        return error(StatusCode::BAD_REQUEST, "Faltan campos obligatorios");
    }
    if body.password.len() < 6 {
        return error(
            StatusCode::BAD_REQUEST,
            "La contraseña debe tener al menos 6 caracteres",
        );
    }

    let mut store = state.store();
    let taken = store.users.iter().any(|u| {
        u.email.eq_ignore_ascii_case(&body.email) || u.username.eq_ignore_ascii_case(&body.username)
    });
    if taken {
        return error(StatusCode::CONFLICT, "Usuario o email ya registrado");
    }

    let user_id = Uuid::new_v4().simple().to_string();
    store.users.push(User {
        id: user_id.clone(),
        email: body.email,
        username: body.username,
        password: body.password,
        cart: Vec::new(),
        wishlist: Vec::new(),
    });
    let access_token = store.issue(&user_id, TokenKind::Access, ACCESS_TTL_SECS);
    let refresh_token = store.issue(&user_id, TokenKind::Refresh, REFRESH_TTL_SECS);
    (
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "user_id": user_id,
            "access_token": access_token,
            "refresh_token": refresh_token,
        })),
    )
        .into_response()
}

async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> Response {
    state.enter("POST /api/auth/refresh").await;
    let user_id = match state.authenticate(&headers, TokenKind::Refresh) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let access_token = state
        .store()
        .issue(&user_id, TokenKind::Access, ACCESS_TTL_SECS);
    Json(json!({ "success": true, "access_token": access_token })).into_response()
}

#[derive(Deserialize)]
struct ResetRequestBody {
    #[serde(default)]
    email: String,
}

/// The link would normally be mailed; like the development server, the
/// token is returned in the response.
async fn request_reset(
    State(state): State<AppState>,
    Json(body): Json<ResetRequestBody>,
) -> Response {
    state.enter("POST /api/auth/request-reset").await;
    if body.email.is_empty() {
        return error(StatusCode::BAD_REQUEST, "Email es requerido");
    }
    let mut store = state.store();
    let Some(user_id) = store.user_by_email(&body.email).map(|u| u.id.clone()) else {
        return error(StatusCode::NOT_FOUND, "No se encontró una cuenta con ese email");
    };
    let token = store.issue(&user_id, TokenKind::Reset, RESET_TTL_SECS);
    Json(json!({
        "success": true,
        "message": "Enlace de restablecimiento enviado",
        "token": token,
    }))
    .into_response()
}

#[derive(Deserialize)]
struct ResetBody {
    #[serde(default)]
    token: String,
    #[serde(default)]
    password: String,
}

async fn reset_password(State(state): State<AppState>, Json(body): Json<ResetBody>) -> Response {
    state.enter("POST /api/auth/reset-password").await;
    if body.token.is_empty() {
        return error(StatusCode::BAD_REQUEST, "Token es requerido");
    }
    if body.password.len() < 6 {
        return error(
            StatusCode::BAD_REQUEST,
            "La contraseña debe tener al menos 6 caracteres",
        );
    }

    let mut store = state.store();
    let user_id = match store.tokens.remove(&body.token) {
        Some(issued)
            if issued.kind == TokenKind::Reset && issued.exp > Utc::now().timestamp() =>
        {
            issued.user_id
        }
        _ => return error(StatusCode::BAD_REQUEST, "Token inválido o expirado"),
    };
    let Some(user) = store.user_mut(&user_id) else {
        return error(StatusCode::BAD_REQUEST, "No se pudo actualizar la contraseña");
    };
    user.password = body.password;
    Json(json!({ "success": true, "message": "Contraseña actualizada correctamente" }))
        .into_response()
}

async fn dashboard(State(state): State<AppState>, headers: HeaderMap) -> Response {
    state.enter("GET /api/dashboard").await;
    let user_id = match state.authenticate(&headers, TokenKind::Access) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let mut store = state.store();
    let Some(user) = store.user_mut(&user_id) else {
        return error(StatusCode::NOT_FOUND, "Usuario no encontrado");
    };
    Json(json!({
        "success": true,
        "user": {
            "id": user.id,
            "username": user.username,
            "email": user.email,
            "role": "user",
        }
    }))
    .into_response()
}

// -----------------------------------------------------------------------------
// Catalog
// -----------------------------------------------------------------------------

async fn list_products(State(state): State<AppState>) -> Response {
    state.enter("GET /api/products").await;
    Json(state.store().products.clone()).into_response()
}

async fn get_product(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    state.enter("GET /api/products/{id}").await;
    state.store().product(&id).cloned().map_or_else(
        || (StatusCode::NOT_FOUND, Json(json!({ "error": "Producto no encontrado" }))).into_response(),
        |product| Json(product).into_response(),
    )
}

/// `yerba-mate` becomes `Yerba Mate`.
fn title_case(slug: &str) -> String {
    slug.replace('-', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

async fn products_by_category(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    state.enter("GET /api/products/category/{name}").await;
    let category = title_case(&name);
    let products: Vec<ProductRef> = state
        .store()
        .products
        .iter()
        .filter(|p| {
            p.category
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(&category))
        })
        .cloned()
        .collect();
    Json(json!({ "category": category, "count": products.len(), "products": products }))
        .into_response()
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

async fn search_products(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Response {
    state.enter("GET /api/products/search").await;
    let needle = query.q.trim().to_lowercase();
    if needle.is_empty() {
        return Json(json!([])).into_response();
    }
    let products: Vec<ProductRef> = state
        .store()
        .products
        .iter()
        .filter(|p| {
            p.title.to_lowercase().contains(&needle)
                || p.description.to_lowercase().contains(&needle)
                || p.category
                    .as_deref()
                    .is_some_and(|c| c.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect();
    Json(products).into_response()
}

// -----------------------------------------------------------------------------
// Cart
// -----------------------------------------------------------------------------

async fn get_cart(State(state): State<AppState>, headers: HeaderMap) -> Response {
    state.enter("GET /api/cart").await;
    let user_id = match state.authenticate(&headers, TokenKind::Access) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let mut store = state.store();
    let lines = store
        .user_mut(&user_id)
        .map(|u| u.cart.clone())
        .unwrap_or_default();
    let items: Vec<Value> = lines
        .iter()
        .filter_map(|(id, quantity)| {
            store
                .product(id)
                .map(|product| json!({ "product": product, "quantity": quantity }))
        })
        .collect();
    Json(items).into_response()
}

#[derive(Deserialize)]
struct CartBody {
    #[serde(default)]
    product_id: String,
    #[serde(default)]
    quantity: Option<i64>,
}

async fn add_to_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CartBody>,
) -> Response {
    state.enter("POST /api/cart/add").await;
    let user_id = match state.authenticate(&headers, TokenKind::Access) {
        Ok(id) => id,
        Err(response) => return response,
    };
    if let Err(response) = state.mutation_guard() {
        return response;
    }
    let Ok(quantity) = u32::try_from(body.quantity.unwrap_or(1)) else {
        return error(StatusCode::BAD_REQUEST, "Cantidad inválida");
    };
    if quantity == 0 {
        return error(StatusCode::BAD_REQUEST, "Cantidad inválida");
    }

    let mut store = state.store();
    if store.product(&body.product_id).is_none() {
        return error(StatusCode::NOT_FOUND, "Producto no encontrado");
    }
    if let Some(user) = store.user_mut(&user_id) {
        add_line(&mut user.cart, &body.product_id, quantity);
    }
    Json(json!({ "message": "Producto agregado al carrito" })).into_response()
}

async fn update_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CartBody>,
) -> Response {
    state.enter("PUT /api/cart/update").await;
    let user_id = match state.authenticate(&headers, TokenKind::Access) {
        Ok(id) => id,
        Err(response) => return response,
    };
    if let Err(response) = state.mutation_guard() {
        return response;
    }
    let delta = body.quantity.unwrap_or(0);

    let mut store = state.store();
    let Some(user) = store.user_mut(&user_id) else {
        return error(StatusCode::NOT_FOUND, "Usuario no encontrado");
    };
    let Some(position) = user.cart.iter().position(|(id, _)| *id == body.product_id) else {
        return error(StatusCode::NOT_FOUND, "Producto no está en el carrito");
    };
    let current = user.cart.get(position).map_or(0, |(_, q)| i64::from(*q));
    match u32::try_from(current + delta) {
        Ok(0) | Err(_) => {
            user.cart.remove(position);
        }
        Ok(quantity) => {
            if let Some(line) = user.cart.get_mut(position) {
                line.1 = quantity;
            }
        }
    }
    Json(json!({ "message": "Carrito actualizado" })).into_response()
}

async fn remove_from_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    state.enter("DELETE /api/cart/remove/{id}").await;
    let user_id = match state.authenticate(&headers, TokenKind::Access) {
        Ok(id) => id,
        Err(response) => return response,
    };
    if let Err(response) = state.mutation_guard() {
        return response;
    }
    if let Some(user) = state.store().user_mut(&user_id) {
        user.cart.retain(|(product_id, _)| *product_id != id);
    }
    Json(json!({ "message": "Producto eliminado del carrito" })).into_response()
}

// -----------------------------------------------------------------------------
// Wishlist
// -----------------------------------------------------------------------------

async fn get_wishlist(State(state): State<AppState>, headers: HeaderMap) -> Response {
    state.enter("GET /api/wishlist").await;
    let user_id = match state.authenticate(&headers, TokenKind::Access) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let mut store = state.store();
    let ids = store
        .user_mut(&user_id)
        .map(|u| u.wishlist.clone())
        .unwrap_or_default();
    let products: Vec<ProductRef> = ids
        .iter()
        .filter_map(|id| store.product(id).cloned())
        .collect();
    Json(products).into_response()
}

#[derive(Deserialize)]
struct WishlistBody {
    #[serde(default)]
    product_id: String,
}

async fn add_to_wishlist(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<WishlistBody>,
) -> Response {
    state.enter("POST /api/wishlist/add").await;
    let user_id = match state.authenticate(&headers, TokenKind::Access) {
        Ok(id) => id,
        Err(response) => return response,
    };
    if let Err(response) = state.mutation_guard() {
        return response;
    }
    if body.product_id.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "product_id es requerido" })))
            .into_response();
    }
    if let Some(user) = state.store().user_mut(&user_id)
        && !user.wishlist.contains(&body.product_id)
    {
        user.wishlist.push(body.product_id);
    }
    Json(json!({ "success": true })).into_response()
}

async fn remove_from_wishlist(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    state.enter("DELETE /api/wishlist/remove/{id}").await;
    let user_id = match state.authenticate(&headers, TokenKind::Access) {
        Ok(id) => id,
        Err(response) => return response,
    };
    if let Err(response) = state.mutation_guard() {
        return response;
    }
    if let Some(user) = state.store().user_mut(&user_id) {
        user.wishlist.retain(|product_id| *product_id != id);
    }
    Json(json!({ "success": true })).into_response()
}

async fn check_wishlist(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    state.enter("GET /api/wishlist/check/{id}").await;
    let user_id = match state.authenticate(&headers, TokenKind::Access) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let in_wishlist = state
        .store()
        .user_mut(&user_id)
        .is_some_and(|u| u.wishlist.contains(&id));
    Json(json!({ "isInWishlist": in_wishlist })).into_response()
}

// -----------------------------------------------------------------------------
// Orders
// -----------------------------------------------------------------------------

async fn checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.enter("POST /api/orders/checkout").await;
    let user_id = match state.authenticate(&headers, TokenKind::Access) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let has_items = body
        .get("items")
        .and_then(Value::as_array)
        .is_some_and(|items| !items.is_empty());
    let (true, Value::Object(mut order)) = (has_items, body) else {
        return error(StatusCode::BAD_REQUEST, "Datos inválidos - items requeridos");
    };

    let order_id = Uuid::new_v4().simple().to_string();
    order.insert("_id".to_string(), json!(order_id));
    order.insert("status".to_string(), json!("pending"));
    order.insert(
        "created_at".to_string(),
        json!(Utc::now().naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string()),
    );

    let mut store = state.store();
    store
        .orders
        .insert(order_id.clone(), (user_id.clone(), Value::Object(order)));
    if let Some(user) = store.user_mut(&user_id) {
        user.cart.clear();
    }
    (
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "order_id": order_id,
            "message": "Orden creada exitosamente",
        })),
    )
        .into_response()
}

async fn get_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    state.enter("GET /api/orders/{id}").await;
    let user_id = match state.authenticate(&headers, TokenKind::Access) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let store = state.store();
    match store.orders.get(&id) {
        Some((owner, order)) if *owner == user_id => {
            Json(json!({ "success": true, "order": order })).into_response()
        }
        _ => error(StatusCode::NOT_FOUND, "Orden no encontrada"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case_slug() {
        assert_eq!(title_case("yerba-mate"), "Yerba Mate");
        assert_eq!(title_case("MATES"), "Mates");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_add_line_merges_quantities() {
        let mut cart = Vec::new();
        add_line(&mut cart, "a", 1);
        add_line(&mut cart, "a", 2);
        add_line(&mut cart, "b", 1);
        assert_eq!(cart, vec![("a".to_string(), 3), ("b".to_string(), 1)]);
    }
}
