//! # REST API
//!
//! Builds the axum router that exposes the store over HTTP. All endpoints
//! share application state through axum's `State` extractor.
//!
//! The calling principal is taken from the `x-principal` header. Writes lock
//! the store for the whole operation, including persisting the committed
//! events and snapshot, so the on-disk log never runs ahead of or behind the
//! in-memory ledger.
//!
//! ## Endpoints
//!
//! | Method | Path                         | Description                       |
//! |--------|------------------------------|-----------------------------------|
//! | GET    | `/health`                    | Liveness probe                    |
//! | GET    | `/status`                    | Ledger summary                    |
//! | GET    | `/products`                  | Listed products in key order      |
//! | POST   | `/products`                  | List or update a product (owner)  |
//! | DELETE | `/products/:key`             | Delist a product (owner)          |
//! | GET    | `/products/:key/price`       | Quoted price                      |
//! | POST   | `/purchases`                 | Buy a product                     |
//! | POST   | `/transfers`                 | Transfer reward tokens            |
//! | POST   | `/redemptions`               | Redeem reward tokens              |
//! | GET    | `/bonus-points`              | Caller's reward-token balance     |
//! | POST   | `/wallets/fund`              | Credit settlement currency (owner)|
//! | POST   | `/valid-callers`             | Allow a contract to mint (owner)  |
//! | DELETE | `/valid-callers/:contract`   | Revoke mint permission (owner)    |
//! | GET    | `/events?from=N&limit=M`     | Event log page                    |

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts, Path, Query, State},
    http::{request::Parts, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use cosmo_contracts::{parse_uint, ErrorKind, EventRecord, ProductStore, Receipt, StoreError};
use cosmo_protocol::config::MAX_EVENTS_PER_PAGE;
use cosmo_protocol::storage::{DbError, DbResult, LedgerDb};
use cosmo_protocol::Principal;

use crate::metrics::SharedMetrics;

/// Header carrying the calling principal.
pub const PRINCIPAL_HEADER: &str = "x-principal";

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// The ledger. One mutex is the whole mutual-exclusion domain.
    pub store: Arc<Mutex<ProductStore>>,
    /// Persistent event log and snapshots.
    pub db: LedgerDb,
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/products", get(products_handler).post(add_product_handler))
        .route("/products/:key", delete(delete_product_handler))
        .route("/products/:key/price", get(price_handler))
        .route("/purchases", post(buy_handler))
        .route("/transfers", post(transfer_handler))
        .route("/redemptions", post(redeem_handler))
        .route("/bonus-points", get(bonus_points_handler))
        .route("/wallets/fund", post(fund_wallet_handler))
        .route("/valid-callers", post(add_valid_caller_handler))
        .route("/valid-callers/:contract", delete(remove_valid_caller_handler))
        .route("/events", get(events_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error body returned by every endpoint on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error kind, e.g. `insufficient_stock`, or `internal`.
    pub error: String,
    /// Numeric result code (`err uN`); 500 for node failures.
    pub code: u64,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// The ledger aborted the operation.
    Store(StoreError),
    /// The request never reached the ledger.
    BadRequest(String),
    MissingPrincipal,
    /// The operation committed in memory but could not be persisted.
    Persistence(DbError),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

/// HTTP status for a ledger error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::InsufficientStock => StatusCode::CONFLICT,
        ErrorKind::InsufficientFunds | ErrorKind::InsufficientBalance => {
            StatusCode::PAYMENT_REQUIRED
        }
        ErrorKind::InsufficientEscrow => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Store(e) => (
                status_for(e.kind()),
                ErrorResponse {
                    error: e.kind().to_string(),
                    code: e.code(),
                    message: e.to_string(),
                },
            ),
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: ErrorKind::InvalidArgument.to_string(),
                    code: u64::from(StatusCode::BAD_REQUEST.as_u16()),
                    message,
                },
            ),
            ApiError::MissingPrincipal => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse {
                    error: ErrorKind::Unauthorized.to_string(),
                    code: u64::from(StatusCode::UNAUTHORIZED.as_u16()),
                    message: format!("missing or invalid {PRINCIPAL_HEADER} header"),
                },
            ),
            ApiError::Persistence(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: "internal".into(),
                    code: 500,
                    message: format!("failed to persist ledger: {e}"),
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Extractors and Request Types
// ---------------------------------------------------------------------------

/// The principal named by the `x-principal` header.
#[derive(Debug, Clone)]
pub struct Caller(pub Principal);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(PRINCIPAL_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| Principal::new(raw.trim()).ok())
            .map(Caller)
            .ok_or(ApiError::MissingPrincipal)
    }
}

/// An unsigned amount as sent by clients: a JSON number, or a string in
/// decimal or `u`-prefixed form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UintArg {
    Number(u64),
    Text(String),
    Other(serde_json::Value),
}

impl UintArg {
    fn resolve(&self, field: &str) -> Result<u64, StoreError> {
        match self {
            UintArg::Number(n) => Ok(*n),
            UintArg::Text(raw) => Ok(parse_uint(field, raw)?),
            UintArg::Other(value) => Err(StoreError::InvalidArgument(format!(
                "{field} must be a non-negative integer, got {value}"
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddProductRequest {
    pub key: String,
    pub quantity: UintArg,
    pub unit_price: UintArg,
}

#[derive(Debug, Deserialize)]
pub struct BuyRequest {
    pub key: String,
    pub quantity: UintArg,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub amount: UintArg,
    pub recipient: Principal,
}

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub amount: UintArg,
}

#[derive(Debug, Deserialize)]
pub struct FundWalletRequest {
    pub holder: Principal,
    pub amount: UintArg,
}

#[derive(Debug, Deserialize)]
pub struct ValidCallerRequest {
    pub contract: Principal,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub from: u64,
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub owner: String,
    pub store: String,
    pub reward_rate: u64,
    /// Reward token asset identifier.
    pub asset: String,
    pub products: usize,
    pub escrow_total: u64,
    pub token_supply: u64,
    pub event_count: usize,
    /// Records in the database; trails `event_count` only after a failed write.
    pub persisted_events: usize,
    /// Hex digest of the newest record, absent for an empty log.
    pub head_digest: Option<String>,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProductEntry {
    pub key: String,
    pub stock: u64,
    pub unit_price: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PriceResponse {
    pub key: String,
    pub price: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BonusPointsResponse {
    pub holder: String,
    pub balance: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventsResponse {
    pub from: u64,
    pub events: Vec<EventRecord>,
}

// ---------------------------------------------------------------------------
// Commit Path
// ---------------------------------------------------------------------------

/// Writes every record the database does not hold yet, then the current
/// snapshot, in one transaction.
///
/// The database only ever lags the in-memory log, so catching up from its
/// last sequence also repairs a gap left by an earlier failed write.
pub fn persist(db: &LedgerDb, store: &ProductStore) -> DbResult<()> {
    let from = db.last_sequence()?.map_or(0, |seq| seq + 1);
    let keyed: Vec<(u64, &EventRecord)> = store
        .events()
        .since(from)
        .iter()
        .map(|r| (r.seq, r))
        .collect();
    db.commit(&keyed, &store.snapshot())
}

/// Runs one write against the store under the lock, records metrics, and
/// persists the outcome before releasing the lock.
fn apply<F>(state: &AppState, operation: &'static str, f: F) -> Result<Receipt, ApiError>
where
    F: FnOnce(&mut ProductStore) -> Result<Receipt, StoreError>,
{
    let timer = state
        .metrics
        .operation_latency_seconds
        .with_label_values(&[operation])
        .start_timer();
    let mut store = state.store.lock();

    let receipt = match f(&mut store) {
        Ok(receipt) => receipt,
        Err(e) => {
            state
                .metrics
                .operations_aborted_total
                .with_label_values(&[operation, e.kind().as_str()])
                .inc();
            return Err(e.into());
        }
    };
    state
        .metrics
        .operations_committed_total
        .with_label_values(&[operation])
        .inc();

    if let Err(e) = persist(&state.db, &store) {
        tracing::error!(operation, error = %e, "committed operation was not persisted");
        return Err(ApiError::Persistence(e));
    }
    state.metrics.observe_store(&store);
    timer.observe_duration();
    Ok(receipt)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: 200 while the process is up.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.lock();
    let events = store.events();
    let resp = StatusResponse {
        version: state.version.clone(),
        owner: store.config().owner.to_string(),
        store: store.principal().to_string(),
        reward_rate: store.config().reward_rate,
        asset: store.state().token.asset().to_string(),
        products: store.state().catalog.iter().count(),
        escrow_total: store.escrow_total(),
        token_supply: store.token_supply(),
        event_count: events.len(),
        persisted_events: state.db.event_count(),
        head_digest: events.records().last().map(|r| r.digest.clone()),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    Json(resp)
}

/// `GET /products`: the catalog in key order.
async fn products_handler(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.lock();
    let products: Vec<ProductEntry> = store
        .state()
        .catalog
        .iter()
        .map(|(key, product)| ProductEntry {
            key: key.to_string(),
            stock: product.stock,
            unit_price: product.unit_price,
        })
        .collect();
    Json(products)
}

async fn add_product_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    body: Result<Json<AddProductRequest>, JsonRejection>,
) -> Result<Json<Receipt>, ApiError> {
    let Json(req) = body?;
    let quantity = req.quantity.resolve("quantity")?;
    let unit_price = req.unit_price.resolve("unit_price")?;
    apply(&state, "add_product", |store| {
        store.add_product(&caller, &req.key, quantity, unit_price)
    })
    .map(Json)
}

async fn delete_product_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(key): Path<String>,
) -> Result<Json<Receipt>, ApiError> {
    apply(&state, "delete_product", |store| {
        store.delete_product(&caller, &key)
    })
    .map(Json)
}

async fn price_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<PriceResponse>, ApiError> {
    let price = state.store.lock().get_product_price(&key)?;
    Ok(Json(PriceResponse { key, price }))
}

async fn buy_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    body: Result<Json<BuyRequest>, JsonRejection>,
) -> Result<Json<Receipt>, ApiError> {
    let Json(req) = body?;
    let quantity = req.quantity.resolve("quantity")?;
    apply(&state, "buy_product", |store| {
        store.buy_product(&caller, &req.key, quantity)
    })
    .map(Json)
}

async fn transfer_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Json<Receipt>, ApiError> {
    let Json(req) = body?;
    let amount = req.amount.resolve("amount")?;
    apply(&state, "transfer_reward_tokens", |store| {
        store.transfer_reward_tokens(&caller, amount, &req.recipient)
    })
    .map(Json)
}

async fn redeem_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    body: Result<Json<RedeemRequest>, JsonRejection>,
) -> Result<Json<Receipt>, ApiError> {
    let Json(req) = body?;
    let amount = req.amount.resolve("amount")?;
    apply(&state, "redeem_reward_tokens", |store| {
        store.redeem_reward_tokens(&caller, amount)
    })
    .map(Json)
}

async fn bonus_points_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> impl IntoResponse {
    let balance = state.store.lock().get_bonus_points_count(&caller);
    Json(BonusPointsResponse {
        holder: caller.to_string(),
        balance,
    })
}

async fn fund_wallet_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    body: Result<Json<FundWalletRequest>, JsonRejection>,
) -> Result<Json<Receipt>, ApiError> {
    let Json(req) = body?;
    let amount = req.amount.resolve("amount")?;
    apply(&state, "fund_wallet", |store| {
        store.fund_wallet(&caller, &req.holder, amount)
    })
    .map(Json)
}

async fn add_valid_caller_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    body: Result<Json<ValidCallerRequest>, JsonRejection>,
) -> Result<Json<Receipt>, ApiError> {
    let Json(req) = body?;
    apply(&state, "add_valid_contract_caller", |store| {
        store.add_valid_contract_caller(&caller, &req.contract)
    })
    .map(Json)
}

async fn remove_valid_caller_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(contract): Path<String>,
) -> Result<Json<Receipt>, ApiError> {
    let contract = Principal::new(contract)
        .map_err(|e| ApiError::BadRequest(format!("contract: {e}")))?;
    apply(&state, "remove_valid_contract_caller", |store| {
        store.remove_valid_contract_caller(&caller, &contract)
    })
    .map(Json)
}

/// `GET /events`: a page of the log starting at sequence `from`.
async fn events_handler(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    let limit = query
        .limit
        .unwrap_or(MAX_EVENTS_PER_PAGE)
        .min(MAX_EVENTS_PER_PAGE);
    let store = state.store.lock();
    let events = store
        .events()
        .since(query.from)
        .iter()
        .take(limit)
        .cloned()
        .collect();
    Json(EventsResponse {
        from: query.from,
        events,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
