use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Router,
    extract::{Json, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::core::{
    AccountBalance, AccountKind, BalanceEntry, GlideError, GlideWaypoint, IncomeKind, IncomeSource,
    NewAccount, NewIncomeSource, NewPerson, NewProperty, PensionProjection, Person, Property,
    oldest_person, pension_projections, recommended_glide_path,
};
use crate::store::{Store, StoreError};

const DEFAULT_RETIREMENT_AGE: u32 = 65;

#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<Store>>,
}

impl AppState {
    fn new(store: Store) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().expect("store mutex poisoned")
    }
}

#[derive(Debug, Error)]
enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            StoreError::Allocation(_) | StoreError::Invalid(_) => {
                ApiError::Validation(err.to_string())
            }
            StoreError::Sqlite(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<GlideError> for ApiError {
    fn from(err: GlideError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        error_response(status, &self.to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PersonPayload {
    name: Option<String>,
    birth_year: Option<i32>,
    pension_claim_age: Option<u32>,
    oas_residence_years: Option<u32>,
    sort_order: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AccountPayload {
    person_id: Option<i64>,
    name: Option<String>,
    kind: Option<AccountKind>,
    equity_pct: Option<f64>,
    fixed_income_pct: Option<f64>,
    cash_pct: Option<f64>,
    sort_order: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AllocationPayload {
    equity_pct: Option<f64>,
    fixed_income_pct: Option<f64>,
    cash_pct: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct BalancePayload {
    recorded_on: Option<NaiveDate>,
    balance: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct BulkBalancePayload {
    recorded_on: Option<NaiveDate>,
    entries: Vec<BulkBalanceEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct BulkBalanceEntry {
    account_id: Option<i64>,
    balance: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ReturnPayload {
    year: Option<i32>,
    return_pct: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct IncomeSourcePayload {
    person_id: Option<i64>,
    name: Option<String>,
    kind: Option<IncomeKind>,
    annual_amount: Option<f64>,
    starts_year: Option<i32>,
    ends_year: Option<i32>,
    sort_order: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PropertyPayload {
    name: Option<String>,
    estimated_value: Option<f64>,
    mortgage_balance: Option<f64>,
    sort_order: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct GlidePathPayload {
    waypoints: Vec<WaypointPayload>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WaypointPayload {
    year: Option<i32>,
    equity_pct: Option<f64>,
    fixed_income_pct: Option<f64>,
    cash_pct: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RecommendedGlideQuery {
    birth_year: Option<i32>,
    retirement_age: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PersonFilter {
    person_id: Option<i64>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecommendedGlideResponse {
    birth_year: i32,
    retirement_age: u32,
    current_year: i32,
    waypoints: Vec<GlideWaypoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardResponse {
    as_of_year: i32,
    investable_assets: f64,
    property_value: f64,
    mortgage_debt: f64,
    property_equity: f64,
    net_worth: f64,
    annual_income: f64,
    accounts: Vec<AccountBalance>,
    properties: Vec<Property>,
    pensions: Vec<PensionProjection>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn required_name(name: Option<String>) -> Result<String, String> {
    let name = name.map(|n| n.trim().to_string()).unwrap_or_default();
    if name.is_empty() {
        return Err("name must not be empty".to_string());
    }
    Ok(name)
}

fn build_person(payload: PersonPayload) -> Result<NewPerson, String> {
    let name = required_name(payload.name)?;

    if let Some(year) = payload.birth_year {
        if !(1900..=2100).contains(&year) {
            return Err("birthYear must be between 1900 and 2100".to_string());
        }
    }

    if let Some(age) = payload.pension_claim_age {
        if !(55..=80).contains(&age) {
            return Err("pensionClaimAge must be between 55 and 80".to_string());
        }
    }

    if let Some(years) = payload.oas_residence_years {
        if years > 60 {
            return Err("oasResidenceYears must be at most 60".to_string());
        }
    }

    Ok(NewPerson {
        name,
        birth_year: payload.birth_year,
        pension_claim_age: payload.pension_claim_age,
        oas_residence_years: payload.oas_residence_years,
        sort_order: payload.sort_order.unwrap_or(0),
    })
}

fn build_account(payload: AccountPayload) -> Result<NewAccount, String> {
    let Some(person_id) = payload.person_id else {
        return Err("personId is required".to_string());
    };
    let name = required_name(payload.name)?;

    Ok(NewAccount {
        person_id,
        name,
        kind: payload.kind.unwrap_or(AccountKind::Other),
        equity_pct: payload.equity_pct.unwrap_or(0.0),
        fixed_income_pct: payload.fixed_income_pct.unwrap_or(0.0),
        cash_pct: payload.cash_pct.unwrap_or(0.0),
        sort_order: payload.sort_order.unwrap_or(0),
    })
}

fn build_balance(payload: BalancePayload) -> Result<(NaiveDate, f64), String> {
    let Some(recorded_on) = payload.recorded_on else {
        return Err("recordedOn is required (YYYY-MM-DD)".to_string());
    };
    let Some(balance) = payload.balance else {
        return Err("balance is required".to_string());
    };
    if !balance.is_finite() {
        return Err("balance must be a finite number".to_string());
    }
    Ok((recorded_on, balance))
}

fn build_balance_batch(
    payload: BulkBalancePayload,
) -> Result<(NaiveDate, Vec<BalanceEntry>), String> {
    let Some(recorded_on) = payload.recorded_on else {
        return Err("recordedOn is required (YYYY-MM-DD)".to_string());
    };
    if payload.entries.is_empty() {
        return Err("entries must not be empty".to_string());
    }

    let mut entries = Vec::with_capacity(payload.entries.len());
    for entry in payload.entries {
        let Some(account_id) = entry.account_id else {
            return Err("every entry needs an accountId".to_string());
        };
        let Some(balance) = entry.balance else {
            return Err(format!("entry for account {account_id} needs a balance"));
        };
        if !balance.is_finite() {
            return Err(format!(
                "balance for account {account_id} must be a finite number"
            ));
        }
        entries.push(BalanceEntry {
            account_id,
            balance,
        });
    }
    Ok((recorded_on, entries))
}

fn build_return(payload: ReturnPayload) -> Result<(i32, f64), String> {
    let Some(year) = payload.year else {
        return Err("year is required".to_string());
    };
    if !(1900..=2100).contains(&year) {
        return Err("year must be between 1900 and 2100".to_string());
    }
    let Some(return_pct) = payload.return_pct else {
        return Err("returnPct is required".to_string());
    };
    if !return_pct.is_finite() || !(-100.0..=1000.0).contains(&return_pct) {
        return Err("returnPct must be between -100 and 1000".to_string());
    }
    Ok((year, return_pct))
}

fn build_income_source(payload: IncomeSourcePayload) -> Result<NewIncomeSource, String> {
    let Some(person_id) = payload.person_id else {
        return Err("personId is required".to_string());
    };
    let name = required_name(payload.name)?;

    let annual_amount = payload.annual_amount.unwrap_or(0.0);
    if !annual_amount.is_finite() || annual_amount < 0.0 {
        return Err("annualAmount must be >= 0".to_string());
    }

    if let (Some(starts), Some(ends)) = (payload.starts_year, payload.ends_year) {
        if ends < starts {
            return Err("endsYear must be >= startsYear".to_string());
        }
    }

    Ok(NewIncomeSource {
        person_id,
        name,
        kind: payload.kind.unwrap_or(IncomeKind::Other),
        annual_amount,
        starts_year: payload.starts_year,
        ends_year: payload.ends_year,
        sort_order: payload.sort_order.unwrap_or(0),
    })
}

fn build_property(payload: PropertyPayload) -> Result<NewProperty, String> {
    let name = required_name(payload.name)?;

    let estimated_value = payload.estimated_value.unwrap_or(0.0);
    let mortgage_balance = payload.mortgage_balance.unwrap_or(0.0);
    for (field, value) in [
        ("estimatedValue", estimated_value),
        ("mortgageBalance", mortgage_balance),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(format!("{field} must be >= 0"));
        }
    }

    Ok(NewProperty {
        name,
        estimated_value,
        mortgage_balance,
        sort_order: payload.sort_order.unwrap_or(0),
    })
}

fn build_waypoints(payload: GlidePathPayload) -> Result<Vec<GlideWaypoint>, String> {
    let mut waypoints = Vec::with_capacity(payload.waypoints.len());
    for waypoint in payload.waypoints {
        let Some(year) = waypoint.year else {
            return Err("every waypoint needs a year".to_string());
        };
        if !(1900..=2150).contains(&year) {
            return Err(format!("waypoint year {year} must be between 1900 and 2150"));
        }
        waypoints.push(GlideWaypoint {
            year,
            equity_pct: waypoint.equity_pct.unwrap_or(0.0),
            fixed_income_pct: waypoint.fixed_income_pct.unwrap_or(0.0),
            cash_pct: waypoint.cash_pct.unwrap_or(0.0),
        });
    }
    Ok(waypoints)
}

fn resolve_recommended_params(
    query: &RecommendedGlideQuery,
    people: &[Person],
) -> Result<(i32, u32), String> {
    let birth_year = match query.birth_year {
        Some(year) => year,
        None => match oldest_person(people).and_then(|person| person.birth_year) {
            Some(year) => year,
            None => {
                return Err("no birthYear given and no person on file has one".to_string());
            }
        },
    };
    if !(1900..=2100).contains(&birth_year) {
        return Err("birthYear must be between 1900 and 2100".to_string());
    }

    let retirement_age = query.retirement_age.unwrap_or(DEFAULT_RETIREMENT_AGE);
    if retirement_age > 120 {
        return Err("retirementAge must be at most 120".to_string());
    }

    Ok((birth_year, retirement_age))
}

fn build_dashboard(
    year: i32,
    people: Vec<Person>,
    accounts: Vec<AccountBalance>,
    properties: Vec<Property>,
    income_sources: Vec<IncomeSource>,
) -> DashboardResponse {
    let investable_assets: f64 = accounts.iter().map(|account| account.balance).sum();
    let property_value: f64 = properties.iter().map(|p| p.estimated_value).sum();
    let mortgage_debt: f64 = properties.iter().map(|p| p.mortgage_balance).sum();
    let property_equity = property_value - mortgage_debt;
    let annual_income: f64 = income_sources
        .iter()
        .filter(|source| source.active_in(year))
        .map(|source| source.annual_amount)
        .sum();
    let pensions = pension_projections(&people, year);

    DashboardResponse {
        as_of_year: year,
        investable_assets,
        property_value,
        mortgage_debt,
        property_equity,
        net_worth: investable_assets + property_equity,
        annual_income,
        accounts,
        properties,
        pensions,
    }
}

fn current_year() -> i32 {
    Utc::now().year()
}

pub async fn run_http_server(port: u16, db_path: &std::path::Path) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nestegg=debug,tower_http=debug".into()),
        )
        .init();

    let store = Store::open(db_path)?;
    let state = AppState::new(store);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("listening on http://{addr}");

    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_handler))
        .route(
            "/api/people",
            get(list_people_handler).post(create_person_handler),
        )
        .route(
            "/api/people/:id",
            put(update_person_handler).delete(delete_person_handler),
        )
        .route(
            "/api/accounts",
            get(list_accounts_handler).post(create_account_handler),
        )
        .route(
            "/api/accounts/:id",
            put(update_account_handler).delete(delete_account_handler),
        )
        .route("/api/accounts/:id/allocation", put(set_allocation_handler))
        .route(
            "/api/accounts/:id/balances",
            get(list_balances_handler).post(record_balance_handler),
        )
        .route("/api/balances/bulk", post(record_balances_bulk_handler))
        .route("/api/balances/:id", delete(delete_balance_handler))
        .route(
            "/api/accounts/:id/returns",
            get(list_returns_handler).post(record_return_handler),
        )
        .route("/api/returns/:id", delete(delete_return_handler))
        .route(
            "/api/income-sources",
            get(list_income_sources_handler).post(create_income_source_handler),
        )
        .route(
            "/api/income-sources/:id",
            put(update_income_source_handler).delete(delete_income_source_handler),
        )
        .route(
            "/api/properties",
            get(list_properties_handler).post(create_property_handler),
        )
        .route(
            "/api/properties/:id",
            put(update_property_handler).delete(delete_property_handler),
        )
        .route(
            "/api/glide-path",
            get(get_glide_path_handler).put(put_glide_path_handler),
        )
        .route(
            "/api/glide-path/recommended",
            get(recommended_glide_path_handler),
        )
        .route("/api/pensions", get(pensions_handler))
        .route("/api/dashboard", get(dashboard_handler))
        .fallback(not_found_handler)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn list_people_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let people = state.store().list_people()?;
    Ok(json_response(StatusCode::OK, people))
}

async fn create_person_handler(
    State(state): State<AppState>,
    Json(payload): Json<PersonPayload>,
) -> Result<Response, ApiError> {
    let person = build_person(payload).map_err(ApiError::Validation)?;
    let created = state.store().create_person(&person)?;
    Ok(json_response(StatusCode::CREATED, created))
}

async fn update_person_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<PersonPayload>,
) -> Result<Response, ApiError> {
    let person = build_person(payload).map_err(ApiError::Validation)?;
    let updated = state.store().update_person(id, &person)?;
    Ok(json_response(StatusCode::OK, updated))
}

async fn delete_person_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    state.store().delete_person(id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn list_accounts_handler(
    State(state): State<AppState>,
    Query(filter): Query<PersonFilter>,
) -> Result<Response, ApiError> {
    let accounts = state.store().list_accounts(filter.person_id)?;
    Ok(json_response(StatusCode::OK, accounts))
}

async fn create_account_handler(
    State(state): State<AppState>,
    Json(payload): Json<AccountPayload>,
) -> Result<Response, ApiError> {
    let account = build_account(payload).map_err(ApiError::Validation)?;
    let created = state.store().create_account(&account)?;
    Ok(json_response(StatusCode::CREATED, created))
}

async fn update_account_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<AccountPayload>,
) -> Result<Response, ApiError> {
    let account = build_account(payload).map_err(ApiError::Validation)?;
    let updated = state.store().update_account(id, &account)?;
    Ok(json_response(StatusCode::OK, updated))
}

async fn delete_account_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    state.store().delete_account(id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn set_allocation_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<AllocationPayload>,
) -> Result<Response, ApiError> {
    let account = state.store().set_account_allocation(
        id,
        payload.equity_pct.unwrap_or(0.0),
        payload.fixed_income_pct.unwrap_or(0.0),
        payload.cash_pct.unwrap_or(0.0),
    )?;
    Ok(json_response(StatusCode::OK, account))
}

async fn list_balances_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let balances = state.store().list_balances(id)?;
    Ok(json_response(StatusCode::OK, balances))
}

async fn record_balance_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<BalancePayload>,
) -> Result<Response, ApiError> {
    let (recorded_on, balance) = build_balance(payload).map_err(ApiError::Validation)?;
    let snapshot = state.store().record_balance(id, recorded_on, balance)?;
    Ok(json_response(StatusCode::CREATED, snapshot))
}

async fn record_balances_bulk_handler(
    State(state): State<AppState>,
    Json(payload): Json<BulkBalancePayload>,
) -> Result<Response, ApiError> {
    let (recorded_on, entries) = build_balance_batch(payload).map_err(ApiError::Validation)?;
    let mut store = state.store();
    let recorded = store.record_balances_bulk(recorded_on, &entries)?;
    Ok(json_response(StatusCode::CREATED, recorded))
}

async fn delete_balance_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    state.store().delete_balance(id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn list_returns_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let returns = state.store().list_returns(id)?;
    Ok(json_response(StatusCode::OK, returns))
}

async fn record_return_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<ReturnPayload>,
) -> Result<Response, ApiError> {
    let (year, return_pct) = build_return(payload).map_err(ApiError::Validation)?;
    let entry = state.store().record_return(id, year, return_pct)?;
    Ok(json_response(StatusCode::CREATED, entry))
}

async fn delete_return_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    state.store().delete_return(id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn list_income_sources_handler(
    State(state): State<AppState>,
    Query(filter): Query<PersonFilter>,
) -> Result<Response, ApiError> {
    let sources = state.store().list_income_sources(filter.person_id)?;
    Ok(json_response(StatusCode::OK, sources))
}

async fn create_income_source_handler(
    State(state): State<AppState>,
    Json(payload): Json<IncomeSourcePayload>,
) -> Result<Response, ApiError> {
    let source = build_income_source(payload).map_err(ApiError::Validation)?;
    let created = state.store().create_income_source(&source)?;
    Ok(json_response(StatusCode::CREATED, created))
}

async fn update_income_source_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<IncomeSourcePayload>,
) -> Result<Response, ApiError> {
    let source = build_income_source(payload).map_err(ApiError::Validation)?;
    let updated = state.store().update_income_source(id, &source)?;
    Ok(json_response(StatusCode::OK, updated))
}

async fn delete_income_source_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    state.store().delete_income_source(id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn list_properties_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let properties = state.store().list_properties()?;
    Ok(json_response(StatusCode::OK, properties))
}

async fn create_property_handler(
    State(state): State<AppState>,
    Json(payload): Json<PropertyPayload>,
) -> Result<Response, ApiError> {
    let property = build_property(payload).map_err(ApiError::Validation)?;
    let created = state.store().create_property(&property)?;
    Ok(json_response(StatusCode::CREATED, created))
}

async fn update_property_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<PropertyPayload>,
) -> Result<Response, ApiError> {
    let property = build_property(payload).map_err(ApiError::Validation)?;
    let updated = state.store().update_property(id, &property)?;
    Ok(json_response(StatusCode::OK, updated))
}

async fn delete_property_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    state.store().delete_property(id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn get_glide_path_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let waypoints = state.store().list_glide_waypoints()?;
    Ok(json_response(StatusCode::OK, waypoints))
}

async fn put_glide_path_handler(
    State(state): State<AppState>,
    Json(payload): Json<GlidePathPayload>,
) -> Result<Response, ApiError> {
    let waypoints = build_waypoints(payload).map_err(ApiError::Validation)?;
    let mut store = state.store();
    let stored = store.replace_glide_waypoints(&waypoints)?;
    Ok(json_response(StatusCode::OK, stored))
}

async fn recommended_glide_path_handler(
    State(state): State<AppState>,
    Query(query): Query<RecommendedGlideQuery>,
) -> Result<Response, ApiError> {
    let people = state.store().list_people()?;
    let (birth_year, retirement_age) =
        resolve_recommended_params(&query, &people).map_err(ApiError::Validation)?;
    let year = current_year();
    let waypoints = recommended_glide_path(birth_year, retirement_age, year)?;
    Ok(json_response(
        StatusCode::OK,
        RecommendedGlideResponse {
            birth_year,
            retirement_age,
            current_year: year,
            waypoints,
        },
    ))
}

async fn pensions_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let people = state.store().list_people()?;
    let projections = pension_projections(&people, current_year());
    Ok(json_response(StatusCode::OK, projections))
}

async fn dashboard_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let year = current_year();
    let store = state.store();
    let people = store.list_people()?;
    let accounts = store.latest_account_balances()?;
    let properties = store.list_properties()?;
    let income_sources = store.list_income_sources(None)?;
    drop(store);

    let dashboard = build_dashboard(year, people, accounts, properties, income_sources);
    Ok(json_response(StatusCode::OK, dashboard))
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
