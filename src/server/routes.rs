use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use crate::catalog::{FavoritesService, StoreDetail, StorePage, StoreRepository};
use crate::config::StoremapConfig;
use crate::query::{GeoIndex, GeoQuery, NearbyStore, RankedStore, RatingAggregator, SearchIndex, TagAggregator, TagPage};
use crate::server::AppState;
use crate::storage::SqliteStore;
use crate::store::{NewStore, Store, StoreId, StorePatch};
use crate::{Error, FieldError};

/// Header carrying the authenticated user's id
pub const USER_HEADER: &str = "x-user-id";

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Deserialize)]
pub struct NearParams {
    #[serde(default)]
    pub lat: String,
    #[serde(default)]
    pub lng: String,
}

#[derive(Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

#[derive(Serialize)]
pub struct HeartsResponse {
    pub hearts: BTreeSet<StoreId>,
}

/// Failure of a request, rendered as a JSON error body
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] Error),

    #[error("Missing x-user-id header")]
    Unauthenticated,

    #[error("Malformed request body")]
    Body(#[from] JsonRejection),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Core(Error::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Core(Error::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Core(Error::Authorization(_)) => StatusCode::FORBIDDEN,
            Self::Core(Error::Conflict(_)) => StatusCode::CONFLICT,
            Self::Core(Error::OutOfRange { last_page }) => {
                let location = format!("/api/stores?page={}", last_page);
                return match HeaderValue::from_str(&location) {
                    Ok(value) => (StatusCode::TEMPORARY_REDIRECT, [(header::LOCATION, value)]).into_response(),
                    Err(_) => StatusCode::NOT_FOUND.into_response(),
                };
            }
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Body(rejection) => rejection.status(),
            Self::Core(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Don't expose storage details to clients
        let error = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        let fields = match &self {
            Self::Core(e) => e.field_errors().to_vec(),
            Self::Body(rejection) => vec![FieldError {
                field: "body".to_string(),
                message: rejection.body_text(),
            }],
            _ => Vec::new(),
        };

        (status, Json(ErrorResponse { error, fields })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Run one catalog call on the blocking pool against a fresh connection
async fn with_db<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&SqliteStore, &StoremapConfig) -> crate::Result<T> + Send + 'static,
{
    let path = state.database_path.clone();
    let config = state.config.clone();
    tokio::task::spawn_blocking(move || {
        let db = SqliteStore::open_with_timeout(&path, config.busy_timeout())?;
        f(&db, &config)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?
    .map_err(ApiError::from)
}

fn user_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ApiError::Unauthenticated)
}

/// Ids in paths that don't parse can't name a store
fn parse_store_id(key: &str) -> Result<StoreId, ApiError> {
    key.parse().map_err(|_| ApiError::Core(Error::not_found("store", key)))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Vec<Store>> {
    let stores = with_db(&state, move |db, config| {
        SearchIndex::new(db).with_limit(config.search_limit).search(&params.q)
    })
    .await?;
    Ok(Json(stores))
}

pub async fn nearby(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NearParams>,
) -> ApiResult<Vec<NearbyStore>> {
    let stores = with_db(&state, move |db, config| {
        let query = GeoQuery::parse(&params.lat, &params.lng)?
            .with_max_distance(config.nearby_max_distance_m)?
            .with_limit(config.nearby_limit);
        GeoIndex::new(db).query(&query)
    })
    .await?;
    Ok(Json(stores))
}

pub async fn list_stores(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PageParams>,
) -> ApiResult<StorePage> {
    let page = with_db(&state, move |db, config| {
        StoreRepository::new(db)
            .with_page_size(config.page_size)
            .list_page(params.page.unwrap_or(1))
    })
    .await?;
    Ok(Json(page))
}

pub async fn get_store(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> ApiResult<StoreDetail> {
    let detail = with_db(&state, move |db, _| StoreRepository::new(db).get_by_slug(&slug)).await?;
    Ok(Json(detail))
}

pub async fn create_store(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<NewStore>, JsonRejection>,
) -> Result<(StatusCode, Json<Store>), ApiError> {
    let author_id = user_id(&headers)?;
    let Json(mut input) = payload?;
    input.author_id = author_id;
    let store = with_db(&state, move |db, _| StoreRepository::new(db).create(input)).await?;
    Ok((StatusCode::CREATED, Json(store)))
}

pub async fn update_store(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<StorePatch>, JsonRejection>,
) -> ApiResult<Store> {
    let requester = user_id(&headers)?;
    let id = parse_store_id(&key)?;
    let Json(patch) = payload?;
    let store = with_db(&state, move |db, _| StoreRepository::new(db).update(id, patch, &requester)).await?;
    Ok(Json(store))
}

pub async fn toggle_heart(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> ApiResult<HeartsResponse> {
    let user = user_id(&headers)?;
    let id = parse_store_id(&key)?;
    let hearts = with_db(&state, move |db, _| FavoritesService::new(db).toggle_heart(&user, id)).await?;
    Ok(Json(HeartsResponse { hearts }))
}

pub async fn hearts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Vec<Store>> {
    let user = user_id(&headers)?;
    let stores = with_db(&state, move |db, _| FavoritesService::new(db).list_hearted(&user)).await?;
    Ok(Json(stores))
}

pub async fn tags(State(state): State<Arc<AppState>>) -> ApiResult<TagPage> {
    let page = with_db(&state, |db, _| TagAggregator::new(db).tag_page(None)).await?;
    Ok(Json(page))
}

pub async fn tag(
    State(state): State<Arc<AppState>>,
    Path(tag): Path<String>,
) -> ApiResult<TagPage> {
    let page = with_db(&state, move |db, _| TagAggregator::new(db).tag_page(Some(tag.as_str()))).await?;
    Ok(Json(page))
}

pub async fn top(State(state): State<Arc<AppState>>) -> ApiResult<Vec<RankedStore>> {
    let ranked = with_db(&state, |db, config| RatingAggregator::new(db).top_rated(config.top_limit)).await?;
    Ok(Json(ranked))
}
