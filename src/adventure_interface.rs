// Adventure HTTP interface - thin handlers over the adventure services
// Each handler resolves its inputs, calls one service operation and lets
// `AppError` pick the status code.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::header,
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::{
    app_state::AppState,
    core::AdventureId,
    error::{AppError, AppResult},
    infrastructure::{
        database::{AdventureFilter, Page},
        middleware::{viewer_context_middleware, AppJson, Vc},
    },
    models::{Adventure, AdventureListing, Category, NodeStat, Report, ReportRequest},
};

#[derive(Debug, Deserialize)]
pub struct MediaUploadQuery {
    pub slug: String,
    pub filename: String,
}

#[derive(Debug, Deserialize)]
pub struct ReportsQuery {
    #[serde(default)]
    pub handled: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReportHandledRequest {
    pub handled: bool,
}

#[derive(Debug, Deserialize)]
pub struct StatisticsRequest {
    pub adventure_id: i64,
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
}

/// Admin listing filter; exactly one of `category`, `search` or `reason`
#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub category: Option<i64>,
    pub search: Option<String>,
    pub reason: Option<String>,
    pub page_size: Option<i64>,
    pub page_index: Option<i64>,
}

impl ListingQuery {
    fn into_parts(self) -> AppResult<(AdventureFilter, Page)> {
        let page = Page::new(self.page_size, self.page_index);
        let filter = match (self.category, self.search, self.reason) {
            (Some(category), None, None) => AdventureFilter::Category(category),
            (None, Some(search), None) => AdventureFilter::Search(search),
            (None, None, Some(reason)) => AdventureFilter::ReportReason(reason),
            _ => {
                return Err(AppError::BadPayload(
                    "Give exactly one of category, search or reason".to_string(),
                ))
            }
        };
        Ok((filter, page))
    }
}

// Public handlers

pub async fn health_handler() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

pub async fn get_adventure_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Adventure>, AppError> {
    Ok(Json(state.adventures.read_adventure(&slug).await?))
}

pub async fn node_visit_handler(
    State(state): State<AppState>,
    Path((slug, node_id)): Path<(String, i64)>,
) -> Result<Json<Value>, AppError> {
    state.adventures.record_node_visit(&slug, node_id).await?;
    Ok(Json(json!({"recorded": true})))
}

// Editor handlers

pub async fn open_for_edit_handler(
    State(state): State<AppState>,
    vc: Vc,
    Path(slug): Path<String>,
) -> Result<Json<Adventure>, AppError> {
    vc.require_authenticated()?;
    Ok(Json(state.adventures.open_for_edit(&slug, &vc).await?))
}

pub async fn create_default_handler(
    State(state): State<AppState>,
    vc: Vc,
) -> Result<Json<Adventure>, AppError> {
    vc.require_authenticated()?;
    Ok(Json(state.adventures.create_default().await?))
}

pub async fn create_new_handler(
    State(state): State<AppState>,
    vc: Vc,
) -> Result<Json<Adventure>, AppError> {
    vc.require_authenticated()?;
    Ok(Json(state.adventures.create_new().await?))
}

pub async fn reconcile_handler(
    State(state): State<AppState>,
    vc: Vc,
    Path(slug): Path<String>,
    AppJson(incoming): AppJson<Adventure>,
) -> Result<Json<Adventure>, AppError> {
    vc.require_authenticated()?;
    Ok(Json(state.adventures.engine().reconcile_content(&slug, &incoming).await?))
}

pub async fn report_handler(
    State(state): State<AppState>,
    vc: Vc,
    Path(slug): Path<String>,
    AppJson(request): AppJson<ReportRequest>,
) -> Result<Json<Report>, AppError> {
    vc.require_authenticated()?;
    Ok(Json(state.adventures.report_adventure(&slug, &request).await?))
}

pub async fn categories_handler(
    State(state): State<AppState>,
    vc: Vc,
) -> Result<Json<Vec<Category>>, AppError> {
    vc.require_authenticated()?;
    Ok(Json(state.adventures.categories().await?))
}

pub async fn upload_media_handler(
    State(state): State<AppState>,
    vc: Vc,
    Query(query): Query<MediaUploadQuery>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    vc.require_authenticated()?;
    let url = state
        .adventures
        .upload_media(&query.slug, &query.filename, &body)
        .await?;
    Ok(Json(json!({"url": url})))
}

pub async fn delete_media_handler(
    State(state): State<AppState>,
    vc: Vc,
    Path((slug, file)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    vc.require_authenticated()?;
    let deleted = state.adventures.delete_media(&slug, &file).await?;
    Ok(Json(json!({"deleted": deleted})))
}

// Admin handlers

pub async fn admin_get_adventure_handler(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<i64>,
) -> Result<Json<Adventure>, AppError> {
    state.adventures.require_admin(&vc).await?;
    Ok(Json(state.adventures.fetch_by_id(AdventureId::new(id)).await?))
}

pub async fn admin_update_adventure_handler(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<i64>,
    AppJson(payload): AppJson<Adventure>,
) -> Result<Json<Adventure>, AppError> {
    state.adventures.require_admin(&vc).await?;
    Ok(Json(
        state.adventures.update_metadata(AdventureId::new(id), &payload).await?,
    ))
}

pub async fn admin_delete_adventure_handler(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    state.adventures.require_admin(&vc).await?;
    state.adventures.delete_by_id(AdventureId::new(id)).await?;
    Ok(Json(json!({"id": id, "deleted": true})))
}

pub async fn admin_list_adventures_handler(
    State(state): State<AppState>,
    vc: Vc,
    Query(query): Query<ListingQuery>,
) -> Result<Json<AdventureListing>, AppError> {
    state.adventures.require_admin(&vc).await?;
    let (filter, page) = query.into_parts()?;
    Ok(Json(state.adventures.search(filter, page).await?))
}

pub async fn admin_copy_handler(
    State(state): State<AppState>,
    vc: Vc,
    Path(slug): Path<String>,
) -> Result<Json<Adventure>, AppError> {
    state.adventures.require_admin(&vc).await?;
    Ok(Json(state.copies.copy_adventure(&slug).await?))
}

pub async fn admin_import_handler(
    State(state): State<AppState>,
    vc: Vc,
    body: Bytes,
) -> Result<Json<Adventure>, AppError> {
    state.adventures.require_admin(&vc).await?;
    Ok(Json(state.archives.import_archive(body.to_vec()).await?))
}

pub async fn admin_export_handler(
    State(state): State<AppState>,
    vc: Vc,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    state.adventures.require_admin(&vc).await?;
    let exported = state.archives.export_archive(&slug).await?;
    let disposition = format!("attachment; filename=\"{}\"", exported.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        exported.bytes,
    )
        .into_response())
}

pub async fn admin_reports_handler(
    State(state): State<AppState>,
    vc: Vc,
    Query(query): Query<ReportsQuery>,
) -> Result<Json<Vec<Report>>, AppError> {
    state.adventures.require_admin(&vc).await?;
    Ok(Json(state.adventures.reports(query.handled).await?))
}

pub async fn admin_report_handled_handler(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<i64>,
    AppJson(request): AppJson<ReportHandledRequest>,
) -> Result<Json<Value>, AppError> {
    state.adventures.require_admin(&vc).await?;
    state.adventures.mark_report_handled(id, request.handled).await?;
    Ok(Json(json!({"id": id, "handled": request.handled})))
}

pub async fn admin_statistics_handler(
    State(state): State<AppState>,
    vc: Vc,
    AppJson(request): AppJson<StatisticsRequest>,
) -> Result<Json<Vec<NodeStat>>, AppError> {
    state.adventures.require_admin(&vc).await?;
    Ok(Json(
        state
            .adventures
            .node_statistics(AdventureId::new(request.adventure_id), request.start, request.stop)
            .await?,
    ))
}

pub async fn admin_get_category_handler(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<i64>,
) -> Result<Json<Category>, AppError> {
    state.adventures.require_admin(&vc).await?;
    Ok(Json(state.adventures.category(id).await?))
}

pub async fn admin_create_category_handler(
    State(state): State<AppState>,
    vc: Vc,
    AppJson(mut category): AppJson<Category>,
) -> Result<Json<Category>, AppError> {
    state.adventures.require_admin(&vc).await?;
    category.id = 0;
    Ok(Json(state.adventures.save_category(&category).await?))
}

pub async fn admin_update_category_handler(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<i64>,
    AppJson(mut category): AppJson<Category>,
) -> Result<Json<Category>, AppError> {
    state.adventures.require_admin(&vc).await?;
    category.id = id;
    Ok(Json(state.adventures.save_category(&category).await?))
}

pub async fn admin_delete_category_handler(
    State(state): State<AppState>,
    vc: Vc,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    state.adventures.require_admin(&vc).await?;
    state.adventures.delete_category(id).await?;
    Ok(Json(json!({"id": id, "deleted": true})))
}

pub fn create_adventure_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.config.media.export_size_limit).unwrap_or(usize::MAX);
    let upload_root = state.config.media.upload_root();
    let static_root = state.config.media.web_root();

    let api = Router::new()
        .route("/health", get(health_handler))
        .route("/adventure", post(create_default_handler))
        .route("/newAdventure", get(create_new_handler))
        .route("/adventure/{slug}", get(get_adventure_handler).put(reconcile_handler))
        .route("/adventure/{slug}/edit", get(open_for_edit_handler))
        .route("/adventure/{slug}/report", post(report_handler))
        .route("/statistics/{slug}/{node_id}", get(node_visit_handler))
        .route("/categories", get(categories_handler))
        .route("/media", post(upload_media_handler))
        .route("/media/{slug}/{file}", delete(delete_media_handler))
        .route("/admin/adventures", get(admin_list_adventures_handler))
        .route(
            "/admin/adventure/{id}",
            get(admin_get_adventure_handler)
                .put(admin_update_adventure_handler)
                .delete(admin_delete_adventure_handler),
        )
        .route("/admin/copy/{slug}", put(admin_copy_handler))
        .route("/admin/importAdventure", put(admin_import_handler))
        .route("/admin/exportAdventure/{slug}", get(admin_export_handler))
        .route("/admin/reports", get(admin_reports_handler))
        .route("/admin/report/{id}", put(admin_report_handled_handler))
        .route("/admin/statistics", put(admin_statistics_handler))
        .route("/admin/category", post(admin_create_category_handler))
        .route(
            "/admin/category/{id}",
            get(admin_get_category_handler)
                .put(admin_update_category_handler)
                .delete(admin_delete_category_handler),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            viewer_context_middleware::<AppState>,
        ))
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .nest_service("/upload", ServeDir::new(upload_root))
        .nest_service("/static", ServeDir::new(static_root))
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(CorsLayer::permissive()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::MAX_PAGE_SIZE;

    #[test]
    fn test_listing_query_clamps_page() {
        let query = ListingQuery {
            category: Some(1),
            page_size: Some(i64::MAX),
            page_index: Some(-3),
            ..Default::default()
        };
        let (filter, page) = query.into_parts().unwrap();
        assert_eq!(filter, AdventureFilter::Category(1));
        assert_eq!(page.page_size, MAX_PAGE_SIZE);
        assert_eq!(page.page_index, 1);
    }

    #[test]
    fn test_listing_query_needs_one_filter() {
        let query = ListingQuery {
            category: Some(1),
            search: Some("drake".to_string()),
            ..Default::default()
        };
        assert!(matches!(query.into_parts(), Err(AppError::BadPayload(_))));
    }
}
