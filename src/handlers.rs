use axum::extract::{Form, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use axum_extra::extract::TypedHeader;
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use chrono::{Datelike, Duration, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::auth::{identify, verify_token};
use crate::context::CallContext;
use crate::error::ApiError;
use crate::models::{
    CategoryInput, ClassCategory, ClassInput, ClassInstance, InstanceInput, ScheduleView,
    TrainingClass, Weekday, WeeklyScheduleDay,
};
use crate::pokedex::PokemonCard;
use crate::schedule::current_weekday;
use crate::validation::{resolve_category, resolve_weekday};
use crate::AppState;

type BearerHeader = Option<TypedHeader<Authorization<Bearer>>>;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ScheduleQuery {
    /// Day of the week, 1 (Monday) to 7 (Sunday); defaults to today.
    pub day: Option<String>,
    /// `all`, `striking` or `grappling`; defaults to `all`.
    pub category: Option<String>,
    pub token: Option<String>,
}

/// Form posted by the day picker; `day_of_week` is accepted for `day`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ScheduleForm {
    #[serde(alias = "day_of_week")]
    pub day: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TokenQuery {
    /// Authentication token (alternative to Bearer header)
    pub token: Option<String>,
}

fn admin_context(
    state: &AppState,
    auth: BearerHeader,
    query: &TokenQuery,
) -> Result<CallContext, ApiError> {
    let auth_header = auth.map(|TypedHeader(a)| a);
    let actor = verify_token(&state.settings, auth_header.as_ref(), query.token.as_deref())?;
    Ok(CallContext::new(actor))
}

/// Malformed or non-Bearer `Authorization` headers count as anonymous.
fn public_context(state: &AppState, headers: &HeaderMap, token: Option<&str>) -> CallContext {
    let auth_header = headers.typed_get::<Authorization<Bearer>>();
    CallContext::new(identify(&state.settings, auth_header.as_ref(), token))
}

#[utoipa::path(get, path = "/", tag = "schedule")]
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Class Schedule API",
        "endpoints": {
            "/pfa": "Classes for a day, filtered by category",
            "/pfa.ical": "Weekly schedule as an iCal file",
            "/pokedex": "Cached Pokédex entries",
            "/admin/schedule": "Weekly grid of active classes (token required)"
        }
    }))
}

#[utoipa::path(get, path = "/healthz/live", tag = "health")]
pub async fn healthz_live() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[utoipa::path(
    get,
    path = "/healthz/ready",
    responses(
        (status = 200, description = "Database reachable"),
        (status = 500, description = "Database unavailable")
    ),
    tag = "health"
)]
pub async fn healthz_ready(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state.store.ping().await?;
    Ok(Json(serde_json::json!({"status": "ok"})))
}

#[utoipa::path(
    get,
    path = "/pfa",
    params(ScheduleQuery),
    responses(
        (status = 200, description = "Classes for the selected day, earliest first", body = ScheduleView)
    ),
    tag = "schedule"
)]
pub async fn get_schedule(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<ScheduleView>, ApiError> {
    let ctx = public_context(&state, &headers, query.token.as_deref());
    let day = resolve_weekday(query.day.as_deref(), current_weekday(state.tz));
    let category = resolve_category(query.category.as_deref());
    let view = state.schedule.filter(&ctx, day, category).await?;
    Ok(Json(view))
}

#[utoipa::path(
    post,
    path = "/pfa",
    params(ScheduleQuery),
    request_body(content = ScheduleForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Redirect to the equivalent GET URL"),
        (status = 200, description = "Invalid day; the query string or today is used instead", body = ScheduleView)
    ),
    tag = "schedule"
)]
pub async fn post_schedule(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ScheduleQuery>,
    Form(form): Form<ScheduleForm>,
) -> Result<Response, ApiError> {
    let category = resolve_category(form.category.as_deref().or(query.category.as_deref()));
    let chosen: Option<Weekday> = form.day.as_deref().and_then(|d| d.parse().ok());

    match chosen {
        Some(day) => {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .append_pair("day", &day.to_string())
                .append_pair("category", category.as_str())
                .finish();
            Ok(Redirect::to(&format!("/pfa?{query}")).into_response())
        }
        None => {
            let ctx = public_context(&state, &headers, query.token.as_deref());
            let day = resolve_weekday(query.day.as_deref(), current_weekday(state.tz));
            let view = state.schedule.filter(&ctx, day, category).await?;
            Ok(Json(view).into_response())
        }
    }
}

#[utoipa::path(
    get,
    path = "/pfa.ical",
    params(ScheduleQuery),
    responses(
        (status = 200, description = "iCal file", content_type = "text/calendar"),
        (status = 404, description = "No classes found")
    ),
    tag = "schedule"
)]
pub async fn get_schedule_ical(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ScheduleQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = public_context(&state, &headers, query.token.as_deref());
    let category = resolve_category(query.category.as_deref());
    let entries = state.schedule.week(&ctx, category).await?;

    if entries.is_empty() {
        return Err(ApiError::NotFound("No classes found".into()));
    }

    let today = Utc::now().with_timezone(&state.tz).date_naive();
    let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    let body = state.exporter.generate(&entries, monday);
    Ok((
        StatusCode::OK,
        [
            ("content-type", "text/calendar"),
            (
                "content-disposition",
                "attachment; filename=class_schedule.ics",
            ),
        ],
        body,
    ))
}

#[utoipa::path(
    get,
    path = "/pokedex",
    responses(
        (status = 200, description = "Cached Pokédex entries", body = [PokemonCard]),
        (status = 500, description = "Cache file missing or malformed")
    ),
    tag = "pokedex"
)]
pub async fn get_pokedex(State(state): State<AppState>) -> Result<Json<Vec<PokemonCard>>, ApiError> {
    Ok(Json(state.pokedex.load().await?))
}

#[utoipa::path(
    get,
    path = "/admin/schedule",
    params(TokenQuery),
    responses(
        (status = 200, description = "Active classes grouped by weekday", body = [WeeklyScheduleDay]),
        (status = 401, description = "Invalid authentication token")
    ),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "admin"
)]
pub async fn admin_weekly_schedule(
    State(state): State<AppState>,
    auth: BearerHeader,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Vec<WeeklyScheduleDay>>, ApiError> {
    let ctx = admin_context(&state, auth, &query)?;
    Ok(Json(state.schedule.weekly_grid(&ctx).await?))
}

#[utoipa::path(
    get,
    path = "/admin/categories",
    params(TokenQuery),
    responses((status = 200, body = [ClassCategory], description = "OK"), (status = 401, description = "Invalid authentication token")),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "admin"
)]
pub async fn list_categories(
    State(state): State<AppState>,
    auth: BearerHeader,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Vec<ClassCategory>>, ApiError> {
    admin_context(&state, auth, &query)?;
    Ok(Json(state.admin.list_categories().await?))
}

#[utoipa::path(
    post,
    path = "/admin/categories",
    params(TokenQuery),
    request_body = CategoryInput,
    responses((status = 201, body = ClassCategory, description = "Created"), (status = 400, description = "Validation failed"), (status = 401, description = "Invalid authentication token")),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "admin"
)]
pub async fn create_category(
    State(state): State<AppState>,
    auth: BearerHeader,
    Query(query): Query<TokenQuery>,
    Json(input): Json<CategoryInput>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = admin_context(&state, auth, &query)?;
    let category = state.admin.create_category(&ctx, &input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[utoipa::path(
    put,
    path = "/admin/categories/{id}",
    params(("id" = i64, Path), TokenQuery),
    request_body = CategoryInput,
    responses((status = 200, body = ClassCategory, description = "OK"), (status = 401, description = "Invalid authentication token"), (status = 404, description = "Record not found")),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "admin"
)]
pub async fn update_category(
    State(state): State<AppState>,
    auth: BearerHeader,
    Path(id): Path<i64>,
    Query(query): Query<TokenQuery>,
    Json(input): Json<CategoryInput>,
) -> Result<Json<ClassCategory>, ApiError> {
    let ctx = admin_context(&state, auth, &query)?;
    Ok(Json(state.admin.update_category(&ctx, id, &input).await?))
}

#[utoipa::path(
    delete,
    path = "/admin/categories/{id}",
    params(("id" = i64, Path), TokenQuery),
    responses((status = 204, description = "Deleted"), (status = 401, description = "Invalid authentication token"), (status = 404, description = "Record not found")),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "admin"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    auth: BearerHeader,
    Path(id): Path<i64>,
    Query(query): Query<TokenQuery>,
) -> Result<StatusCode, ApiError> {
    let ctx = admin_context(&state, auth, &query)?;
    state.admin.delete_category(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/admin/classes",
    params(TokenQuery),
    responses((status = 200, body = [TrainingClass], description = "OK"), (status = 401, description = "Invalid authentication token")),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "admin"
)]
pub async fn list_classes(
    State(state): State<AppState>,
    auth: BearerHeader,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Vec<TrainingClass>>, ApiError> {
    admin_context(&state, auth, &query)?;
    Ok(Json(state.admin.list_classes().await?))
}

#[utoipa::path(
    post,
    path = "/admin/classes",
    params(TokenQuery),
    request_body = ClassInput,
    responses((status = 201, body = TrainingClass, description = "Created"), (status = 400, description = "Validation failed"), (status = 401, description = "Invalid authentication token"), (status = 404, description = "Record not found")),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "admin"
)]
pub async fn create_class(
    State(state): State<AppState>,
    auth: BearerHeader,
    Query(query): Query<TokenQuery>,
    Json(input): Json<ClassInput>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = admin_context(&state, auth, &query)?;
    let class = state.admin.create_class(&ctx, &input).await?;
    Ok((StatusCode::CREATED, Json(class)))
}

#[utoipa::path(
    put,
    path = "/admin/classes/{id}",
    params(("id" = i64, Path), TokenQuery),
    request_body = ClassInput,
    responses((status = 200, body = TrainingClass, description = "OK"), (status = 400, description = "Validation failed"), (status = 401, description = "Invalid authentication token"), (status = 404, description = "Record not found")),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "admin"
)]
pub async fn update_class(
    State(state): State<AppState>,
    auth: BearerHeader,
    Path(id): Path<i64>,
    Query(query): Query<TokenQuery>,
    Json(input): Json<ClassInput>,
) -> Result<Json<TrainingClass>, ApiError> {
    let ctx = admin_context(&state, auth, &query)?;
    Ok(Json(state.admin.update_class(&ctx, id, &input).await?))
}

#[utoipa::path(
    delete,
    path = "/admin/classes/{id}",
    params(("id" = i64, Path), TokenQuery),
    responses((status = 204, description = "Class and its instances removed"), (status = 401, description = "Invalid authentication token"), (status = 404, description = "Record not found")),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "admin"
)]
pub async fn delete_class(
    State(state): State<AppState>,
    auth: BearerHeader,
    Path(id): Path<i64>,
    Query(query): Query<TokenQuery>,
) -> Result<StatusCode, ApiError> {
    let ctx = admin_context(&state, auth, &query)?;
    state.admin.delete_class(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/admin/instances",
    params(TokenQuery),
    responses((status = 200, body = [ClassInstance], description = "OK"), (status = 401, description = "Invalid authentication token")),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "admin"
)]
pub async fn list_instances(
    State(state): State<AppState>,
    auth: BearerHeader,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Vec<ClassInstance>>, ApiError> {
    admin_context(&state, auth, &query)?;
    Ok(Json(state.admin.list_instances().await?))
}

#[utoipa::path(
    post,
    path = "/admin/instances",
    params(TokenQuery),
    request_body = InstanceInput,
    responses((status = 201, body = ClassInstance, description = "Created"), (status = 400, description = "Validation failed"), (status = 401, description = "Invalid authentication token"), (status = 404, description = "Record not found")),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "admin"
)]
pub async fn create_instance(
    State(state): State<AppState>,
    auth: BearerHeader,
    Query(query): Query<TokenQuery>,
    Json(input): Json<InstanceInput>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = admin_context(&state, auth, &query)?;
    let instance = state.admin.create_instance(&ctx, &input).await?;
    Ok((StatusCode::CREATED, Json(instance)))
}

#[utoipa::path(
    put,
    path = "/admin/instances/{id}",
    params(("id" = i64, Path), TokenQuery),
    request_body = InstanceInput,
    responses((status = 200, body = ClassInstance, description = "OK"), (status = 400, description = "Validation failed"), (status = 401, description = "Invalid authentication token"), (status = 404, description = "Record not found")),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "admin"
)]
pub async fn update_instance(
    State(state): State<AppState>,
    auth: BearerHeader,
    Path(id): Path<i64>,
    Query(query): Query<TokenQuery>,
    Json(input): Json<InstanceInput>,
) -> Result<Json<ClassInstance>, ApiError> {
    let ctx = admin_context(&state, auth, &query)?;
    Ok(Json(state.admin.update_instance(&ctx, id, &input).await?))
}

#[utoipa::path(
    delete,
    path = "/admin/instances/{id}",
    params(("id" = i64, Path), TokenQuery),
    responses((status = 204, description = "Deleted"), (status = 401, description = "Invalid authentication token"), (status = 404, description = "Record not found")),
    security(("bearer_auth" = []), ("query_token" = [])),
    tag = "admin"
)]
pub async fn delete_instance(
    State(state): State<AppState>,
    auth: BearerHeader,
    Path(id): Path<i64>,
    Query(query): Query<TokenQuery>,
) -> Result<StatusCode, ApiError> {
    let ctx = admin_context(&state, auth, &query)?;
    state.admin.delete_instance(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
