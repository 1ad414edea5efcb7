pub mod admin;
pub mod audit;
pub mod auth;
pub mod cli;
pub mod context;
pub mod error;
pub mod handlers;
pub mod ical;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod pokedex;
pub mod schedule;
pub mod settings;
pub mod store;
pub mod validation;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, put};
use chrono_tz::Tz;
use config::ConfigError;
use tower_http::LatencyUnit;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::admin::AdminService;
use crate::handlers::{
    admin_weekly_schedule, create_category, create_class, create_instance, delete_category,
    delete_class, delete_instance, get_pokedex, get_schedule, get_schedule_ical, healthz_live,
    healthz_ready, list_categories, list_classes, list_instances, post_schedule, root,
    update_category, update_class, update_instance,
};
use crate::ical::ICalExporter;
use crate::openapi::ApiDoc;
use crate::pokedex::PokedexCache;
use crate::schedule::ScheduleService;
use crate::settings::Settings;
use crate::store::ScheduleStore;

#[derive(Clone)]
pub struct AppState {
    pub(crate) settings: Settings,
    pub(crate) tz: Tz,
    pub(crate) store: ScheduleStore,
    pub(crate) schedule: ScheduleService,
    pub(crate) admin: AdminService,
    pub(crate) pokedex: Arc<PokedexCache>,
    pub(crate) exporter: Arc<ICalExporter>,
}

impl AppState {
    pub fn new(settings: Settings, store: ScheduleStore) -> Result<Self, ConfigError> {
        let tz = settings.tz()?;
        Ok(Self {
            tz,
            schedule: ScheduleService::new(store.clone(), settings.hide_deleted_in_public),
            admin: AdminService::new(store.clone()),
            pokedex: Arc::new(PokedexCache::new(&settings.pokedex_cache_path)),
            exporter: Arc::new(ICalExporter::default()),
            store,
            settings,
        })
    }
}

/// `RUST_LOG` wins when set; otherwise `debug` or `info` depending on settings.
pub fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

pub async fn serve(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let store =
        ScheduleStore::connect(&settings.database_url, settings.database_max_connections).await?;
    let state = AppState::new(settings, store)?;

    let app = build_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], state.settings.port));
    info!("Starting class schedule API on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    let admin = Router::new()
        .route("/schedule", get(admin_weekly_schedule))
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/{id}",
            put(update_category).delete(delete_category),
        )
        .route("/classes", get(list_classes).post(create_class))
        .route("/classes/{id}", put(update_class).delete(delete_class))
        .route("/instances", get(list_instances).post(create_instance))
        .route(
            "/instances/{id}",
            put(update_instance).delete(delete_instance),
        );

    let mut router = Router::new()
        .route("/", get(root))
        .route("/healthz/live", get(healthz_live))
        .route("/healthz/ready", get(healthz_ready))
        .route("/pfa", get(get_schedule).post(post_schedule))
        .route("/pfa.ical", get(get_schedule_ical))
        .route("/pokedex", get(get_pokedex))
        .nest("/admin", admin)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::log_requests,
        ))
        .with_state(state.clone());

    if state.settings.enable_swagger {
        let openapi = ApiDoc::openapi();
        let swagger = SwaggerUi::new("/docs").url("/openapi.json", openapi);
        router = router.merge(swagger);
    }

    router.layer(trace_layer)
}
