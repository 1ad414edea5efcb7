use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};
use serde_json::{Map, Value};
use tracing::info;

use crate::AppState;
use crate::auth::identify;

const LOGGED_PREFIX: &str = "/pfa";

/// Logs request and response lines for the schedule endpoints.
pub async fn log_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    if !path.starts_with(LOGGED_PREFIX) {
        return next.run(req).await;
    }

    let method = req.method().clone();
    let mut token = None;
    let mut query = Map::new();
    for (key, value) in url::form_urlencoded::parse(req.uri().query().unwrap_or("").as_bytes()) {
        if key == "token" {
            token = Some(value.into_owned());
        } else {
            query.insert(key.into_owned(), Value::String(value.into_owned()));
        }
    }
    let auth = req.headers().typed_get::<Authorization<Bearer>>();
    let user = identify(&state.settings, auth.as_ref(), token.as_deref());
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let params = Value::Object(query);
    info!(
        %method,
        path = %path,
        user = %user,
        ip = %ip,
        query = %params,
        "REQUEST"
    );

    let started = Instant::now();
    let response = next.run(req).await;

    info!(
        %method,
        path = %path,
        status = response.status().as_u16(),
        time_ms = started.elapsed().as_millis() as u64,
        "RESPONSE"
    );
    response
}
