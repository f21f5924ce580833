use crate::config::RelayConfig;
use crate::logging::{ExchangeRecord, SharedExchangeLog};
use crate::models::model_list;
use crate::relay::{self, RequestShape};
use crate::upstream::ModelInvoker;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

const DEFAULT_EXCHANGE_LIMIT: usize = 50;

#[derive(Clone)]
pub struct AppState {
    pub config: RelayConfig,
    pub invoker: Arc<dyn ModelInvoker>,
    pub exchanges: SharedExchangeLog,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/v1/chat/completions", post(handle_chat_completions))
        .route("/v1/messages", post(handle_messages))
        .route("/v1/models", get(handle_models))
        .route("/v1/exchanges", get(handle_exchanges))
        .route("/health", get(handle_health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_chat_completions(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    handle_relay(state, RequestShape::OpenAi, body).await
}

async fn handle_messages(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    handle_relay(state, RequestShape::Anthropic, body).await
}

async fn handle_relay(state: Arc<AppState>, shape: RequestShape, body: Bytes) -> Response {
    let started = Instant::now();
    let exchange_id = uuid::Uuid::new_v4().to_string();

    let invocation = match relay::prepare(shape, &body, &state.config) {
        Ok(invocation) => invocation,
        Err(e) => {
            tracing::warn!(id = %exchange_id, route = shape.route(), error = %e, "Rejected request");
            state
                .exchanges
                .append(
                    ExchangeRecord::new(&exchange_id, shape.route(), e.status_code().as_u16())
                        .with_latency(elapsed_ms(started))
                        .with_error(e.kind()),
                )
                .await;
            return e.into_response();
        }
    };

    tracing::info!(
        id = %exchange_id,
        route = shape.route(),
        model_id = %invocation.model_id,
        messages = invocation.body.messages.len(),
        "Begin invoke"
    );

    let record = ExchangeRecord::new(&exchange_id, shape.route(), StatusCode::OK.as_u16())
        .with_model(&invocation.model_id);

    match relay::execute(shape, &invocation, state.invoker.as_ref()).await {
        Ok(resp) => {
            let latency = elapsed_ms(started);
            tracing::info!(id = %exchange_id, latency_ms = latency, "Invoke succeeded");
            state.exchanges.append(record.with_latency(latency)).await;
            resp.into_response()
        }
        Err(e) => {
            let latency = elapsed_ms(started);
            tracing::error!(
                id = %exchange_id,
                kind = e.kind(),
                error = %e,
                latency_ms = latency,
                "Error invoking model"
            );
            // the cause stays in the trace; the exchange log is served over HTTP
            let mut record = record.with_latency(latency).with_error(e.kind());
            record.status = e.status_code().as_u16();
            state.exchanges.append(record).await;
            e.into_response()
        }
    }
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn handle_models(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(model_list(&state.config.default_model))
}

#[derive(Debug, Deserialize)]
struct ExchangeQuery {
    limit: Option<usize>,
}

async fn handle_exchanges(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExchangeQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_EXCHANGE_LIMIT);
    Json(serde_json::json!({ "data": state.exchanges.recent(limit) }))
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
