use crate::{
    app::{AppError, Library},
    auth,
    search::{SearchAnalysis, SearchCounts, SearchResult},
};
use axum::{
    extract::{Query, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;

#[derive(Clone)]
struct SharedState {
    library: Arc<Library>,
    auth_token: Option<Arc<str>>,
}

pub fn router(library: Arc<Library>, auth_token: Option<String>) -> Router {
    let state = Arc::new(SharedState {
        library,
        auth_token: auth_token.map(Arc::from),
    });

    let protected = Router::new()
        .route("/search", post(search))
        .route("/tags", get(tags))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(protected)
        .route("/health", get(health))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(state)
}

async fn start_app(
    library: Library,
    addr: SocketAddr,
    auth_token: Option<String>,
) -> anyhow::Result<()> {
    if auth_token.is_none() {
        log::warn!(
            "SHELF_AUTH_TOKEN is not set, the API is open to anyone who can reach {addr}"
        );
    }

    let app = router(Arc::new(library), auth_token);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                log::error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::warn!("shutting down");
}

pub fn start_daemon(
    library: Library,
    addr: SocketAddr,
    auth_token: Option<String>,
) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_app(library, addr, auth_token))
}

#[derive(Debug)]
struct HttpError(AppError);

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.0.to_string()),
            AppError::Invalid(_) => (StatusCode::BAD_REQUEST, self.0.to_string()),
            AppError::Store(_) | AppError::Other(_) => {
                log::error!("{:?}", self.0);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<AppError> for HttpError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

async fn require_auth(
    State(state): State<Arc<SharedState>>,
    request: Request,
    next: Next,
) -> Result<Response, HttpError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    auth::authorize(header, state.auth_token.as_deref())?;

    Ok(next.run(request).await)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest {
    query: String,
    #[serde(default)]
    workspace_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    success: bool,
    results: Vec<SearchResult>,
    analysis: SearchAnalysis,
    message: String,
    debug: SearchCounts,
}

async fn search(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, HttpError> {
    let workspace_id = payload
        .workspace_id
        .as_deref()
        .map(str::trim)
        .filter(|ws| !ws.is_empty());

    let outcome = state.library.search(&payload.query, workspace_id).await?;

    Ok(Json(SearchResponse {
        success: true,
        results: outcome.results,
        analysis: outcome.analysis,
        message: outcome.message,
        debug: outcome.counts,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TagsParams {
    workspace_id: String,
}

async fn tags(
    State(state): State<Arc<SharedState>>,
    Query(params): Query<TagsParams>,
) -> Result<impl IntoResponse, HttpError> {
    let tags = state.library.tags(&params.workspace_id)?;
    Ok(Json(json!({ "tags": tags })))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
