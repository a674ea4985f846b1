//! Servidor web Axum com WebSocket para executar a resolução de entidades e
//! acompanhar o pipeline em tempo real

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use er_core::{
    corpus::demo_input,
    ConfigOverrides, Preset, ResolutionConfig, ResolutionEvent, ResolutionInput,
    ResolutionPipeline, ResolveError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Estado compartilhado da aplicação
struct AppState {
    /// Preset usado quando a requisição não informa nenhum (`ER_PRESET`).
    default_preset: Option<Preset>,
}

/// Corpo de `POST /resolve` e de cada mensagem do WebSocket
#[derive(Deserialize)]
struct ResolveRequest {
    #[serde(flatten)]
    input: ResolutionInput,
    #[serde(default)]
    preset: Option<Preset>,
    #[serde(default)]
    overrides: ConfigOverrides,
}

#[derive(Serialize)]
struct PresetInfo {
    name: &'static str,
    config: ResolutionConfig,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

/// Erros da camada HTTP
enum ApiError {
    Resolve(ResolveError),
    Internal(String),
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        ApiError::Resolve(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Resolve(err) => (
                if err.is_input_error() {
                    StatusCode::UNPROCESSABLE_ENTITY
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                },
                ErrorBody {
                    error: err.to_string(),
                    kind: err.kind(),
                },
            ),
            ApiError::Internal(error) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error,
                    kind: "internal",
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

impl AppState {
    fn pipeline_for(&self, req: &ResolveRequest) -> Result<ResolutionPipeline, ResolveError> {
        let preset = req.preset.or(self.default_preset);
        let config = ResolutionConfig::from_parts(preset, &req.overrides)?;
        ResolutionPipeline::new(config)
    }
}

fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/presets", get(presets_handler))
        .route("/demo", get(demo_handler))
        .route("/resolve", post(resolve_handler))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let default_preset = match std::env::var("ER_PRESET") {
        Ok(name) => match name.parse::<Preset>() {
            Ok(preset) => Some(preset),
            Err(err) => {
                warn!("{err}; usando a configuração padrão");
                None
            }
        },
        Err(_) => None,
    };
    let state = Arc::new(AppState { default_preset });

    let addr = std::env::var("ER_WEB_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Servidor de resolução de entidades iniciado em http://{addr}");
    axum::serve(listener, app(state)).await
}

/// Presets disponíveis com a configuração resolvida de cada um
async fn presets_handler() -> impl IntoResponse {
    let presets: Vec<PresetInfo> = Preset::all()
        .iter()
        .map(|p| PresetInfo {
            name: p.name(),
            config: p.config(),
        })
        .collect();
    Json(presets)
}

/// Lote de demonstração (reunião da comissão de Coral Gables)
async fn demo_handler() -> impl IntoResponse {
    Json(demo_input())
}

/// Resolução via HTTP POST (sem streaming)
async fn resolve_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResolveRequest>,
) -> Result<Response, ApiError> {
    let pipeline = state.pipeline_for(&req)?;
    info!(mentions = req.input.mentions.len(), "resolvendo via HTTP");

    // A resolução é CPU-bound: roda fora do runtime assíncrono
    let output = tokio::task::spawn_blocking(move || pipeline.resolve(&req.input))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))??;

    Ok(Json(output).into_response())
}

/// Upgrade HTTP → WebSocket
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Recebe um lote por mensagem, executa o pipeline e envia os eventos em sequência
async fn handle_websocket(mut socket: WebSocket, state: Arc<AppState>) {
    info!("WebSocket conectado");

    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(text) => {
                let events = match serde_json::from_str::<ResolveRequest>(&text) {
                    Ok(req) => match state.pipeline_for(&req) {
                        Ok(pipeline) => {
                            info!(mentions = req.input.mentions.len(), "resolvendo via WebSocket");
                            run_streaming(pipeline, req.input).await
                        }
                        Err(err) => vec![ResolutionEvent::Error {
                            message: err.to_string(),
                            kind: err.kind().to_string(),
                        }],
                    },
                    Err(err) => vec![ResolutionEvent::Error {
                        message: format!("requisição inválida: {err}"),
                        kind: "bad_request".to_string(),
                    }],
                };

                for event in &events {
                    if let Ok(json) = serde_json::to_string(event) {
                        if socket.send(Message::Text(json)).await.is_err() {
                            return; // cliente desconectou
                        }
                    }
                }
            }
            Message::Close(_) => {
                info!("WebSocket desconectado");
                return;
            }
            Message::Ping(payload) => {
                let _ = socket.send(Message::Pong(payload)).await;
            }
            _ => {}
        }
    }
}

/// Executa `resolve_streaming` numa thread bloqueante e coleta os eventos
async fn run_streaming(
    pipeline: ResolutionPipeline,
    input: ResolutionInput,
) -> Vec<ResolutionEvent> {
    let (tx, rx) = std::sync::mpsc::channel::<ResolutionEvent>();
    let handle = tokio::task::spawn_blocking(move || {
        pipeline.resolve_streaming(&input, tx);
        // `resolve_streaming` já retornou: o canal está completo
        rx.try_iter().collect::<Vec<_>>()
    });
    match handle.await {
        Ok(events) => events,
        Err(err) => vec![ResolutionEvent::Error {
            message: err.to_string(),
            kind: "internal".to_string(),
        }],
    }
}
