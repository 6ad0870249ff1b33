//! Echo server for local development.
//!
//! Accepts WebSocket connections on `/ws` and answers every text frame
//! with `Message text was: <text>`.

use axum::{
    Router,
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    http::HeaderValue,
    response::IntoResponse,
    routing::get,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

/// Prefix of every echo reply.
pub const ECHO_PREFIX: &str = "Message text was: ";

/// Browser origins of the web chat frontend.
pub const FRONTEND_ORIGINS: [&str; 2] = ["http://localhost:5173", "http://127.0.0.1:5173"];

/// Reply the echo server sends for `text`.
#[must_use]
pub fn echo_reply(text: &str) -> String {
    format!("{ECHO_PREFIX}{text}")
}

/// CORS policy for the frontend origins, with credentials.
#[must_use]
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            FRONTEND_ORIGINS.map(HeaderValue::from_static),
        ))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Create the echo router.
///
/// # Example
/// ```ignore
/// let listener = TcpListener::bind("127.0.0.1:8000").await?;
/// axum::serve(listener, echo_router()).await?;
/// ```
#[must_use]
pub fn echo_router() -> Router {
    Router::new().route("/ws", get(ws_handler)).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer()),
    )
}

/// Serve the echo router on `listener` until the process exits.
///
/// # Errors
/// Returns error if the listener fails.
pub async fn serve(listener: TcpListener) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("Echo server listening on ws://{addr}/ws");
    axum::serve(listener, echo_router()).await
}

async fn ws_handler(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(handle_socket)
}

async fn handle_socket(mut socket: WebSocket) {
    while let Some(msg) = socket.recv().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!("An error occurred: {e}");
                return;
            }
        };

        let reply = echo_reply(text.as_str());
        if socket.send(Message::Text(reply.into())).await.is_err() {
            break;
        }
    }

    tracing::info!("Client disconnected");
}
