//! WebSocket server implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::completion::{ChatCompletionClient, CompletionService, DisabledCompletion};
use crate::config::ServerConfig;
use crate::data::load_quizzes_from_json;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::repository::CatalogRepository;
use crate::QuizError;

use super::coordinator::Coordinator;

/// Run the quiz server until Ctrl-C.
pub async fn run(config: ServerConfig) -> Result<(), QuizError> {
    let quizzes = load_quizzes_from_json(&config.quizzes_path)?;
    tracing::info!("Loaded {} quizzes", quizzes.len());

    let repository = Arc::new(CatalogRepository::new(quizzes));
    let completion: Arc<dyn CompletionService> = match &config.completion {
        Some(settings) => Arc::new(ChatCompletionClient::new(settings.clone())),
        None => {
            tracing::info!("No completion API key configured, GPT: chat commands disabled");
            Arc::new(DisabledCompletion)
        }
    };
    let coordinator = Coordinator::new(repository, completion, config.round.clone());

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on ws://{}", addr);

    serve(listener, coordinator).await
}

/// Accept connections on `listener` until Ctrl-C.
pub async fn serve(listener: TcpListener, coordinator: Coordinator) -> Result<(), QuizError> {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    tokio::spawn(handle_connection(stream, addr, coordinator.clone()));
                }
                Err(e) => {
                    tracing::error!("Failed to accept connection: {}", e);
                }
            },
            signal = tokio::signal::ctrl_c() => {
                signal?;
                tracing::info!("Shutting down");
                return Ok(());
            }
        }
    }
}

/// Handle a single WebSocket connection.
async fn handle_connection(stream: TcpStream, addr: SocketAddr, coordinator: Coordinator) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Create channel for sending messages to this client
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let connection = coordinator.connect(tx).await;
    tracing::info!(%connection, %addr, "client connected");

    // Spawn task to forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("Failed to encode {:?}: {}", msg, e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Events from one connection are handled strictly in arrival order
    while let Some(msg) = ws_receiver.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::debug!(%connection, "read failed: {}", e);
                break;
            }
            _ => continue,
        };

        match serde_json::from_str::<ClientMessage>(text.as_str()) {
            Ok(client_msg) => coordinator.handle(connection, client_msg).await,
            Err(e) => tracing::debug!(%connection, "unparseable message: {}", e),
        }
    }

    coordinator.disconnect(connection).await;
    send_task.abort();
    tracing::info!(%connection, "client disconnected");
}
