use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use log::{debug, warn};
use parlor_core::ConnectionId;

use crate::{
    context::ServerContext,
    errors::{ServerError, ServerResult},
    protocol::{ClientMessage, ClientRequest, ServerFrame},
    Router,
};

#[utoipa::path(
    get,
    path = "/gateway",
    tag = "gateway",
    responses(
        (
            status = 101,
            description = "Upgrades to a websocket carrying JSON frames in both directions"
        )
    )
)]
async fn gateway(ws: WebSocketUpgrade, State(context): State<ServerContext>) -> Response {
    ws.on_upgrade(move |socket| run_connection(socket, context))
}

async fn run_connection(socket: WebSocket, context: ServerContext) {
    let (mut sink, mut stream) = socket.split();
    let mut outbox = context.gateway.connect();
    let connection_id = outbox.id();

    debug!("Connection {} opened", connection_id);

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbox.next().await {
            let text = serde_json::to_string(&frame).expect("frame serializes properly");

            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => handle_text(&context, connection_id, &text).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Connection {} errored: {}", connection_id, e);
                break;
            }
        }
    }

    context.collab.rooms.disconnect(connection_id).await;
    context.gateway.disconnect(connection_id);

    if let Err(e) = writer.await {
        warn!("Writer of connection {} panicked: {}", connection_id, e);
    }

    debug!("Connection {} closed", connection_id);
}

/// Handles a single text frame from a client, answering it if needed
pub async fn handle_text(context: &ServerContext, connection_id: ConnectionId, text: &str) {
    let request: ClientRequest = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(e) => {
            let result = Err(ServerError::InvalidRequest(e.to_string()));
            reply(context, connection_id, request_id(text), result, "process request");
            return;
        }
    };

    let action = request.message.action();

    let result = match request.message.validate() {
        Ok(()) => dispatch(context, connection_id, request.message).await,
        Err(e) => Err(ServerError::InvalidRequest(e.to_string())),
    };

    reply(context, connection_id, request.id, result, action);
}

async fn dispatch(
    context: &ServerContext,
    connection_id: ConnectionId,
    message: ClientMessage,
) -> ServerResult<()> {
    let rooms = &context.collab.rooms;

    match message {
        ClientMessage::CreateRoom(body) => {
            rooms.create_room(&body.slug).await?;
        }
        ClientMessage::JoinRoom(body) => {
            rooms.join(connection_id, &body.slug, &body.name).await?;
        }
        ClientMessage::SendMessage(body) => {
            rooms
                .send_message(connection_id, body.text, body.image_url, body.audio_url)
                .await?;
        }
        ClientMessage::DeleteMessage(body) => {
            rooms.delete_message(connection_id, body.message_id).await?;
        }
        ClientMessage::ReactMessage(body) => {
            rooms
                .react(connection_id, body.message_id, body.emoji)
                .await?;
        }
        ClientMessage::RemoveReaction(body) => {
            rooms
                .remove_reaction(connection_id, body.message_id, body.emoji)
                .await?;
        }
        ClientMessage::UpdateProfile(body) => {
            rooms
                .update_profile(connection_id, body.name, body.avatar_url)
                .await?;
        }
        ClientMessage::JoinCall => {
            rooms.join_call(connection_id)?;
        }
        ClientMessage::LeaveCall => rooms.leave_call(connection_id)?,
        ClientMessage::WebrtcSignal(body) => rooms.relay(connection_id, body.to, body.signal)?,
        ClientMessage::MusicSync(body) => {
            rooms.sync_music(connection_id, body.into())?;
        }
        ClientMessage::StartGame(body) => {
            rooms.start_game(connection_id, &body.game_id).await?;
        }
        ClientMessage::EndGame => rooms.end_game(connection_id)?,
    }

    Ok(())
}

/// Answers the connection that made a request. Nothing is sent for a successful request without an id.
fn reply(
    context: &ServerContext,
    connection_id: ConnectionId,
    id: Option<u64>,
    result: ServerResult<()>,
    action: &str,
) {
    let error = match result {
        Ok(()) => None,
        Err(e) => {
            if e.is_internal() {
                warn!("Connection {} failed to {}: {}", connection_id, action, e);
            } else {
                debug!("Connection {} could not {}: {}", connection_id, action, e);
            }

            Some(e.client_message(action))
        }
    };

    let frame = match (id, error) {
        (Some(id), error) => ServerFrame::Ack {
            id,
            success: error.is_none(),
            error,
        },
        (None, Some(message)) => ServerFrame::Error { message },
        (None, None) => return,
    };

    context.gateway.send(connection_id, frame)
}

/// Recovers the id of a request that could not be parsed, so it can still be answered
fn request_id(text: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()?
        .get("id")?
        .as_u64()
}

pub fn router() -> Router {
    Router::new().route("/gateway", get(gateway))
}
