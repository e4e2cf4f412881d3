//! WebSocket endpoint
//!
//! One session per (connection, room). The client authenticates with a JWT
//! passed as a query parameter (browsers cannot set headers on upgrade
//! requests), membership is verified before the upgrade completes, and the
//! session's lifecycle drives the Presence Tracker.

use crate::error::AppError;
use crate::models::PresenceStatus;
use crate::services::room_service::RoomService;
use crate::state::AppState;
use crate::websocket::events::{broadcast_event, WebSocketEvent};
use crate::websocket::message_types::WsInboundEvent;
use actix::{Actor, ActorContext, AsyncContext, Handler, Message as ActixMessage, StreamHandler};
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use actix_middleware::decode_token;
use redis::AsyncCommands;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub room_id: Uuid,
    pub token: String,
}

// Message type for broadcasting to WebSocket actor
#[derive(ActixMessage)]
#[rtype(result = "()")]
struct BroadcastMessage(String);

// WebSocket Actor
struct WsSession {
    room_id: Uuid,
    user_id: Uuid,
    subscriber_id: crate::websocket::SubscriberId,
    receiver: Option<UnboundedReceiver<String>>,
    hb: Instant,
    app_state: AppState,
}

impl WsSession {
    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let presence = self.app_state.presence.clone();
        let user_id = self.user_id;

        ctx.run_interval(HEARTBEAT_INTERVAL, move |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                tracing::warn!("WebSocket heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");

            // Liveness doubles as a presence heartbeat
            let presence = presence.clone();
            actix::spawn(async move {
                let _ = presence.touch(user_id).await;
            });
        });
    }

    fn handle_inbound(&self, evt: WsInboundEvent, _ctx: &mut ws::WebsocketContext<Self>) {
        let state = self.app_state.clone();
        let session_room = self.room_id;
        let user_id = self.user_id;

        match evt {
            WsInboundEvent::TypingStart { room_id } => {
                if room_id != session_room {
                    return;
                }

                actix::spawn(async move {
                    let started = WebSocketEvent::TypingStarted { user_id };
                    let _ = broadcast_event(&state.registry, &state.redis, room_id, user_id, started)
                        .await;

                    // Self-expiry publishes typing.stopped unless an explicit
                    // stop or a refresh lands first.
                    let expire_state = state.clone();
                    state
                        .typing
                        .start(room_id, user_id, async move {
                            let stopped = WebSocketEvent::TypingStopped { user_id };
                            let _ = broadcast_event(
                                &expire_state.registry,
                                &expire_state.redis,
                                room_id,
                                user_id,
                                stopped,
                            )
                            .await;
                        })
                        .await;
                });
            }

            WsInboundEvent::TypingStop { room_id } => {
                if room_id != session_room {
                    return;
                }

                actix::spawn(async move {
                    if state.typing.stop(room_id, user_id).await {
                        let stopped = WebSocketEvent::TypingStopped { user_id };
                        let _ = broadcast_event(
                            &state.registry,
                            &state.redis,
                            room_id,
                            user_id,
                            stopped,
                        )
                        .await;
                    }
                });
            }

            WsInboundEvent::Ack { msg_id, room_id } => {
                if room_id != session_room {
                    return;
                }

                actix::spawn(async move {
                    let key = format!("ack:{}:{}", room_id, user_id);
                    match state.redis.get_multiplexed_async_connection().await {
                        Ok(mut conn) => {
                            let result: Result<(), _> = conn.set(&key, &msg_id).await;
                            if let Err(e) = result {
                                tracing::error!(error = %e, "failed to record ack for {}", msg_id);
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "failed to record ack for {}", msg_id);
                        }
                    }
                });
            }

            WsInboundEvent::PresenceSet { status } => {
                let Some(status) = PresenceStatus::from_db(&status) else {
                    return;
                };
                if status == PresenceStatus::Offline {
                    // Offline is owned by the disconnect path
                    return;
                }

                actix::spawn(async move {
                    if let Err(e) = state.presence.set_status(user_id, status).await {
                        tracing::warn!(error = %e, "presence.set failed");
                    }
                });
            }
        }
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            "WebSocket session started for user {} in room {}",
            self.user_id,
            self.room_id
        );

        self.hb(ctx);

        // Forward registry broadcasts into this socket
        if let Some(mut rx) = self.receiver.take() {
            let addr = ctx.address();
            actix::spawn(async move {
                while let Some(payload) = rx.recv().await {
                    addr.do_send(BroadcastMessage(payload));
                }
            });
        }

        // Connection lifecycle -> Presence Tracker
        let presence = self.app_state.presence.clone();
        let user_id = self.user_id;
        actix::spawn(async move {
            if let Err(e) = presence.mark_connected(user_id).await {
                tracing::warn!(error = %e, "presence connect transition failed");
            }
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(
            "WebSocket session stopped for user {} in room {}",
            self.user_id,
            self.room_id
        );

        let state = self.app_state.clone();
        let room_id = self.room_id;
        let user_id = self.user_id;
        let subscriber_id = self.subscriber_id;

        actix::spawn(async move {
            state.registry.remove_subscriber(room_id, subscriber_id).await;

            // Pending typing indicators die with the connection; tell the
            // rooms so clients don't show a stuck indicator.
            for typing_room in state.typing.stop_all_for_user(user_id).await {
                let stopped = WebSocketEvent::TypingStopped { user_id };
                let _ = broadcast_event(
                    &state.registry,
                    &state.redis,
                    typing_room,
                    user_id,
                    stopped,
                )
                .await;
            }

            state.presence.mark_disconnected(user_id).await;
        });
    }
}

// Handle broadcast messages
impl Handler<BroadcastMessage> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: BroadcastMessage, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

// Handle WebSocket protocol messages
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<WsInboundEvent>(&text) {
                Ok(evt) => self.handle_inbound(evt, ctx),
                Err(e) => {
                    tracing::debug!(error = %e, "ignoring unparseable client event");
                }
            },
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "websocket protocol error");
                ctx.stop();
            }
        }
    }
}

/// GET /ws?room_id=...&token=...
#[get("/ws")]
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    params: web::Query<WsParams>,
) -> Result<HttpResponse, Error> {
    // Query-token authentication; the JwtAuth middleware does not see
    // upgrade requests' headers from browser clients.
    let claims = decode_token(&state.config.jwt_secret, &params.token)
        .map_err(|_| AppError::Unauthorized)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?;

    let is_member =
        RoomService::is_member_cached(&state.db, &state.redis, params.room_id, user_id).await?;
    if !is_member {
        return Err(AppError::Forbidden.into());
    }

    let (subscriber_id, receiver) = state.registry.add_subscriber(params.room_id).await;

    let session = WsSession {
        room_id: params.room_id,
        user_id,
        subscriber_id,
        receiver: Some(receiver),
        hb: Instant::now(),
        app_state: state.get_ref().clone(),
    };

    ws::start(session, &req, stream)
}
