//! WebSocket execution server: runs a net with the same store/engine
//! contracts as the local simulator and mirrors its state to monitoring
//! clients.
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::any;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, broadcast};

use crate::config::SimSettings;
use crate::net::ids::PlaceRef;
use crate::net::io::{NetConfig, PlaceSchema};
use crate::net::structure::Actor;
use crate::runtime::{ClientMessage, RuntimeStats, ServerMessage, StateSnapshot, TokenInfo};
use crate::sim::{StepController, StepReport};

struct Shared {
    controller: StepController,
    config: NetConfig,
    stats: RuntimeStats,
}

impl Shared {
    fn snapshot(&self) -> StateSnapshot {
        let mut stats = self.stats;
        stats.active_tokens = self.controller.distribution().total() as u64;
        StateSnapshot::from_store(self.controller.store(), stats)
    }
}

#[derive(Clone)]
struct AppState {
    shared: Arc<Mutex<Shared>>,
    events: broadcast::Sender<ServerMessage>,
}

impl AppState {
    fn broadcast(&self, message: ServerMessage) {
        // Nobody listening is fine.
        let _ = self.events.send(message);
    }
}

/// Serve `config` over WebSocket at `settings.listen_addr` until the
/// process is stopped. The auto-step task is owned here and aborted
/// when serving ends, so no timer outlives the session.
pub async fn serve(config: NetConfig, schema: &PlaceSchema, settings: &SimSettings) -> Result<()> {
    let mut controller = StepController::from_config_with_seed(&config, schema, settings.seed)?;
    controller.set_step_interval(settings.step_interval_ms);
    controller.set_log_capacity(settings.log_capacity);
    controller.net().log_diagnostics();

    let (events, _) = broadcast::channel(64);
    let state = AppState {
        shared: Arc::new(Mutex::new(Shared {
            controller,
            config,
            stats: RuntimeStats::default(),
        })),
        events,
    };

    let stepper = tokio::spawn(auto_step_loop(state.clone()));

    let app = Router::new()
        .route("/ws", any(ws_handler))
        .with_state(state);
    let listener = TcpListener::bind(&settings.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.listen_addr))?;
    log::info!("runtime server listening on ws://{}/ws", settings.listen_addr);

    let result = axum::serve(listener, app).await;
    stepper.abort();
    result.context("server terminated")
}

/// Periodic stepping. The controller is restarted whenever injections
/// made something enabled again; a tick that fires broadcasts the
/// firing, any token destruction, and a fresh snapshot.
async fn auto_step_loop(state: AppState) {
    loop {
        let interval = {
            let shared = state.shared.lock().await;
            shared.controller.step_interval()
        };
        tokio::time::sleep(interval).await;

        let update = {
            let mut shared = state.shared.lock().await;
            if !shared.controller.is_running() {
                shared.controller.start();
            }
            let Some(report) = shared.controller.tick() else {
                continue;
            };
            shared.stats.epoch += 1;
            shared.stats.transitions_fired += 1;
            shared.stats.tokens_processed += 1;
            (report, shared.stats.epoch, shared.snapshot())
        };

        let (report, epoch, snapshot) = update;
        for message in firing_messages(report, epoch, snapshot) {
            state.broadcast(message);
        }
    }
}

/// The broadcast sequence for one firing: the firing itself, a
/// `token_exited` when the merged token reached no place, then the
/// snapshot reflecting the new distribution.
fn firing_messages(report: StepReport, epoch: u64, snapshot: StateSnapshot) -> Vec<ServerMessage> {
    let mut messages = vec![ServerMessage::TransitionFired {
        transition_id: report.fired.to_string(),
        epoch,
    }];
    if report.destroyed {
        messages.push(ServerMessage::TokenExited {
            place_id: report.consumed_from.to_string(),
            token_id: report.token_id,
        });
    }
    messages.push(ServerMessage::StateSnapshot(snapshot));
    messages
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let mut events = state.events.subscribe();

    let (config, snapshot) = {
        let shared = state.shared.lock().await;
        (shared.config.clone(), shared.snapshot())
    };
    if send(&mut socket, &ServerMessage::Config(config)).await.is_err() {
        return;
    }
    if send(&mut socket, &ServerMessage::StateSnapshot(snapshot)).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(message) => {
                    if send(&mut socket, &message).await.is_err() {
                        break;
                    }
                }
                // Lagged receivers just miss intermediate snapshots.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    handle_client_message(&state, &mut socket, text.as_str()).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    log::debug!("websocket error: {err}");
                    break;
                }
            },
        }
    }
}

async fn handle_client_message(state: &AppState, socket: &mut WebSocket, raw: &str) {
    let message: ClientMessage = match serde_json::from_str(raw) {
        Ok(message) => message,
        Err(err) => {
            log::warn!("unparseable client message: {err}");
            return;
        }
    };

    match message {
        ClientMessage::InjectToken { entrypoint_id, data } => {
            let (token, snapshot) = {
                let mut shared = state.shared.lock().await;
                let actors = actors_from_data(&data);
                let id = shared
                    .controller
                    .inject_token(PlaceRef::parse(&entrypoint_id), actors);
                shared.stats.tokens_processed += 1;
                let token = TokenInfo {
                    id,
                    data: data.clone(),
                };
                (token, shared.snapshot())
            };
            state.broadcast(ServerMessage::TokenEntered {
                place_id: entrypoint_id,
                token,
            });
            state.broadcast(ServerMessage::StateSnapshot(snapshot));
        }
        ClientMessage::QueryPlace { place_id } => {
            let tokens = {
                let shared = state.shared.lock().await;
                shared
                    .controller
                    .distribution()
                    .tokens(&PlaceRef::parse(&place_id))
                    .iter()
                    .map(TokenInfo::from)
                    .collect()
            };
            let _ = send(socket, &ServerMessage::PlaceTokens { place_id, tokens }).await;
        }
        ClientMessage::RequestState => {
            let snapshot = {
                let shared = state.shared.lock().await;
                shared.snapshot()
            };
            let _ = send(socket, &ServerMessage::StateSnapshot(snapshot)).await;
        }
    }
}

/// Injected payloads may carry an `actors` array in the token's own
/// shape; anything else rides along as an empty actor list.
fn actors_from_data(data: &serde_json::Value) -> Vec<Actor> {
    data.get("actors")
        .and_then(|actors| serde_json::from_value(actors.clone()).ok())
        .unwrap_or_default()
}

async fn send(socket: &mut WebSocket, message: &ServerMessage) -> Result<()> {
    let text = serde_json::to_string(message)?;
    socket.send(Message::Text(text.into())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::core::Net;
    use crate::net::structure::{OutputArc, Place, Transition};

    #[test]
    fn sink_firing_broadcasts_token_exited() {
        let mut net = Net::empty();
        net.add_place(Place::plain("exit"));
        net.add_transition(Transition::new(
            "consume",
            vec![PlaceRef::plain("exit")],
            vec![],
        ));

        let mut controller = StepController::with_seed(net, 1);
        let id = controller.inject_token(PlaceRef::plain("exit"), Vec::new());
        assert!(controller.start());
        let report = controller.tick().unwrap();

        let messages = firing_messages(report, 1, StateSnapshot::default());
        assert!(matches!(
            &messages[0],
            ServerMessage::TransitionFired { transition_id, epoch: 1 }
                if transition_id == "consume"
        ));
        assert!(matches!(
            &messages[1],
            ServerMessage::TokenExited { place_id, token_id }
                if place_id == "exit" && *token_id == id
        ));
        assert!(matches!(messages[2], ServerMessage::StateSnapshot(_)));
    }

    #[test]
    fn delivering_firing_skips_token_exited() {
        let mut net = Net::empty();
        net.add_place(Place::plain("a"));
        net.add_place(Place::plain("b"));
        net.add_transition(Transition::new(
            "move",
            vec![PlaceRef::plain("a")],
            vec![OutputArc::to("b")],
        ));

        let mut controller = StepController::with_seed(net, 1);
        controller.inject_token(PlaceRef::plain("a"), Vec::new());
        let report = controller.manual_step().unwrap();

        let messages = firing_messages(report, 1, StateSnapshot::default());
        assert_eq!(messages.len(), 2);
        assert!(
            !messages
                .iter()
                .any(|m| matches!(m, ServerMessage::TokenExited { .. }))
        );
    }

    #[test]
    fn actors_parse_from_inject_payload() {
        let data = serde_json::json!({
            "actors": [ { "type": "user::Vehicle", "id": "v1", "params": {} } ]
        });
        let actors = actors_from_data(&data);
        assert_eq!(actors.len(), 1);
        assert_eq!(actors[0].kind, "user::Vehicle");

        assert!(actors_from_data(&serde_json::json!({ "foo": 1 })).is_empty());
    }
}
