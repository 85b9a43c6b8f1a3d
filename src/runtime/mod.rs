//! Remote runtime protocol: the JSON message channel a monitoring
//! client speaks with a net execution server. Messages are externally
//! tagged as `{ "type": ..., "payload": ... }` with camelCase payload
//! fields, matching the editor's wire format.

pub mod server;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::net::io::NetConfig;
use crate::net::structure::Token;
use crate::sim::store::TokenStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeStats {
    pub epoch: u64,
    pub transitions_fired: u64,
    pub tokens_processed: u64,
    pub active_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub id: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl From<&Token> for TokenInfo {
    fn from(token: &Token) -> Self {
        Self {
            id: token.id.clone(),
            data: serde_json::json!({ "actors": token.actors }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceState {
    pub tokens: Vec<TokenInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Keyed by place-or-subplace wire id; mirrors the token store's
    /// distribution shape.
    pub places: IndexMap<String, PlaceState>,
    pub stats: RuntimeStats,
}

impl StateSnapshot {
    pub fn from_store(store: &TokenStore, stats: RuntimeStats) -> Self {
        let mut places = IndexMap::new();
        for (place, tokens) in store.distribution().iter() {
            places.insert(
                place.to_string(),
                PlaceState {
                    tokens: tokens.iter().map(TokenInfo::from).collect(),
                },
            );
        }
        Self { places, stats }
    }
}

/// Messages sent from the execution server to monitoring clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    Config(NetConfig),
    StateSnapshot(StateSnapshot),
    #[serde(rename_all = "camelCase")]
    TokenEntered { place_id: String, token: TokenInfo },
    #[serde(rename_all = "camelCase")]
    TokenExited { place_id: String, token_id: String },
    #[serde(rename_all = "camelCase")]
    TransitionFired { transition_id: String, epoch: u64 },
    #[serde(rename_all = "camelCase")]
    PlaceTokens {
        place_id: String,
        tokens: Vec<TokenInfo>,
    },
}

/// Messages a client sends to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    InjectToken {
        entrypoint_id: String,
        #[serde(default)]
        data: serde_json::Value,
    },
    #[serde(rename_all = "camelCase")]
    QueryPlace { place_id: String },
    RequestState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ids::PlaceRef;

    #[test]
    fn server_message_tags_match_the_wire_protocol() {
        let msg = ServerMessage::TransitionFired {
            transition_id: "t1".to_owned(),
            epoch: 4,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "transition_fired");
        assert_eq!(json["payload"]["transitionId"], "t1");
        assert_eq!(json["payload"]["epoch"], 4);
    }

    #[test]
    fn client_messages_parse_from_the_wire() {
        let inject: ClientMessage = serde_json::from_str(
            r#"{ "type": "inject_token", "payload": { "entrypointId": "entry", "data": {} } }"#,
        )
        .unwrap();
        assert!(matches!(
            inject,
            ClientMessage::InjectToken { ref entrypoint_id, .. } if entrypoint_id == "entry"
        ));

        let request: ClientMessage =
            serde_json::from_str(r#"{ "type": "request_state" }"#).unwrap();
        assert!(matches!(request, ClientMessage::RequestState));
    }

    #[test]
    fn snapshot_mirrors_the_distribution_shape() {
        let mut store = TokenStore::new();
        store.inject(PlaceRef::parse("entry"), Token::new("token_1"));
        store.inject(PlaceRef::parse("act::success"), Token::new("token_2"));

        let snapshot = StateSnapshot::from_store(&store, RuntimeStats::default());
        assert_eq!(snapshot.places["entry"].tokens[0].id, "token_1");
        assert_eq!(snapshot.places["act::success"].tokens.len(), 1);
    }
}
