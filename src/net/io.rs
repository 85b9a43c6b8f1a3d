//! I/O boundary: the camelCase JSON net-config format of the editor,
//! the place-type schema, and JSON/RON (de)serialization helpers.
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use indexmap::IndexMap;
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::net::core::Net;
use crate::net::ids::PlaceRef;
use crate::net::structure::{
    ActionParams, OutputArc, Place, PlaceKind, Transition, DEFAULT_PRIORITY,
};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ron error: {0}")]
    Ron(#[from] ron::Error),
    #[error("ron parse error: {0}")]
    RonParse(#[from] ron::error::SpannedError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("duplicate place id {0}")]
    DuplicatePlace(String),
    #[error("duplicate transition id {0}")]
    DuplicateTransition(String),
    #[error("transition {0} has priority 0; priorities start at 1")]
    BadPriority(String),
    #[error("place {place}: parameter {param} {reason}")]
    BadParam {
        place: String,
        param: &'static str,
        reason: &'static str,
    },
}

/// Editor metadata carried through import/export untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_capacity: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_filter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionConfig {
    pub id: String,
    #[serde(default)]
    pub from: Vec<String>,
    #[serde(default)]
    pub to: Vec<OutputConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityConfig {
    pub success: f64,
    pub failure: f64,
    pub error: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfig {
    #[serde(default)]
    pub action_probabilities: IndexMap<String, ProbabilityConfig>,
}

/// The complete net configuration as exported by the editor. Actor and
/// action catalogs are opaque to the engine and pass through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetConfig {
    #[serde(default)]
    pub actors: Vec<serde_json::Value>,
    #[serde(default)]
    pub actions: Vec<serde_json::Value>,
    #[serde(default)]
    pub places: Vec<PlaceConfig>,
    #[serde(default)]
    pub transitions: Vec<TransitionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulation: Option<SimulationConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceTypeDef {
    #[serde(default)]
    pub has_subplaces: bool,
    #[serde(default)]
    pub subplaces: Vec<String>,
}

/// The externally supplied place-type schema (`supported_places.json`).
/// Everything but the subplace flag is presentation-layer data and is
/// not modeled here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceSchema {
    pub place_types: IndexMap<String, PlaceTypeDef>,
}

impl PlaceSchema {
    pub fn has_subplaces(&self, type_name: &str) -> bool {
        self.place_types
            .get(type_name)
            .map(|def| def.has_subplaces)
            .unwrap_or(false)
    }
}

impl Default for PlaceSchema {
    /// Built-in fallback mirroring the editor's default tool config.
    fn default() -> Self {
        let mut place_types = IndexMap::new();
        for name in ["entrypoint", "resource_pool", "wait_with_timeout", "exit_logger", "plain"] {
            place_types.insert(name.to_owned(), PlaceTypeDef::default());
        }
        place_types.insert(
            "action".to_owned(),
            PlaceTypeDef {
                has_subplaces: true,
                subplaces: vec![
                    "success".to_owned(),
                    "failure".to_owned(),
                    "error".to_owned(),
                ],
            },
        );
        Self { place_types }
    }
}

impl NetConfig {
    /// Validate the raw configuration against `schema` and build the
    /// read-only topology. All parameter-bag reads happen here, once;
    /// the engine never sees an unchecked value.
    pub fn build_net(&self, schema: &PlaceSchema) -> Result<Net, ConfigError> {
        let mut net = Net::empty();

        for place in &self.places {
            if net.place(&place.id.as_str().into()).is_some() {
                return Err(ConfigError::DuplicatePlace(place.id.clone()));
            }
            let kind = if schema.has_subplaces(&place.type_name) {
                PlaceKind::Action(parse_action_params(place)?)
            } else {
                PlaceKind::Plain
            };
            let mut built = Place::new(place.id.as_str(), place.type_name.as_str(), kind);
            built.capacity = place.token_capacity;
            net.add_place(built);
        }

        for transition in &self.transitions {
            if net.transition(&transition.id.as_str().into()).is_some() {
                return Err(ConfigError::DuplicateTransition(transition.id.clone()));
            }
            if transition.priority == Some(0) {
                return Err(ConfigError::BadPriority(transition.id.clone()));
            }
            let inputs = transition
                .from
                .iter()
                .map(|raw| PlaceRef::parse(raw))
                .collect();
            let outputs = transition
                .to
                .iter()
                .map(|output| OutputArc {
                    target: output.to.as_str().into(),
                    token_filter: output.token_filter.clone(),
                })
                .collect();
            net.add_transition(
                Transition::new(transition.id.as_str(), inputs, outputs)
                    .with_priority(transition.priority.unwrap_or(DEFAULT_PRIORITY)),
            );
        }

        Ok(net)
    }
}

fn parse_action_params(place: &PlaceConfig) -> Result<ActionParams, ConfigError> {
    let mut params = ActionParams::default();
    if let Some(value) = place.params.get("retries") {
        params.retries = value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or(ConfigError::BadParam {
                place: place.id.clone(),
                param: "retries",
                reason: "must be a non-negative integer",
            })?;
    }
    if let Some(value) = place.params.get("failureAsError") {
        params.failure_as_error = value.as_bool().ok_or(ConfigError::BadParam {
            place: place.id.clone(),
            param: "failureAsError",
            reason: "must be a boolean",
        })?;
    }
    Ok(params)
}

pub fn to_json_string<T>(value: &T) -> Result<String, IoError>
where
    T: Serialize,
{
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn from_json_str<T>(s: &str) -> Result<T, IoError>
where
    T: DeserializeOwned,
{
    Ok(serde_json::from_str(s)?)
}

pub fn write_json<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<(), IoError> {
    let mut file = File::create(path)?;
    let content = to_json_string(value)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

pub fn read_json<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> Result<T, IoError> {
    let mut file = File::open(path)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    from_json_str(&content)
}

pub fn to_ron_string<T>(value: &T) -> Result<String, IoError>
where
    T: Serialize,
{
    Ok(ron::ser::to_string_pretty(value, PrettyConfig::default())?)
}

pub fn from_ron_str<T>(s: &str) -> Result<T, IoError>
where
    T: DeserializeOwned,
{
    Ok(ron::from_str(s)?)
}

pub fn write_ron<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<(), IoError> {
    let mut file = File::create(path)?;
    let content = to_ron_string(value)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

pub fn read_ron<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> Result<T, IoError> {
    let mut file = File::open(path)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    from_ron_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::ids::{PlaceRef, Subplace};

    const SAMPLE: &str = r#"{
        "actors": [],
        "actions": [],
        "places": [
            { "id": "entry", "type": "entrypoint", "params": {}, "position": { "x": 0, "y": 0 } },
            { "id": "ship", "type": "action",
              "params": { "retries": 2, "failureAsError": true },
              "tokenCapacity": 5 },
            { "id": "done", "type": "plain", "params": {} }
        ],
        "transitions": [
            { "id": "t1", "from": ["entry"], "to": [{ "to": "ship" }], "priority": 2 },
            { "id": "t2", "from": ["ship::success"],
              "to": [{ "to": "done", "tokenFilter": "user::Parcel" }] }
        ],
        "simulation": {
            "actionProbabilities": { "ship": { "success": 80, "failure": 15, "error": 5 } }
        }
    }"#;

    #[test]
    fn sample_config_builds_a_net() {
        let config: NetConfig = from_json_str(SAMPLE).unwrap();
        let net = config.build_net(&PlaceSchema::default()).unwrap();

        assert_eq!(net.places_len(), 3);
        assert_eq!(net.transitions_len(), 2);

        let ship = net.place(&"ship".into()).unwrap();
        let params = ship.kind.action_params().unwrap();
        assert_eq!(params.retries, 2);
        assert!(params.failure_as_error);
        assert_eq!(ship.capacity, Some(5));

        let t1 = net.transition(&"t1".into()).unwrap();
        assert_eq!(t1.priority, 2);
        let t2 = net.transition(&"t2".into()).unwrap();
        assert_eq!(t2.inputs[0], PlaceRef::sub("ship", Subplace::Success));
        assert_eq!(t2.outputs[0].token_filter.as_deref(), Some("user::Parcel"));
    }

    #[test]
    fn config_json_round_trips() {
        let config: NetConfig = from_json_str(SAMPLE).unwrap();
        let json = to_json_string(&config).unwrap();
        assert!(json.contains("\"tokenFilter\""));
        assert!(json.contains("\"actionProbabilities\""));
        let back: NetConfig = from_json_str(&json).unwrap();
        assert_eq!(back.places.len(), config.places.len());
        assert_eq!(back.transitions[1].from, config.transitions[1].from);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut config: NetConfig = from_json_str(SAMPLE).unwrap();
        config.places.push(config.places[0].clone());
        assert!(matches!(
            config.build_net(&PlaceSchema::default()),
            Err(ConfigError::DuplicatePlace(_))
        ));
    }

    #[test]
    fn bad_action_params_are_rejected_at_load() {
        let raw = r#"{
            "places": [
                { "id": "a", "type": "action", "params": { "retries": -1 } }
            ],
            "transitions": []
        }"#;
        let config: NetConfig = from_json_str(raw).unwrap();
        assert!(matches!(
            config.build_net(&PlaceSchema::default()),
            Err(ConfigError::BadParam { param: "retries", .. })
        ));
    }

    #[test]
    fn unknown_place_type_falls_back_to_plain() {
        let raw = r#"{
            "places": [ { "id": "x", "type": "mystery", "params": {} } ],
            "transitions": []
        }"#;
        let config: NetConfig = from_json_str(raw).unwrap();
        let net = config.build_net(&PlaceSchema::default()).unwrap();
        assert!(!net.place(&"x".into()).unwrap().kind.is_action());
    }

    #[test]
    fn ron_round_trip() {
        let config: NetConfig = from_json_str(SAMPLE).unwrap();
        let ron = to_ron_string(&config).unwrap();
        let back: NetConfig = from_ron_str(&ron).unwrap();
        assert_eq!(back.transitions.len(), 2);
    }
}
