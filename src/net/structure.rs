//! Static structure elements of a behavior net: places, transitions,
//! output arcs, tokens and the token distribution.
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::net::ids::{PlaceId, PlaceRef, Subplace, TransitionId};

pub type Priority = u32;

pub const DEFAULT_PRIORITY: Priority = 1;

/// Validated per-type configuration of a place. The editor-side schema is
/// an open set of place types; the engine only distinguishes action places
/// (the ones with outcome subplaces) from everything else, and action
/// parameters are checked once at topology load so no step ever reads a
/// raw parameter bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaceKind {
    Plain,
    Action(ActionParams),
}

impl PlaceKind {
    pub fn is_action(&self) -> bool {
        matches!(self, PlaceKind::Action(_))
    }

    pub fn action_params(&self) -> Option<&ActionParams> {
        match self {
            PlaceKind::Plain => None,
            PlaceKind::Action(params) => Some(params),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionParams {
    /// Redraws granted after a `failure` outcome.
    pub retries: u32,
    /// Promote a final `failure` outcome to `error`.
    pub failure_as_error: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub id: PlaceId,
    /// Schema type name, opaque to the engine.
    pub type_name: String,
    pub kind: PlaceKind,
    /// Advisory bound; injection beyond it is logged, never rejected.
    pub capacity: Option<u64>,
}

impl Place {
    pub fn new(id: impl Into<PlaceId>, type_name: impl Into<String>, kind: PlaceKind) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            kind,
            capacity: None,
        }
    }

    pub fn plain(id: impl Into<PlaceId>) -> Self {
        Self::new(id, "plain", PlaceKind::Plain)
    }

    pub fn action(id: impl Into<PlaceId>, params: ActionParams) -> Self {
        Self::new(id, "action", PlaceKind::Action(params))
    }

    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = Some(capacity);
        self
    }
}

/// One output reference of a transition. An optional actor-type filter
/// narrows the merged token before delivery; an empty-after-filter token
/// skips the output entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputArc {
    pub target: PlaceId,
    pub token_filter: Option<String>,
}

impl OutputArc {
    pub fn to(target: impl Into<PlaceId>) -> Self {
        Self {
            target: target.into(),
            token_filter: None,
        }
    }

    pub fn filtered(target: impl Into<PlaceId>, actor_kind: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            token_filter: Some(actor_kind.into()),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub id: TransitionId,
    pub inputs: Vec<PlaceRef>,
    pub outputs: Vec<OutputArc>,
    pub priority: Priority,
}

impl Transition {
    pub fn new(
        id: impl Into<TransitionId>,
        inputs: Vec<PlaceRef>,
        outputs: Vec<OutputArc>,
    ) -> Self {
        Self {
            id: id.into(),
            inputs,
            outputs,
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority.max(1);
        self
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Transition").field(&self.id.0).finish()
    }
}

/// An actor payload carried by a token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    /// Actor type id, e.g. `user::Vehicle`.
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl Actor {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            params: serde_json::Value::Null,
        }
    }
}

/// An immutable unit of flow. Firing never mutates a token in place; it
/// produces new merged or narrowed token values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    #[serde(default)]
    pub actors: Vec<Actor>,
}

impl Token {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            actors: Vec::new(),
        }
    }

    pub fn with_actors(id: impl Into<String>, actors: Vec<Actor>) -> Self {
        Self {
            id: id.into(),
            actors,
        }
    }

    /// New token holding only the actors of the given kind, or `None`
    /// when nothing matches.
    pub fn narrowed_to(&self, actor_kind: &str) -> Option<Token> {
        let actors: Vec<Actor> = self
            .actors
            .iter()
            .filter(|actor| actor.kind == actor_kind)
            .cloned()
            .collect();
        if actors.is_empty() {
            None
        } else {
            Some(Token {
                id: self.id.clone(),
                actors,
            })
        }
    }
}

/// Token lists per place or subplace, FIFO within a place: index 0 is
/// the oldest token and the one consumed first. Iteration
/// order of the map is insertion order, which keeps snapshots and
/// serialized output stable.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Distribution(pub IndexMap<PlaceRef, Vec<Token>>);

impl Distribution {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn tokens(&self, place: &PlaceRef) -> &[Token] {
        self.0.get(place).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, place: &PlaceRef) -> usize {
        self.0.get(place).map_or(0, Vec::len)
    }

    pub fn is_empty_at(&self, place: &PlaceRef) -> bool {
        self.count(place) == 0
    }

    /// Append to the tail (newest position) of a place.
    pub fn push_back(&mut self, place: PlaceRef, token: Token) {
        self.0.entry(place).or_default().push(token);
    }

    /// Consume the head (oldest token) of a place.
    pub fn pop_front(&mut self, place: &PlaceRef) -> Option<Token> {
        let queue = self.0.get_mut(place)?;
        if queue.is_empty() {
            None
        } else {
            Some(queue.remove(0))
        }
    }

    /// Remove the most recently added token of a place.
    pub fn pop_back(&mut self, place: &PlaceRef) -> Option<Token> {
        self.0.get_mut(place).and_then(Vec::pop)
    }

    /// Total number of tokens across all places and subplaces.
    pub fn total(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    /// Token count at `place`, optionally folding in its subplaces.
    pub fn count_at_base(&self, place: &PlaceId, include_subplaces: bool) -> usize {
        let mut count = self.count(&PlaceRef::Plain(place.clone()));
        if include_subplaces {
            for subplace in Subplace::ALL {
                count += self.count(&PlaceRef::Sub(place.clone(), subplace));
            }
        }
        count
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PlaceRef, &Vec<Token>)> {
        self.0.iter()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl fmt::Debug for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (place, queue) in self.iter() {
            map.entry(&place.to_string(), &queue.len());
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distribution_is_fifo_per_place() {
        let mut dist = Distribution::new();
        let place = PlaceRef::plain("queue");
        dist.push_back(place.clone(), Token::new("t1"));
        dist.push_back(place.clone(), Token::new("t2"));

        assert_eq!(dist.count(&place), 2);
        assert_eq!(dist.pop_front(&place).unwrap().id, "t1");
        assert_eq!(dist.pop_front(&place).unwrap().id, "t2");
        assert!(dist.pop_front(&place).is_none());
    }

    #[test]
    fn pop_back_removes_newest() {
        let mut dist = Distribution::new();
        let place = PlaceRef::plain("queue");
        dist.push_back(place.clone(), Token::new("old"));
        dist.push_back(place.clone(), Token::new("new"));

        assert_eq!(dist.pop_back(&place).unwrap().id, "new");
        assert_eq!(dist.tokens(&place)[0].id, "old");
    }

    #[test]
    fn count_at_base_folds_subplaces() {
        let mut dist = Distribution::new();
        let base = PlaceId::new("act");
        dist.push_back(PlaceRef::Plain(base.clone()), Token::new("a"));
        dist.push_back(
            PlaceRef::Sub(base.clone(), Subplace::Success),
            Token::new("b"),
        );
        dist.push_back(
            PlaceRef::Sub(base.clone(), Subplace::Error),
            Token::new("c"),
        );

        assert_eq!(dist.count_at_base(&base, false), 1);
        assert_eq!(dist.count_at_base(&base, true), 3);
    }

    #[test]
    fn narrowed_token_keeps_only_matching_actors() {
        let token = Token::with_actors(
            "t1",
            vec![Actor::new("user::Vehicle", "v1"), Actor::new("user::Driver", "d1")],
        );
        let narrowed = token.narrowed_to("user::Vehicle").unwrap();
        assert_eq!(narrowed.id, "t1");
        assert_eq!(narrowed.actors.len(), 1);
        assert_eq!(narrowed.actors[0].id, "v1");

        assert!(token.narrowed_to("user::Robot").is_none());
    }
}
