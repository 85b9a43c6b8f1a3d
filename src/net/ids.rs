use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

macro_rules! define_id {
    ($name:ident) => {
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, stringify!($name))?;
                f.debug_tuple("").field(&self.0).finish()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }
    };
}

define_id!(PlaceId);
define_id!(TransitionId);

/// Outcome sub-container of an action place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subplace {
    InProgress,
    Success,
    Failure,
    Error,
}

impl Subplace {
    pub const ALL: [Subplace; 4] = [
        Subplace::InProgress,
        Subplace::Success,
        Subplace::Failure,
        Subplace::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Subplace::InProgress => "in_progress",
            Subplace::Success => "success",
            Subplace::Failure => "failure",
            Subplace::Error => "error",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "in_progress" => Some(Subplace::InProgress),
            "success" => Some(Subplace::Success),
            "failure" => Some(Subplace::Failure),
            "error" => Some(Subplace::Error),
            _ => None,
        }
    }
}

impl fmt::Display for Subplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A place-or-subplace reference. The wire form is `id` for plain places
/// and `id::suffix` for subplaces; the `::` spelling exists only at the
/// serialization boundary.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlaceRef {
    Plain(PlaceId),
    Sub(PlaceId, Subplace),
}

impl PlaceRef {
    pub fn plain(id: impl Into<PlaceId>) -> Self {
        PlaceRef::Plain(id.into())
    }

    pub fn sub(id: impl Into<PlaceId>, subplace: Subplace) -> Self {
        PlaceRef::Sub(id.into(), subplace)
    }

    /// Parse the wire form. A trailing `::suffix` that is not one of the
    /// four known subplace names is kept as part of a plain id; the
    /// distribution treats unknown keys like any other place.
    pub fn parse(raw: &str) -> Self {
        if let Some((base, suffix)) = raw.rsplit_once("::") {
            if let Some(subplace) = Subplace::parse(suffix) {
                return PlaceRef::Sub(PlaceId::new(base), subplace);
            }
        }
        PlaceRef::Plain(PlaceId::new(raw))
    }

    /// The owning place id, regardless of variant.
    pub fn base(&self) -> &PlaceId {
        match self {
            PlaceRef::Plain(id) => id,
            PlaceRef::Sub(id, _) => id,
        }
    }

    pub fn subplace(&self) -> Option<Subplace> {
        match self {
            PlaceRef::Plain(_) => None,
            PlaceRef::Sub(_, subplace) => Some(*subplace),
        }
    }
}

impl fmt::Display for PlaceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaceRef::Plain(id) => write!(f, "{id}"),
            PlaceRef::Sub(id, subplace) => write!(f, "{id}::{subplace}"),
        }
    }
}

impl fmt::Debug for PlaceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlaceRef({self})")
    }
}

impl FromStr for PlaceRef {
    type Err = std::convert::Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(PlaceRef::parse(raw))
    }
}

impl From<&str> for PlaceRef {
    fn from(raw: &str) -> Self {
        PlaceRef::parse(raw)
    }
}

impl From<PlaceId> for PlaceRef {
    fn from(id: PlaceId) -> Self {
        PlaceRef::Plain(id)
    }
}

impl Serialize for PlaceRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PlaceRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(PlaceRef::parse(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn place_ref_wire_round_trip() {
        let plain = PlaceRef::parse("buffer");
        assert_eq!(plain, PlaceRef::plain("buffer"));
        assert_eq!(plain.to_string(), "buffer");

        let sub = PlaceRef::parse("ship_order::success");
        assert_eq!(sub, PlaceRef::sub("ship_order", Subplace::Success));
        assert_eq!(sub.to_string(), "ship_order::success");
        assert_eq!(sub.base(), &PlaceId::new("ship_order"));
    }

    #[test]
    fn unknown_suffix_stays_plain() {
        let weird = PlaceRef::parse("ns::thing");
        assert_eq!(weird, PlaceRef::Plain(PlaceId::new("ns::thing")));
        assert_eq!(weird.to_string(), "ns::thing");
    }

    #[test]
    fn serde_uses_wire_form() {
        let sub = PlaceRef::sub("act", Subplace::Error);
        let json = serde_json::to_string(&sub).unwrap();
        assert_eq!(json, "\"act::error\"");
        let back: PlaceRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sub);
    }
}
