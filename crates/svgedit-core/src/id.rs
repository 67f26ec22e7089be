use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// Process-unique identity of a document element.
///
/// Assigned when an element is parsed or synthesized and never derived from
/// its content, so two structurally equal elements still differ. Copy, Eq and
/// Hash in O(1); this is the only key used for cross-structure references.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(Uuid);

impl ElementId {
    /// Generate a fresh random identity.
    pub fn fresh() -> Self {
        ElementId(Uuid::new_v4())
    }

    /// Parse a hyphenated uuid string, as echoed back by a host.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(ElementId)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0.simple())
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl Serialize for ElementId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ElementId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ElementId::parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid element id `{s}`")))
    }
}
