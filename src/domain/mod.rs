//! Domain Types
//!
//! Records exchanged with the dispatch backend, in the backend's camelCase
//! JSON shape.

pub mod account;
pub mod config;
pub mod job;
pub mod route;
pub mod technician;

pub use account::*;
pub use job::*;
pub use route::*;
pub use technician::*;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

/// A latitude/longitude pair
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Backend identifiers arrive either as strings or as integers
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Int(n) => n.to_string(),
        }
    }
}

/// Deserialize an identifier that may be a JSON string or number
pub(crate) fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(String::from)
}

/// Optional variant of [`id_string`]
pub(crate) fn opt_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawId>::deserialize(deserializer).map(|raw| raw.map(String::from))
}

/// Unique identifier for a technician
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct TechId(pub Arc<str>);

impl TechId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Serialize for TechId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TechId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        id_string(deserializer).map(Self::new)
    }
}

impl From<&str> for TechId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TechId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for TechId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a job
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct JobId(pub Arc<str>);

impl JobId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Serialize for JobId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        id_string(deserializer).map(Self::new)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Minimal embedded person record (`technician`/`admin` relations)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonSummary {
    #[serde(default, deserialize_with = "opt_id_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_accept_strings_and_numbers() {
        let a: TechId = serde_json::from_str("\"t-1\"").expect("string id");
        let b: TechId = serde_json::from_str("42").expect("numeric id");
        assert_eq!(a.as_str(), "t-1");
        assert_eq!(b.as_str(), "42");
    }

    #[test]
    fn test_id_serializes_as_string() {
        let id = JobId::from("j-9");
        assert_eq!(serde_json::to_string(&id).expect("serialize"), "\"j-9\"");
        let tech = TechId::from("t-3");
        assert_eq!(serde_json::to_value(&tech).expect("serialize"), serde_json::json!("t-3"));
    }
}
