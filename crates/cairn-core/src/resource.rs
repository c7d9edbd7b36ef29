//! Resource descriptors and loaded payloads.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// What a resource is, which decides how its body is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Image,
    Audio,
    Json,
    Text,
    Binary,
}

/// Admission priority for queued resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low = 0,
    #[default]
    Medium = 1,
    High = 2,
    Critical = 3,
}

/// A unit of work submitted to the load queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Caller-assigned identifier.
    pub id: String,
    pub kind: ResourceKind,
    /// Fetch target.
    pub locator: String,
    #[serde(default)]
    pub priority: Priority,
    /// Consult the cache first and store successful loads.
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
}

fn default_use_cache() -> bool {
    true
}

impl ResourceDescriptor {
    pub fn new(id: impl Into<String>, kind: ResourceKind, locator: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            locator: locator.into(),
            priority: Priority::default(),
            use_cache: true,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Cache key under which this resource's payload is stored.
    pub fn cache_key(&self) -> String {
        format!("resource:{}", self.locator)
    }
}

/// A decoded resource body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "encoding", content = "data", rename_all = "snake_case")]
pub enum ResourcePayload {
    Json(serde_json::Value),
    Text(String),
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
}

impl ResourcePayload {
    /// Decode a raw body according to the resource kind.
    pub fn decode(kind: ResourceKind, body: Vec<u8>) -> crate::Result<Self> {
        match kind {
            ResourceKind::Json => Ok(ResourcePayload::Json(serde_json::from_slice(&body)?)),
            ResourceKind::Text => String::from_utf8(body)
                .map(ResourcePayload::Text)
                .map_err(|e| crate::Error::Serialization(format!("Body is not UTF-8: {}", e))),
            ResourceKind::Image | ResourceKind::Audio | ResourceKind::Binary => {
                Ok(ResourcePayload::Bytes(body))
            }
        }
    }

    /// Approximate in-memory size of the decoded body.
    pub fn len(&self) -> usize {
        match self {
            ResourcePayload::Json(value) => value.to_string().len(),
            ResourcePayload::Text(text) => text.len(),
            ResourcePayload::Bytes(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

mod base64_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn test_decode_by_kind() {
        let json = ResourcePayload::decode(ResourceKind::Json, br#"{"hp": 10}"#.to_vec()).unwrap();
        assert_eq!(json, ResourcePayload::Json(serde_json::json!({"hp": 10})));

        let text = ResourcePayload::decode(ResourceKind::Text, b"hello".to_vec()).unwrap();
        assert_eq!(text, ResourcePayload::Text("hello".to_string()));

        let image = ResourcePayload::decode(ResourceKind::Image, vec![0x89, 0x50]).unwrap();
        assert_eq!(image, ResourcePayload::Bytes(vec![0x89, 0x50]));
    }

    #[test]
    fn test_decode_rejects_bad_json() {
        assert!(ResourcePayload::decode(ResourceKind::Json, b"{not json".to_vec()).is_err());
    }

    #[test]
    fn test_bytes_serialize_as_base64() {
        let payload = ResourcePayload::Bytes(vec![1, 2, 3]);
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"encoding":"bytes","data":"AQID"}"#);
    }

    #[test]
    fn test_descriptor_defaults_from_json() {
        let descriptor: ResourceDescriptor = serde_json::from_str(
            r#"{"id": "tile-1", "kind": "image", "locator": "https://cdn.test/tile.png"}"#,
        )
        .unwrap();
        assert_eq!(descriptor.priority, Priority::Medium);
        assert!(descriptor.use_cache);
        assert_eq!(descriptor.cache_key(), "resource:https://cdn.test/tile.png");
    }
}
