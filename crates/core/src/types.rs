/// Opaque identifier used for jobs, conversations, messages, and assets.
pub type EntityId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Arbitrary nested JSON parameter mapping.
pub type Params = serde_json::Map<String, serde_json::Value>;
