//! MongoDB source adapter
//!
//! Pulls delivery-attempt documents with the range filter
//! `{ "updatedAt": { "$gte": <watermark> } }`, or no filter at all when no
//! prior watermark exists.
//!
//! Driver-native scalars are converted to plain JSON before documents
//! leave this adapter: object ids become hex strings and BSON datetimes
//! become RFC 3339 strings, so the normalization engine only ever sees
//! JSON scalars.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let source = MongoSource::connect(
//!     "mongodb://localhost:27017",
//!     "operations",
//!     "deliveryAttempts",
//! ).await?;
//! let records = source.fetch_changed(Some(watermark)).await?;
//! ```

use chrono::{DateTime, Utc};
use wareflow_core::RawRecord;

#[cfg(feature = "mongodb")]
use tracing::info;

use crate::adapter::{SourceAdapter, SourceError};

#[cfg(feature = "mongodb")]
use futures::TryStreamExt;

#[cfg(feature = "mongodb")]
use mongodb::bson::{doc, Bson, Document};

/// MongoDB source adapter
pub struct MongoSource {
    /// Source database name
    database: String,

    /// Source collection name
    collection: String,

    /// Collection handle (only available with mongodb feature)
    #[cfg(feature = "mongodb")]
    handle: mongodb::Collection<Document>,

    /// Placeholder for when feature is disabled
    #[cfg(not(feature = "mongodb"))]
    _phantom: std::marker::PhantomData<()>,
}

impl MongoSource {
    /// Connect to a MongoDB deployment
    ///
    /// # Arguments
    ///
    /// * `uri` - MongoDB connection string
    /// * `database` - Source database name
    /// * `collection` - Source collection name
    #[cfg(feature = "mongodb")]
    pub async fn connect(
        uri: &str,
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> Result<Self, SourceError> {
        let database = database.into();
        let collection = collection.into();

        let client = mongodb::Client::with_uri_str(uri).await.map_err(|e| {
            SourceError::ConnectionError(format!("Failed to connect to MongoDB: {}", e))
        })?;

        let handle = client
            .database(&database)
            .collection::<Document>(&collection);

        Ok(Self {
            database,
            collection,
            handle,
        })
    }

    /// Create adapter without mongodb feature (returns error)
    #[cfg(not(feature = "mongodb"))]
    pub async fn connect(
        _uri: &str,
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> Result<Self, SourceError> {
        let _ = (database.into(), collection.into());
        Err(SourceError::ConfigError(
            "MongoDB support not compiled. Rebuild with: cargo build --features mongodb"
                .to_string(),
        ))
    }

    /// Get the source database name
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Get the source collection name
    pub fn collection(&self) -> &str {
        &self.collection
    }
}

/// Convert a BSON value into plain JSON
///
/// Object ids render as hex, datetimes as RFC 3339, decimals as strings.
/// Non-finite doubles become JSON null (they would otherwise not be
/// representable).
#[cfg(feature = "mongodb")]
fn bson_to_json(value: Bson) -> serde_json::Value {
    use serde_json::Value;

    match value {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => dt
            .try_to_rfc3339_string()
            .map(Value::String)
            .unwrap_or(Value::Null),
        Bson::Document(document) => Value::Object(
            document
                .into_iter()
                .map(|(key, child)| (key, bson_to_json(child)))
                .collect(),
        ),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        Bson::String(s) => Value::String(s),
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Int32(i) => Value::Number(i.into()),
        Bson::Int64(i) => Value::Number(i.into()),
        Bson::Double(d) => serde_json::Number::from_f64(d)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Bson::Decimal128(d) => Value::String(d.to_string()),
        Bson::Null => Value::Null,
        other => other.into_relaxed_extjson(),
    }
}

#[async_trait::async_trait]
impl SourceAdapter for MongoSource {
    fn name(&self) -> &'static str {
        "MongoDB"
    }

    #[cfg(feature = "mongodb")]
    async fn fetch_changed(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawRecord>, SourceError> {
        let filter = match since {
            Some(watermark) => doc! {
                "updatedAt": {
                    "$gte": mongodb::bson::DateTime::from_millis(watermark.timestamp_millis())
                }
            },
            None => doc! {},
        };

        let mut cursor = self
            .handle
            .find(filter)
            .await
            .map_err(|e| SourceError::QueryError(format!("MongoDB query error: {}", e)))?;

        let mut records = Vec::new();
        while let Some(document) = cursor
            .try_next()
            .await
            .map_err(|e| SourceError::QueryError(format!("MongoDB cursor error: {}", e)))?
        {
            records.push(bson_to_json(Bson::Document(document)));
        }

        info!(
            records = records.len(),
            collection = %self.collection,
            since = ?since,
            "pulled changed records"
        );

        Ok(records)
    }

    #[cfg(not(feature = "mongodb"))]
    async fn fetch_changed(
        &self,
        _since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawRecord>, SourceError> {
        Err(SourceError::ConfigError(
            "MongoDB support not compiled. Rebuild with: cargo build --features mongodb"
                .to_string(),
        ))
    }

    #[cfg(feature = "mongodb")]
    async fn test_connection(&self) -> Result<(), SourceError> {
        self.handle
            .estimated_document_count()
            .await
            .map_err(|e| SourceError::ConnectionError(format!("Connection test failed: {}", e)))?;
        Ok(())
    }

    #[cfg(not(feature = "mongodb"))]
    async fn test_connection(&self) -> Result<(), SourceError> {
        Err(SourceError::ConfigError(
            "MongoDB support not compiled. Rebuild with: cargo build --features mongodb"
                .to_string(),
        ))
    }
}

#[cfg(all(test, feature = "mongodb"))]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;
    use serde_json::json;

    #[test]
    fn object_ids_become_hex_strings() {
        let oid = ObjectId::new();
        let json = bson_to_json(Bson::ObjectId(oid));
        assert_eq!(json, json!(oid.to_hex()));
    }

    #[test]
    fn datetimes_become_rfc3339_strings() {
        let dt = mongodb::bson::DateTime::from_millis(1_704_189_600_000);
        match bson_to_json(Bson::DateTime(dt)) {
            serde_json::Value::String(s) => assert!(s.starts_with("2024-01-02T")),
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn nested_documents_convert_recursively() {
        let doc = doc! {
            "_id": "A1",
            "exception": { "whatsAppVerification": { "verified": true } },
            "state": 3_i32
        };

        let json = bson_to_json(Bson::Document(doc));
        assert_eq!(
            json,
            json!({
                "_id": "A1",
                "exception": { "whatsAppVerification": { "verified": true } },
                "state": 3
            })
        );
    }
}
