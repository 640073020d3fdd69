//! Target-table declaration
//!
//! A [`TableSpec`] describes everything the normalization engine and the
//! loader need to know about the warehouse table: which flattened source
//! paths are selected, how they are renamed, and the declared type and
//! constraints of every target column. The delivery-attempts table is the
//! one shipped spec; it is declared statically in [`delivery_attempts`].

use serde::{Deserialize, Serialize};

/// Semantic type of a target column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// String/text column
    String,

    /// 64-bit integer column
    Int,

    /// Boolean column
    Bool,

    /// Timestamp column (rendered in the deployment timezone)
    Timestamp,
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "STRING"),
            Self::Int => write!(f, "INT"),
            Self::Bool => write!(f, "BOOL"),
            Self::Timestamp => write!(f, "TIMESTAMP"),
        }
    }
}

/// A declared column of the target table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Target column name
    pub name: String,

    /// Declared semantic type
    pub column_type: ColumnType,

    /// Maximum length in characters for string columns
    pub max_chars: Option<usize>,

    /// Strip leading/trailing whitespace before truncating
    pub trim: bool,

    /// Treat a missing value as `false` before type coercion
    pub prefill_false: bool,

    /// Coercion failure falls back to `false` instead of failing the batch
    pub lenient_bool: bool,
}

impl ColumnSpec {
    /// Create a new column with no constraints
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            max_chars: None,
            trim: false,
            prefill_false: false,
            lenient_bool: false,
        }
    }

    /// Clip the column to a maximum number of characters
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = Some(max_chars);
        self
    }

    /// Strip surrounding whitespace before clipping
    pub fn trimmed(mut self) -> Self {
        self.trim = true;
        self
    }

    /// Default a missing value to `false` ahead of coercion
    pub fn prefilled_false(mut self) -> Self {
        self.prefill_false = true;
        self
    }

    /// Tolerate uncoercible values by defaulting to `false`
    pub fn lenient(mut self) -> Self {
        self.lenient_bool = true;
        self
    }
}

/// The fixed shape of one warehouse table
///
/// `source_paths` are dotted paths into the flattened document; `renames`
/// map cleaned-up source keys onto target column names; `columns` is the
/// declared target column list in warehouse order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Dotted source paths to project onto
    pub source_paths: Vec<String>,

    /// Cleaned source key -> target column name
    pub renames: Vec<(String, String)>,

    /// Ordered target columns
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    /// Find a declared column by target name
    pub fn find_column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Target column names in warehouse order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Apply the rename map to a cleaned source key
    pub fn rename<'a>(&'a self, key: &'a str) -> &'a str {
        self.renames
            .iter()
            .find(|(from, _)| from == key)
            .map(|(_, to)| to.as_str())
            .unwrap_or(key)
    }
}

/// The delivery-attempts table declaration
///
/// Column order matches the warehouse DDL and the bulk-copy column list
/// exactly. The `consignee_rescheduleDate` column has no mapped source
/// path and is always defaulted; its source path is still selected so the
/// projection stays faithful to the declared list.
pub fn delivery_attempts() -> TableSpec {
    let source_paths = [
        "_id",
        "deliveryId",
        "trackingNumber",
        "business._id",
        "business.name",
        "createdAt",
        "updatedAt",
        "state",
        "type",
        "attemptDate",
        "star._id",
        "star.name",
        "country.name",
        "warehouse.name",
        "routeId",
        "consignee.name",
        "exception.reason",
        "exception.time",
        "exception.whatsAppVerification.time",
        "exception.fakeAttempt",
        "exception.whatsAppVerification.verified",
        "returnGroupId",
        "star.phone",
        "exception.whatsAppVerification.fakeAttempt",
        "exception.whatsAppVerification.conversationStatus.conversationStartedSuccessfully",
        "exception.whatsAppVerification.conversationStatus.time",
        "exception.whatsAppVerification.consigneeRescheduleData.rescheduleDate",
    ]
    .into_iter()
    .map(String::from)
    .collect();

    let renames = [
        ("_id", "id"),
        ("deliveryId", "delivery_id"),
        ("type", "attempt_type"),
        ("attemptDate", "date"),
        ("routeId", "route_id"),
        ("exception_time", "exception_at"),
        (
            "exception_whatsAppVerification_conversationStatus_conversationStartedSuccessfully",
            "conversationStartedSuccessfully",
        ),
        (
            "exception_whatsAppVerification_conversationStatus_time",
            "exception_conversationStatus_time",
        ),
    ]
    .into_iter()
    .map(|(from, to)| (from.to_string(), to.to_string()))
    .collect();

    let columns = vec![
        ColumnSpec::new("id", ColumnType::String),
        ColumnSpec::new("delivery_id", ColumnType::String),
        ColumnSpec::new("trackingNumber", ColumnType::Int),
        ColumnSpec::new("createdAt", ColumnType::Timestamp),
        ColumnSpec::new("updatedAt", ColumnType::Timestamp),
        ColumnSpec::new("state", ColumnType::Int),
        ColumnSpec::new("attempt_type", ColumnType::String),
        ColumnSpec::new("date", ColumnType::Timestamp),
        ColumnSpec::new("route_id", ColumnType::String),
        ColumnSpec::new("business_id", ColumnType::String),
        ColumnSpec::new("business_name", ColumnType::String).with_max_chars(300),
        ColumnSpec::new("exception_at", ColumnType::Timestamp),
        ColumnSpec::new("star_id", ColumnType::String),
        ColumnSpec::new("star_name", ColumnType::String).with_max_chars(300),
        ColumnSpec::new("country_name", ColumnType::String),
        ColumnSpec::new("warehouse_name", ColumnType::String),
        ColumnSpec::new("consignee_name", ColumnType::String)
            .trimmed()
            .with_max_chars(150),
        ColumnSpec::new("exception_reason", ColumnType::String)
            .trimmed()
            .with_max_chars(200),
        ColumnSpec::new("exception_whatsAppVerification_time", ColumnType::Timestamp),
        ColumnSpec::new("exception_fakeAttempt", ColumnType::Bool),
        ColumnSpec::new("exception_whatsAppVerification_verified", ColumnType::Bool).lenient(),
        ColumnSpec::new("returnGroupId", ColumnType::String),
        ColumnSpec::new("star_phone", ColumnType::String),
        ColumnSpec::new("exception_whatsAppVerification_fakeAttempt", ColumnType::Bool)
            .prefilled_false()
            .lenient(),
        ColumnSpec::new("conversationStartedSuccessfully", ColumnType::Bool).prefilled_false(),
        ColumnSpec::new("exception_conversationStatus_time", ColumnType::Timestamp),
        ColumnSpec::new("consignee_rescheduleDate", ColumnType::Timestamp),
    ];

    TableSpec {
        source_paths,
        renames,
        columns,
    }
}
