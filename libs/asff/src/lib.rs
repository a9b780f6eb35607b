//! AWS Security Finding Format records as they travel on the findings queue.
//! The filter service serializes these, the relay deserializes them, so the
//! field names here are the wire contract between the two.

pub const SCHEMA_VERSION: &str = "2018-10-08";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Finding {
    pub schema_version: String,
    pub id: String,
    pub product_arn: String,
    pub generator_id: String,
    pub aws_account_id: String,
    pub types: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    pub severity: Severity,
    pub compliance: Compliance,
    pub title: String,
    pub description: String,
    pub resources: Vec<FindingResource>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Severity {
    pub label: String,
    pub product: i64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Compliance {
    pub status: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FindingResource {
    #[serde(rename = "Type")]
    pub resource_type: String,
    pub id: String,
    // Partition/Region/Tags are only present when the source metadata had
    // them; Security Hub treats absent and null differently, so they must
    // be omitted entirely rather than serialized as null.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<ResourceTags>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResourceTags {
    #[serde(rename = "Source")]
    pub source: String,
}
