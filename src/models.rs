use chrono::{DateTime, NaiveDate, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

/// Query-string ids where an empty value (`uploaded_by=`) means absent.
pub fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("'{raw}' is not an integer"))),
        _ => Ok(None),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub fullname: String,
    pub email: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub fullname: String,
    pub email: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub category_id: i64,
    pub doc_type_id: i64,
    pub subtype_id: i64,
    pub doc_date: String,
    pub party_main_account: String,
    pub party_sub_account: String,
    pub file_path: String,
    pub file_name: String,
    pub uploaded_by: i64,
    pub uploaded_date: DateTime<Utc>,
    pub modified_by: Option<i64>,
    pub modified_date: Option<DateTime<Utc>>,
    pub remarks: Option<String>,
}

/// Upload metadata. Ids are optional so that absent and zero can both be
/// reported as missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewDocument {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub category_id: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub doc_type_id: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub subtype_id: Option<i64>,
    pub doc_date: Option<String>,
    pub party_main_account: Option<String>,
    pub party_sub_account: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub uploaded_by: Option<i64>,
    pub remarks: Option<String>,
}

/// Replacement metadata for an update. `modified_by` is the caller and is
/// checked against the owner column.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentChanges {
    pub category_id: i64,
    pub doc_type_id: i64,
    pub subtype_id: i64,
    pub doc_date: String,
    pub party_main_account: String,
    pub party_sub_account: String,
    pub modified_by: i64,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentFilter {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub category_id: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub doc_type_id: Option<i64>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

/// Fully validated document row, ready to insert.
#[derive(Debug)]
pub struct NewDocumentRow<'a> {
    pub category_id: i64,
    pub doc_type_id: i64,
    pub subtype_id: i64,
    pub doc_date: &'a str,
    pub party_main_account: &'a str,
    pub party_sub_account: &'a str,
    pub file_path: &'a str,
    pub file_name: &'a str,
    pub uploaded_by: i64,
    pub uploaded_date: DateTime<Utc>,
    pub remarks: Option<&'a str>,
}
