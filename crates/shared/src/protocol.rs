//! Wire types of the record store REST API.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{Guest, GuestId},
    error::StoreError,
};

/// Sort order for list requests, rendered as `field` or `-field`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    /// Newest `created` first; the default order of the guest directory.
    pub fn newest_first() -> Self {
        Self::descending("created")
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.descending {
            write!(f, "-{}", self.field)
        } else {
            f.write_str(&self.field)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: u32,
    pub per_page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
    pub items: Vec<T>,
}

/// One page of raw records plus the collection's total count.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordList<T> {
    pub items: Vec<T>,
    pub total_items: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreErrorBody {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminAuthRequest {
    pub identity: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminAuthResponse {
    pub token: String,
}

/// A guest record as the store serializes it. Optional fields come back as
/// empty strings and timestamps use `YYYY-MM-DD HH:MM:SS.sssZ`.
#[derive(Debug, Clone, Deserialize)]
pub struct GuestRecord {
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    pub created: String,
    #[serde(default)]
    pub updated: Option<String>,
}

impl TryFrom<GuestRecord> for Guest {
    type Error = StoreError;

    fn try_from(record: GuestRecord) -> Result<Self, Self::Error> {
        let created = parse_store_timestamp(&record.created).ok_or_else(|| {
            StoreError::Decode(format!(
                "record {} has invalid created timestamp '{}'",
                record.id, record.created
            ))
        })?;
        let updated = non_blank(record.updated).and_then(|raw| parse_store_timestamp(&raw));
        let date_of_birth = match non_blank(record.date_of_birth) {
            Some(raw) => Some(parse_store_date(&raw).ok_or_else(|| {
                StoreError::Decode(format!(
                    "record {} has invalid date_of_birth '{raw}'",
                    record.id
                ))
            })?),
            None => None,
        };

        Ok(Guest {
            id: GuestId(record.id),
            first_name: record.first_name,
            last_name: record.last_name,
            email: record.email,
            phone: non_blank(record.phone),
            address: non_blank(record.address),
            date_of_birth,
            created,
            updated,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Accepts the store's `2024-01-05 10:20:30.123Z` format and RFC 3339.
pub fn parse_store_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    let naive = raw.strip_suffix('Z').unwrap_or(raw);
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|dt| dt.and_utc())
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time part.
pub fn parse_store_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> GuestRecord {
        serde_json::from_value(serde_json::json!({
            "id": "r1",
            "collectionId": "c1",
            "collectionName": "guests",
            "first_name": "Test",
            "last_name": "User",
            "email": "testuser@example.com",
            "phone": "",
            "address": "Test Address",
            "date_of_birth": "2000-01-01 00:00:00.000Z",
            "created": "2024-03-01 09:15:00.250Z",
            "updated": ""
        }))
        .expect("record json")
    }

    #[test]
    fn sort_key_renders_direction_prefix() {
        assert_eq!(SortKey::newest_first().to_string(), "-created");
        assert_eq!(SortKey::ascending("last_name").to_string(), "last_name");
    }

    #[test]
    fn guest_record_maps_blank_fields_to_none() {
        let guest = Guest::try_from(record()).expect("guest");
        assert_eq!(guest.id, GuestId::new("r1"));
        assert_eq!(guest.phone, None);
        assert_eq!(guest.address.as_deref(), Some("Test Address"));
        assert_eq!(guest.date_of_birth, NaiveDate::from_ymd_opt(2000, 1, 1));
        assert_eq!(guest.updated, None);
        assert_eq!(
            guest.created,
            "2024-03-01T09:15:00.250Z".parse::<DateTime<Utc>>().expect("ts")
        );
    }

    #[test]
    fn guest_record_with_bad_created_is_a_decode_error() {
        let mut raw = record();
        raw.created = "yesterday".into();
        let err = Guest::try_from(raw).expect_err("should fail");
        assert!(matches!(err, StoreError::Decode(_)));
    }

    #[test]
    fn list_query_uses_camel_case_keys() {
        let query = ListQuery {
            page: 2,
            per_page: 5,
            sort: Some("-created".into()),
        };
        let json = serde_json::to_value(&query).expect("json");
        assert_eq!(json["perPage"], 5);
        assert_eq!(json["sort"], "-created");
    }

    #[test]
    fn error_body_tolerates_missing_fields() {
        let body: StoreErrorBody =
            serde_json::from_str(r#"{"message":"The requested resource wasn't found."}"#)
                .expect("body");
        assert_eq!(body.code, 0);
        assert_eq!(body.message, "The requested resource wasn't found.");
    }
}
