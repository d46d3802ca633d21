use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default name of the collection holding bookmark documents.
pub const BOOKMARKS_COLLECTION: &str = "bookmarks";

/// A bookmark document as stored by the product.
#[derive(Debug, Clone, PartialEq)]
pub struct Bookmark {
    pub id: String,
    pub user_id: String,
    pub url: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    /// Display position as stored. Usually an integer, but any non-null value
    /// written by a client counts as defined and is kept as is.
    pub order: Option<Value>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Store revision, replaced on every write.
    pub revision: i64,
    /// Attributes written by other parts of the product, carried through untouched.
    pub extra: Map<String, Value>,
}

/// The JSON body of a bookmark document (everything except the id and revision).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkData {
    pub user_id: String,
    pub url: String,
    pub title: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "timestamp::option")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Bookmark {
    /// The `order` as an integer position, when it is one.
    pub fn position(&self) -> Option<i64> {
        self.order.as_ref().and_then(Value::as_i64)
    }

    pub fn from_data(id: String, revision: i64, data: BookmarkData) -> Self {
        Self {
            id,
            user_id: data.user_id,
            url: data.url,
            title: data.title,
            created_at: data.created_at,
            order: data.order,
            updated_at: data.updated_at,
            revision,
            extra: data.extra,
        }
    }
}

/// RFC 3339 timestamps, written as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
///
/// Parsing accepts any precision and UTC offset. Stores compare parsed
/// instants, never the raw text.
pub mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn now() -> String {
        format(&Utc::now())
    }

    pub fn parse(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc))
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => serializer.serialize_str(&super::format(dt)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            let raw: Option<String> = Option::deserialize(deserializer)?;
            raw.map(|s| super::parse(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
