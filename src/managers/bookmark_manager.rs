//! Bookmark Manager for the local document store.
//!
//! Implements `BookmarkManagerTrait`: user-scoped CRUD on bookmark documents
//! kept as JSON rows in the `documents` table, backed by `rusqlite`. Every
//! write claims a fresh `revision` from the database counter, which is the
//! version token the store hands out for write preconditions.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::database::next_revision;
use crate::store::sqlite::json_path;
use crate::types::bookmark::{Bookmark, BookmarkData, BOOKMARKS_COLLECTION};
use crate::types::errors::BookmarkError;

/// Fields of a new bookmark.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBookmark {
    pub user_id: String,
    pub url: String,
    pub title: String,
    /// Defaults to now.
    pub created_at: Option<DateTime<Utc>>,
    pub order: Option<i64>,
    pub extra: Map<String, Value>,
}

impl NewBookmark {
    pub fn new(user_id: &str, url: &str, title: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            url: url.to_string(),
            title: title.to_string(),
            created_at: None,
            order: None,
            extra: Map::new(),
        }
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    pub fn order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }
}

/// Trait defining bookmark management operations.
pub trait BookmarkManagerTrait {
    fn add_bookmark(&mut self, bookmark: NewBookmark) -> Result<String, BookmarkError>;
    fn get_bookmark(&self, id: &str) -> Result<Bookmark, BookmarkError>;
    fn remove_bookmark(&mut self, id: &str) -> Result<(), BookmarkError>;
    fn update_bookmark(&mut self, id: &str, url: Option<&str>, title: Option<&str>) -> Result<(), BookmarkError>;
    fn set_order(&mut self, id: &str, order: Option<i64>) -> Result<(), BookmarkError>;
    /// Lists a user's bookmarks ascending by creation time.
    fn list_bookmarks(&self, user_id: &str) -> Result<Vec<Bookmark>, BookmarkError>;
    fn count_missing_order(&self, user_id: &str) -> Result<usize, BookmarkError>;
}

/// Bookmark manager backed by a SQLite connection.
pub struct BookmarkManager<'a> {
    conn: &'a Connection,
    collection: String,
}

impl<'a> BookmarkManager<'a> {
    /// Creates a manager over the default `bookmarks` collection.
    pub fn new(conn: &'a Connection) -> Self {
        Self::with_collection(conn, BOOKMARKS_COLLECTION)
    }

    pub fn with_collection(conn: &'a Connection, collection: &str) -> Self {
        Self {
            conn,
            collection: collection.to_string(),
        }
    }

    fn validate_url(url: &str) -> Result<(), BookmarkError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            Ok(())
        } else {
            Err(BookmarkError::InvalidUrl(url.to_string()))
        }
    }

    fn load(&self, id: &str) -> Result<(BookmarkData, i64), BookmarkError> {
        let row: Option<(String, i64)> = self
            .conn
            .query_row(
                "SELECT data, revision FROM documents WHERE collection = ?1 AND id = ?2",
                params![self.collection, id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| BookmarkError::DatabaseError(e.to_string()))?;

        let (data, revision) = row.ok_or_else(|| BookmarkError::NotFound(id.to_string()))?;
        let data: BookmarkData = serde_json::from_str(&data)
            .map_err(|e| BookmarkError::SerializationError(format!("{}: {}", id, e)))?;
        Ok((data, revision))
    }

    /// Writes the document body under a new revision.
    fn store(&self, id: &str, data: &BookmarkData) -> Result<(), BookmarkError> {
        let body = serde_json::to_string(data)
            .map_err(|e| BookmarkError::SerializationError(e.to_string()))?;
        let revision = next_revision(self.conn).map_err(|e| BookmarkError::DatabaseError(e.to_string()))?;
        let affected = self
            .conn
            .execute(
                "UPDATE documents SET data = ?1, revision = ?2 WHERE collection = ?3 AND id = ?4",
                params![body, revision, self.collection, id],
            )
            .map_err(|e| BookmarkError::DatabaseError(e.to_string()))?;

        if affected == 0 {
            return Err(BookmarkError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

impl<'a> BookmarkManagerTrait for BookmarkManager<'a> {
    /// Adds a new bookmark. Returns the generated bookmark ID.
    fn add_bookmark(&mut self, bookmark: NewBookmark) -> Result<String, BookmarkError> {
        if bookmark.user_id.is_empty() {
            return Err(BookmarkError::MissingOwner);
        }
        Self::validate_url(&bookmark.url)?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let data = BookmarkData {
            user_id: bookmark.user_id,
            url: bookmark.url,
            title: bookmark.title,
            created_at: bookmark.created_at.unwrap_or(now),
            order: bookmark.order.map(Value::from),
            updated_at: Some(now),
            extra: bookmark.extra,
        };
        let body = serde_json::to_string(&data)
            .map_err(|e| BookmarkError::SerializationError(e.to_string()))?;

        let revision = next_revision(self.conn).map_err(|e| BookmarkError::DatabaseError(e.to_string()))?;
        self.conn
            .execute(
                "INSERT INTO documents (collection, id, data, revision) VALUES (?1, ?2, ?3, ?4)",
                params![self.collection, id, body, revision],
            )
            .map_err(|e| BookmarkError::DatabaseError(e.to_string()))?;

        Ok(id)
    }

    fn get_bookmark(&self, id: &str) -> Result<Bookmark, BookmarkError> {
        let (data, revision) = self.load(id)?;
        Ok(Bookmark::from_data(id.to_string(), revision, data))
    }

    /// Removes a bookmark by ID.
    fn remove_bookmark(&mut self, id: &str) -> Result<(), BookmarkError> {
        let affected = self
            .conn
            .execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![self.collection, id],
            )
            .map_err(|e| BookmarkError::DatabaseError(e.to_string()))?;

        if affected == 0 {
            return Err(BookmarkError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Updates the url and/or title of an existing bookmark.
    fn update_bookmark(
        &mut self,
        id: &str,
        url: Option<&str>,
        title: Option<&str>,
    ) -> Result<(), BookmarkError> {
        let (mut data, _) = self.load(id)?;
        if let Some(u) = url {
            Self::validate_url(u)?;
            data.url = u.to_string();
        }
        if let Some(t) = title {
            data.title = t.to_string();
        }
        data.updated_at = Some(Utc::now());
        self.store(id, &data)
    }

    /// Sets or clears the `order` of a bookmark, as a user re-sort would.
    fn set_order(&mut self, id: &str, order: Option<i64>) -> Result<(), BookmarkError> {
        let (mut data, _) = self.load(id)?;
        data.order = order.map(Value::from);
        data.updated_at = Some(Utc::now());
        self.store(id, &data)
    }

    fn list_bookmarks(&self, user_id: &str) -> Result<Vec<Bookmark>, BookmarkError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, data, revision FROM documents \
                 WHERE collection = ?1 AND json_extract(data, ?2) = ?3 \
                 ORDER BY rowid",
            )
            .map_err(|e| BookmarkError::DatabaseError(e.to_string()))?;

        let rows = stmt
            .query_map(
                params![self.collection, json_path("userId"), user_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .map_err(|e| BookmarkError::DatabaseError(e.to_string()))?;

        let mut results = Vec::new();
        for row in rows {
            let (id, data, revision) = row.map_err(|e| BookmarkError::DatabaseError(e.to_string()))?;
            let data: BookmarkData = serde_json::from_str(&data)
                .map_err(|e| BookmarkError::SerializationError(format!("{}: {}", id, e)))?;
            results.push(Bookmark::from_data(id, revision, data));
        }
        // Stable sort on the parsed instant; ties keep insertion order.
        results.sort_by_key(|b| b.created_at);
        Ok(results)
    }

    fn count_missing_order(&self, user_id: &str) -> Result<usize, BookmarkError> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM documents \
                 WHERE collection = ?1 AND json_extract(data, ?2) = ?3 \
                   AND json_extract(data, ?4) IS NULL",
                params![self.collection, json_path("userId"), user_id, json_path("order")],
                |row| row.get(0),
            )
            .map_err(|e| BookmarkError::DatabaseError(e.to_string()))?;
        Ok(count as usize)
    }
}
