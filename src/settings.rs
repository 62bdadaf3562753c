//! Typed preferences backed by the `preferences` table.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;

use crate::db;
use crate::error::{LibraryError, Result};
use crate::sort::{SortField, SortKey};

pub const TITLE_FONT_SIZE: &str = "title_font_size";
pub const BODY_FONT_SIZE: &str = "body_font_size";
pub const SORT_KEYS: [&str; 3] = ["sort_key_1", "sort_key_2", "sort_key_3"];
pub const SORT_DESC: [&str; 3] = ["sort_desc_1", "sort_desc_2", "sort_desc_3"];
pub const MAX_CONTENT_LENGTH: &str = "max_content_length";

pub const DEFAULT_TITLE_FONT_SIZE: i64 = 18;
pub const DEFAULT_BODY_FONT_SIZE: i64 = 14;
pub const DEFAULT_MAX_CONTENT_LENGTH: i64 = 16 * 1024 * 1024;

pub struct Preferences {
    conn: Connection,
}

impl Preferences {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            conn: db::open_db(path)?,
        })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            conn: db::open_in_memory()?,
        })
    }

    fn set_value(&self, key: &str, value: &str, value_type: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.conn.execute(
            "INSERT INTO preferences (key, value, value_type, updated_at) VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, value_type = excluded.value_type, updated_at = excluded.updated_at",
            params![key, value, value_type, now],
        )?;
        log::debug!("preference {} = {} ({})", key, value, value_type);
        Ok(())
    }

    fn get_value(&self, key: &str, expected_type: &str) -> Result<Option<String>> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT value, value_type FROM preferences WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((value, value_type)) = row else {
            return Ok(None);
        };
        if value_type != expected_type {
            return Err(LibraryError::TypeMismatch {
                key: key.to_string(),
                expected: expected_type.to_string(),
                actual: value_type,
            });
        }
        Ok(Some(value))
    }

    pub fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.set_value(key, value, "string")
    }

    pub fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.get_value(key, "string")
    }

    pub fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set_value(key, &value.to_string(), "bool")
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get_value(key, "bool")? {
            Some(value) => Ok(Some(value == "true")),
            None => Ok(None),
        }
    }

    pub fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        self.set_value(key, &value.to_string(), "i64")
    }

    pub fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        match self.get_value(key, "i64")? {
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| LibraryError::InvalidNumber {
                    element: key.to_string(),
                    value,
                }),
            None => Ok(None),
        }
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM preferences WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    /// Stored `(key, value, type)` triples ordered by key.
    pub fn entries(&self) -> Result<Vec<(String, String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value, value_type FROM preferences ORDER BY key")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}

/// Application settings with their defaults filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppSettings {
    pub title_font_size: i64,
    pub body_font_size: i64,
    pub sort_fields: [String; 3],
    pub sort_descending: [bool; 3],
    pub max_content_length: i64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            title_font_size: DEFAULT_TITLE_FONT_SIZE,
            body_font_size: DEFAULT_BODY_FONT_SIZE,
            sort_fields: [
                SortField::Author.name().to_string(),
                SortField::Title.name().to_string(),
                SortField::None.name().to_string(),
            ],
            sort_descending: [false; 3],
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
        }
    }
}

impl AppSettings {
    pub fn load(prefs: &Preferences) -> Result<Self> {
        let defaults = Self::default();
        let mut settings = Self {
            title_font_size: prefs
                .get_i64(TITLE_FONT_SIZE)?
                .unwrap_or(defaults.title_font_size),
            body_font_size: prefs
                .get_i64(BODY_FONT_SIZE)?
                .unwrap_or(defaults.body_font_size),
            max_content_length: prefs
                .get_i64(MAX_CONTENT_LENGTH)?
                .unwrap_or(defaults.max_content_length),
            ..defaults
        };
        for slot in 0..3 {
            if let Some(field) = prefs.get_string(SORT_KEYS[slot])? {
                settings.sort_fields[slot] = field;
            }
            if let Some(descending) = prefs.get_bool(SORT_DESC[slot])? {
                settings.sort_descending[slot] = descending;
            }
        }
        Ok(settings)
    }

    pub fn save(&self, prefs: &Preferences) -> Result<()> {
        prefs.set_i64(TITLE_FONT_SIZE, self.title_font_size)?;
        prefs.set_i64(BODY_FONT_SIZE, self.body_font_size)?;
        prefs.set_i64(MAX_CONTENT_LENGTH, self.max_content_length)?;
        for slot in 0..3 {
            prefs.set_string(SORT_KEYS[slot], &self.sort_fields[slot])?;
            prefs.set_bool(SORT_DESC[slot], self.sort_descending[slot])?;
        }
        Ok(())
    }

    pub fn sort_keys(&self) -> [SortKey; 3] {
        std::array::from_fn(|slot| {
            SortKey::new(
                SortField::resolve(&self.sort_fields[slot]),
                self.sort_descending[slot],
            )
        })
    }

    pub fn max_content_length(&self) -> u64 {
        u64::try_from(self.max_content_length).unwrap_or(0)
    }

    /// Store `value` under `key`, parsed to the type that key holds.
    pub fn set_by_name(prefs: &Preferences, key: &str, value: &str) -> Result<()> {
        let invalid = || LibraryError::InvalidNumber {
            element: key.to_string(),
            value: value.to_string(),
        };
        match key {
            TITLE_FONT_SIZE | BODY_FONT_SIZE | MAX_CONTENT_LENGTH => {
                prefs.set_i64(key, value.trim().parse().map_err(|_| invalid())?)
            }
            _ if SORT_DESC.contains(&key) => match value.trim() {
                "true" | "desc" => prefs.set_bool(key, true),
                "false" | "asc" => prefs.set_bool(key, false),
                _ => Err(LibraryError::TypeMismatch {
                    key: key.to_string(),
                    expected: "bool".to_string(),
                    actual: value.to_string(),
                }),
            },
            _ if SORT_KEYS.contains(&key) => {
                let field = SortField::resolve(value);
                prefs.set_string(key, field.name())
            }
            _ => prefs.set_string(key, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AppSettings, Preferences, DEFAULT_MAX_CONTENT_LENGTH, SORT_KEYS};
    use crate::error::LibraryError;
    use crate::sort::{SortField, SortKey};

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let prefs = Preferences::in_memory().expect("prefs");
        let settings = AppSettings::load(&prefs).expect("load");
        assert_eq!(settings, AppSettings::default());
        assert_eq!(settings.max_content_length, DEFAULT_MAX_CONTENT_LENGTH);
        assert_eq!(
            settings.sort_keys(),
            [
                SortKey::ascending(SortField::Author),
                SortKey::ascending(SortField::Title),
                SortKey::ascending(SortField::None),
            ]
        );
    }

    #[test]
    fn saved_settings_load_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prefs/preferences.db");
        let mut settings = AppSettings::default();
        settings.title_font_size = 24;
        settings.sort_fields[2] = "PublishYear".to_string();
        settings.sort_descending[2] = true;
        {
            let prefs = Preferences::open(&path).expect("open");
            settings.save(&prefs).expect("save");
        }
        let prefs = Preferences::open(&path).expect("reopen");
        let loaded = AppSettings::load(&prefs).expect("load");
        assert_eq!(loaded, settings);
        assert_eq!(loaded.sort_keys()[2], SortKey::descending(SortField::PublishYear));
    }

    #[test]
    fn reading_under_wrong_type_fails() {
        let prefs = Preferences::in_memory().expect("prefs");
        prefs.set_string("title_font_size", "huge").expect("set");
        assert!(matches!(
            prefs.get_i64("title_font_size"),
            Err(LibraryError::TypeMismatch { .. })
        ));
        assert!(AppSettings::load(&prefs).is_err());
    }

    #[test]
    fn set_by_name_parses_per_key() {
        let prefs = Preferences::in_memory().expect("prefs");
        AppSettings::set_by_name(&prefs, "body_font_size", "16").expect("int");
        AppSettings::set_by_name(&prefs, "sort_desc_1", "desc").expect("bool");
        AppSettings::set_by_name(&prefs, SORT_KEYS[0], "pages").expect("field");
        assert!(AppSettings::set_by_name(&prefs, "body_font_size", "big").is_err());

        let settings = AppSettings::load(&prefs).expect("load");
        assert_eq!(settings.body_font_size, 16);
        assert_eq!(settings.sort_keys()[0], SortKey::descending(SortField::TotalPages));
        assert_eq!(prefs.entries().expect("entries").len(), 3);
        assert!(prefs.remove("body_font_size").expect("remove"));
        assert!(!prefs.remove("body_font_size").expect("remove"));
    }
}
