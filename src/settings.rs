//! Site settings management
//!
//! Provides database-backed settings with in-memory caching. Settings are
//! addressed by `(section, key)` and hold arbitrary JSON values. They are
//! loaded from the database on startup and written through on update.

use crate::orm::settings;
use chrono::Utc;
use dashmap::DashMap;
use sea_orm::{entity::*, query::*, sea_query::Expr, DatabaseConnection, DbErr, Set};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Sections an administrator may write to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    General,
    Users,
    Advanced,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::General => "general",
            Section::Users => "users",
            Section::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(Section::General),
            "users" => Ok(Section::Users),
            "advanced" => Ok(Section::Advanced),
            _ => Err(()),
        }
    }
}

/// Settings store with caching
pub struct Settings {
    values: DashMap<(String, String), Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

impl Settings {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            values: DashMap::new(),
        }
    }

    /// Replace the cache with the contents of the settings table
    pub async fn load_from_database(&self, db: &DatabaseConnection) -> Result<(), DbErr> {
        let rows = settings::Entity::find().all(db).await?;

        self.values.clear();
        for row in rows {
            // Rows written by hand may hold a bare string instead of JSON.
            let value = serde_json::from_str(&row.value).unwrap_or(Value::String(row.value));
            self.values.insert((row.section, row.key), value);
        }

        log::info!("Loaded {} settings from database", self.values.len());
        Ok(())
    }

    /// Get a cached value
    pub fn get(&self, section: Section, key: &str) -> Option<Value> {
        self.values
            .get(&(section.as_str().to_owned(), key.to_owned()))
            .map(|v| v.clone())
    }

    /// Interpret a value as a boolean. Accepts JSON booleans and the strings
    /// "true"/"false".
    pub fn get_bool(&self, section: Section, key: &str) -> Option<bool> {
        match self.get(section, key)? {
            Value::Bool(b) => Some(b),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Get a boolean setting with a default value
    pub fn get_bool_or(&self, section: Section, key: &str, default: bool) -> bool {
        self.get_bool(section, key).unwrap_or(default)
    }

    /// All cached settings as `{section: {key: value}}`
    pub fn grouped(&self) -> BTreeMap<String, Map<String, Value>> {
        let mut out: BTreeMap<String, Map<String, Value>> = BTreeMap::new();
        for entry in self.values.iter() {
            let (section, key) = entry.key();
            out.entry(section.clone())
                .or_default()
                .insert(key.clone(), entry.value().clone());
        }
        out
    }

    /// Upsert every key of `values` under `section`, then refresh the cache
    pub async fn update_section(
        &self,
        db: &DatabaseConnection,
        section: Section,
        values: &Map<String, Value>,
    ) -> Result<(), DbErr> {
        let now = Utc::now().naive_utc();

        for (key, value) in values {
            let encoded = value.to_string();
            let existing = settings::Entity::find_by_id((section.as_str().to_owned(), key.clone()))
                .one(db)
                .await?;

            if existing.is_some() {
                settings::Entity::update_many()
                    .col_expr(settings::Column::Value, Expr::value(encoded))
                    .col_expr(settings::Column::UpdatedAt, Expr::value(now))
                    .filter(settings::Column::Section.eq(section.as_str()))
                    .filter(settings::Column::Key.eq(key.as_str()))
                    .exec(db)
                    .await?;
            } else {
                settings::Entity::insert(settings::ActiveModel {
                    section: Set(section.as_str().to_owned()),
                    key: Set(key.clone()),
                    value: Set(encoded),
                    updated_at: Set(now),
                })
                .exec(db)
                .await?;
            }

            self.values
                .insert((section.as_str().to_owned(), key.clone()), value.clone());
        }

        log::info!("Updated {} settings in section {}", values.len(), section);
        Ok(())
    }

    // Convenience methods for common settings

    /// New comments wait for moderation unless `general.requireModeration`
    /// is explicitly false.
    pub fn require_moderation(&self) -> bool {
        self.get_bool_or(Section::General, "requireModeration", true)
    }

    /// Whether new sign-ins may create accounts
    pub fn registration_enabled(&self) -> bool {
        self.get_bool_or(Section::Users, "allowRegistration", true)
    }

    #[cfg(test)]
    pub(crate) fn set_cached(&self, section: Section, key: &str, value: Value) {
        self.values
            .insert((section.as_str().to_owned(), key.to_owned()), value);
    }
}

/// Create a new Arc-wrapped settings store
pub fn create_settings() -> Arc<Settings> {
    Arc::new(Settings::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_moderation_required_by_default() {
        let settings = Settings::new();
        assert!(settings.require_moderation());
    }

    #[test]
    fn test_moderation_disabled_by_bool_or_string() {
        let settings = Settings::new();
        settings.set_cached(Section::General, "requireModeration", json!(false));
        assert!(!settings.require_moderation());

        settings.set_cached(Section::General, "requireModeration", json!("false"));
        assert!(!settings.require_moderation());

        settings.set_cached(Section::General, "requireModeration", json!("nonsense"));
        assert!(settings.require_moderation());
    }

    #[test]
    fn test_grouped_by_section() {
        let settings = Settings::new();
        settings.set_cached(Section::General, "siteName", json!("Planet"));
        settings.set_cached(Section::General, "requireModeration", json!(true));
        settings.set_cached(Section::Advanced, "cacheTtl", json!(30));

        let grouped = settings.grouped();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["general"]["siteName"], json!("Planet"));
        assert_eq!(grouped["advanced"]["cacheTtl"], json!(30));
    }

    #[test]
    fn test_section_parsing() {
        assert_eq!("users".parse::<Section>(), Ok(Section::Users));
        assert!("security".parse::<Section>().is_err());
    }
}
