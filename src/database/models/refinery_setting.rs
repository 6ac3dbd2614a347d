use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::Serialize;
use serde_json::Value;

use crate::database::{ModelError, ModelResult};
use crate::schema::refinery_settings;

/// CMS-wide key/value setting. Values are kept as JSON text.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = refinery_settings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RefinerySetting {
    pub id: i32,
    pub name: String,
    pub value: Option<String>,
    pub scoping: Option<String>,
    pub restricted: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = refinery_settings)]
struct SettingInsert<'a> {
    pub name: &'a str,
    pub value: Option<String>,
    pub scoping: Option<&'a str>,
    pub restricted: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SettingOptions<'a> {
    pub scoping: Option<&'a str>,
    pub restricted: bool,
}

impl<'a> SettingOptions<'a> {
    pub fn scoped(scoping: &'a str) -> Self {
        SettingOptions {
            scoping: Some(scoping),
            restricted: false,
        }
    }
}

impl RefinerySetting {
    /// Decoded value; a missing value reads as `null`.
    pub fn value(&self) -> ModelResult<Value> {
        match &self.value {
            None => Ok(Value::Null),
            Some(raw) => serde_json::from_str(raw).map_err(|source| ModelError::MalformedSetting {
                name: self.name.clone(),
                source,
            }),
        }
    }

    pub fn find(
        conn: &mut SqliteConnection,
        setting_name: &str,
        scope: Option<&str>,
    ) -> QueryResult<Option<RefinerySetting>> {
        let query = refinery_settings::table
            .filter(refinery_settings::name.eq(setting_name))
            .select(RefinerySetting::as_select())
            .into_boxed();
        let query = match scope {
            Some(scope) => query.filter(refinery_settings::scoping.eq(scope)),
            None => query.filter(refinery_settings::scoping.is_null()),
        };

        query.order(refinery_settings::id.asc()).first(conn).optional()
    }

    pub fn get(
        conn: &mut SqliteConnection,
        setting_name: &str,
        scope: Option<&str>,
    ) -> ModelResult<Option<Value>> {
        RefinerySetting::find(conn, setting_name, scope)?
            .map(|setting| setting.value())
            .transpose()
    }

    /// Stores `value` under `setting_name`, replacing any value already held
    /// for the same scoping.
    pub fn set(
        conn: &mut SqliteConnection,
        setting_name: &str,
        value: Value,
        options: SettingOptions<'_>,
    ) -> ModelResult<RefinerySetting> {
        let raw = serde_json::to_string(&value).map_err(|source| ModelError::MalformedSetting {
            name: setting_name.to_string(),
            source,
        })?;

        conn.transaction(|conn| {
            let now = super::now();
            let setting = match RefinerySetting::find(conn, setting_name, options.scoping)? {
                Some(existing) => diesel::update(refinery_settings::table.find(existing.id))
                    .set((
                        refinery_settings::value.eq(Some(raw)),
                        refinery_settings::restricted.eq(options.restricted),
                        refinery_settings::updated_at.eq(now),
                    ))
                    .returning(RefinerySetting::as_returning())
                    .get_result(conn)?,
                None => diesel::insert_into(refinery_settings::table)
                    .values(SettingInsert {
                        name: setting_name,
                        value: Some(raw),
                        scoping: options.scoping,
                        restricted: options.restricted,
                        created_at: now,
                        updated_at: now,
                    })
                    .returning(RefinerySetting::as_returning())
                    .get_result(conn)?,
            };

            log::debug!(
                "setting {}/{} = {:?}",
                options.scoping.unwrap_or("-"),
                setting_name,
                setting.value
            );
            Ok(setting)
        })
    }

    /// Reads the setting, storing and returning `default` when it is missing.
    pub fn find_or_set(
        conn: &mut SqliteConnection,
        setting_name: &str,
        default: Value,
        options: SettingOptions<'_>,
    ) -> ModelResult<Value> {
        match RefinerySetting::find(conn, setting_name, options.scoping)? {
            Some(setting) => setting.value(),
            None => RefinerySetting::set(conn, setting_name, default, options)?.value(),
        }
    }

    pub fn find_or_set_bool(
        conn: &mut SqliteConnection,
        setting_name: &str,
        default: bool,
        options: SettingOptions<'_>,
    ) -> ModelResult<bool> {
        let value = RefinerySetting::find_or_set(conn, setting_name, Value::Bool(default), options)?;
        Ok(truthy(&value))
    }
}

/// Boolean reading of a stored value. Form posts store `"true"`/`"1"`.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on"),
        Value::Null => false,
        Value::Array(_) | Value::Object(_) => true,
    }
}
