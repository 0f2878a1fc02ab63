//! Row-to-JSON conversion for the sqlx-backed dialects.
//!
//! Columns are classified by their reported type name, then decoded with the
//! narrowest matching Rust type. DECIMAL/NUMERIC values keep their exact
//! database representation as strings.

use crate::models::DatabaseType;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::{Map, Value as JsonValue};
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row, Type, TypeInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Binary,
    Json,
    Text,
}

fn categorize(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC affinity is a float
        if db == DatabaseType::Sqlite {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }
    if lower.contains("int") || lower.contains("serial") {
        return TypeCategory::Integer;
    }
    if lower == "bool" || lower == "boolean" || lower == "tinyint(1)" {
        return TypeCategory::Boolean;
    }
    if lower.contains("float") || lower.contains("double") || lower.contains("real") {
        return TypeCategory::Float;
    }
    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }
    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }
    TypeCategory::Text
}

/// Raw DECIMAL/NUMERIC value kept as its textual database representation.
#[derive(Debug)]
struct RawDecimal(String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }
    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }
    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

fn binary_value(bytes: &[u8]) -> JsonValue {
    match std::str::from_utf8(bytes) {
        Ok(s) => JsonValue::String(s.to_string()),
        Err(_) => JsonValue::String(STANDARD.encode(bytes)),
    }
}

/// Convert a database row into a JSON object keyed by column name.
pub trait RowToJson {
    fn to_json_map(&self) -> Map<String, JsonValue>;

    fn column_names(&self) -> Vec<String>;
}

macro_rules! try_col {
    ($row:expr, $idx:expr, $ty:ty, $conv:expr) => {
        if let Ok(Some(v)) = $row.try_get::<Option<$ty>, _>($idx) {
            return ($conv)(v);
        }
    };
}

impl RowToJson for MySqlRow {
    fn to_json_map(&self) -> Map<String, JsonValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize(col.type_info().name(), DatabaseType::MySql);
                (col.name().to_string(), decode_mysql(self, idx, category))
            })
            .collect()
    }

    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }
}

fn decode_mysql(row: &MySqlRow, idx: usize, category: TypeCategory) -> JsonValue {
    match category {
        TypeCategory::Decimal => {
            try_col!(row, idx, RawDecimal, |v: RawDecimal| JsonValue::String(v.0));
        }
        TypeCategory::Integer => {
            try_col!(row, idx, i64, |v: i64| JsonValue::Number(v.into()));
            try_col!(row, idx, u64, |v: u64| JsonValue::Number(v.into()));
        }
        TypeCategory::Boolean => {
            try_col!(row, idx, bool, JsonValue::Bool);
            try_col!(row, idx, i64, |v: i64| JsonValue::Bool(v != 0));
        }
        TypeCategory::Float => {
            try_col!(row, idx, f64, float_value);
            try_col!(row, idx, f32, |v: f32| float_value(v as f64));
        }
        TypeCategory::Json => {
            try_col!(row, idx, JsonValue, |v| v);
        }
        TypeCategory::Binary => {
            try_col!(row, idx, Vec<u8>, |v: Vec<u8>| binary_value(&v));
        }
        TypeCategory::Text => {}
    }
    try_col!(row, idx, String, JsonValue::String);
    try_col!(row, idx, Vec<u8>, |v: Vec<u8>| binary_value(&v));
    JsonValue::Null
}

impl RowToJson for PgRow {
    fn to_json_map(&self) -> Map<String, JsonValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize(col.type_info().name(), DatabaseType::Postgres);
                (col.name().to_string(), decode_postgres(self, idx, category))
            })
            .collect()
    }

    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }
}

fn decode_postgres(row: &PgRow, idx: usize, category: TypeCategory) -> JsonValue {
    match category {
        TypeCategory::Decimal => {
            try_col!(row, idx, RawDecimal, |v: RawDecimal| JsonValue::String(v.0));
        }
        TypeCategory::Integer => {
            try_col!(row, idx, i64, |v: i64| JsonValue::Number(v.into()));
            try_col!(row, idx, i32, |v: i32| JsonValue::Number(v.into()));
            try_col!(row, idx, i16, |v: i16| JsonValue::Number(v.into()));
        }
        TypeCategory::Boolean => {
            try_col!(row, idx, bool, JsonValue::Bool);
        }
        TypeCategory::Float => {
            try_col!(row, idx, f64, float_value);
            try_col!(row, idx, f32, |v: f32| float_value(v as f64));
        }
        TypeCategory::Json => {
            try_col!(row, idx, JsonValue, |v| v);
        }
        TypeCategory::Binary => {
            try_col!(row, idx, Vec<u8>, |v: Vec<u8>| binary_value(&v));
        }
        TypeCategory::Text => {}
    }
    try_col!(row, idx, String, JsonValue::String);
    JsonValue::Null
}

impl RowToJson for SqliteRow {
    fn to_json_map(&self) -> Map<String, JsonValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize(col.type_info().name(), DatabaseType::Sqlite);
                (col.name().to_string(), decode_sqlite(self, idx, category))
            })
            .collect()
    }

    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }
}

fn decode_sqlite(row: &SqliteRow, idx: usize, category: TypeCategory) -> JsonValue {
    match category {
        TypeCategory::Integer => {
            try_col!(row, idx, i64, |v: i64| JsonValue::Number(v.into()));
        }
        TypeCategory::Boolean => {
            try_col!(row, idx, bool, JsonValue::Bool);
        }
        TypeCategory::Float | TypeCategory::Decimal => {
            try_col!(row, idx, f64, float_value);
        }
        TypeCategory::Binary => {
            try_col!(row, idx, Vec<u8>, |v: Vec<u8>| binary_value(&v));
        }
        TypeCategory::Json | TypeCategory::Text => {}
    }
    // SQLite columns are dynamically typed; probe widest-first.
    try_col!(row, idx, String, JsonValue::String);
    try_col!(row, idx, i64, |v: i64| JsonValue::Number(v.into()));
    try_col!(row, idx, f64, float_value);
    try_col!(row, idx, Vec<u8>, |v: Vec<u8>| binary_value(&v));
    JsonValue::Null
}
