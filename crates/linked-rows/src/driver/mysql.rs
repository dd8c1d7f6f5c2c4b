//! MySQL/MariaDB driver on top of `mysql_async` (feature `mysql`).

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use mysql_async::consts::ColumnType;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Opts, OptsBuilder, Params, Row, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::core::{ColumnMetadata, Dialect, Fk, SqlNullType, SqlValue};
use crate::driver::{Connection, RawRow};
use crate::error::{ExportError, Result};

/// A single MySQL connection.
///
/// `mysql_async` queries take `&mut Conn`; the engine is single-threaded per
/// export, so a mutex only serializes the occasional concurrent metadata probe.
pub struct MysqlConnection {
    conn: Mutex<Conn>,
}

impl MysqlConnection {
    /// Connect using a `mysql://` connection string; `user` and `password`
    /// override whatever the URL carries.
    pub async fn connect(url: &str, user: &str, password: &str) -> Result<Self> {
        let opts = Opts::from_url(url)
            .map_err(|e| ExportError::metadata(url, format!("invalid connection url: {}", e)))?;
        let mut builder = OptsBuilder::from_opts(opts);
        if !user.is_empty() {
            builder = builder.user(Some(user));
        }
        if !password.is_empty() {
            builder = builder.pass(Some(password));
        }

        let conn = Conn::new(builder).await?;
        info!("Connected to MySQL");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    async fn fetch(&self, sql: &str, params: Params) -> Result<Vec<Row>> {
        let mut conn = self.conn.lock().await;
        Ok(conn.exec(sql, params).await?)
    }
}

#[async_trait]
impl Connection for MysqlConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let rows = self
            .fetch(
                "SELECT 1 FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_name = ? LIMIT 1",
                Params::Positional(vec![Value::from(table)]),
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn column_metadata(&self, table: &str) -> Result<Vec<ColumnMetadata>> {
        let rows = self
            .fetch(
                "SELECT column_name, data_type, character_maximum_length, \
                        column_default, ordinal_position \
                 FROM information_schema.columns \
                 WHERE table_schema = DATABASE() AND table_name = ? \
                 ORDER BY ordinal_position",
                Params::Positional(vec![Value::from(table)]),
            )
            .await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row
                .get(0)
                .ok_or_else(|| ExportError::metadata(table, "missing column_name"))?;
            let type_name: String = row
                .get(1)
                .ok_or_else(|| ExportError::metadata(table, "missing data_type"))?;
            let ordinal: u64 = row
                .get(4)
                .ok_or_else(|| ExportError::metadata(table, "missing ordinal_position"))?;

            let mut meta = ColumnMetadata::new(name, type_name, ordinal as i32);
            meta.size = row.get::<Option<u64>, _>(2).flatten().map(|v| v as i32);
            meta.default_expr = row.get::<Option<String>, _>(3).flatten();
            columns.push(meta);
        }

        debug!("Loaded {} columns for {}", columns.len(), table);
        Ok(columns)
    }

    async fn primary_keys(&self, table: &str) -> Result<Vec<String>> {
        let rows = self
            .fetch(
                "SELECT column_name FROM information_schema.key_column_usage \
                 WHERE table_schema = DATABASE() AND table_name = ? \
                   AND constraint_name = 'PRIMARY' \
                 ORDER BY ordinal_position",
                Params::Positional(vec![Value::from(table)]),
            )
            .await?;

        rows.into_iter()
            .map(|row| {
                row.get::<String, _>(0)
                    .ok_or_else(|| ExportError::metadata(table, "missing pk column_name"))
            })
            .collect()
    }

    async fn exported_keys(&self, table: &str) -> Result<Vec<Fk>> {
        self.foreign_keys(
            "SELECT referenced_table_name, referenced_column_name, \
                    table_name, column_name, constraint_name \
             FROM information_schema.key_column_usage \
             WHERE referenced_table_schema = DATABASE() AND referenced_table_name = ? \
             ORDER BY constraint_name, ordinal_position",
            table,
            false,
        )
        .await
    }

    async fn imported_keys(&self, table: &str) -> Result<Vec<Fk>> {
        self.foreign_keys(
            "SELECT referenced_table_name, referenced_column_name, \
                    table_name, column_name, constraint_name \
             FROM information_schema.key_column_usage \
             WHERE table_schema = DATABASE() AND table_name = ? \
               AND referenced_table_name IS NOT NULL \
             ORDER BY constraint_name, ordinal_position",
            table,
            true,
        )
        .await
    }

    async fn select_eq(&self, table: &str, column: &str, value: &SqlValue) -> Result<Vec<RawRow>> {
        let dialect = self.dialect();
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?",
            dialect.quote(table)?,
            dialect.quote(column)?
        );

        let rows = self
            .fetch(&sql, Params::Positional(vec![to_mysql_value(value)]))
            .await?;
        Ok(rows.iter().map(convert_row).collect())
    }
}

impl MysqlConnection {
    async fn foreign_keys(&self, sql: &str, table: &str, imported: bool) -> Result<Vec<Fk>> {
        let rows = self
            .fetch(sql, Params::Positional(vec![Value::from(table)]))
            .await?;

        rows.into_iter()
            .map(|row| {
                let get = |i: usize| -> Result<String> {
                    row.get::<String, _>(i)
                        .ok_or_else(|| ExportError::metadata(table, "malformed fk catalog row"))
                };
                Ok(Fk {
                    pk_table: get(0)?.to_lowercase(),
                    pk_column: get(1)?.to_lowercase(),
                    fk_table: get(2)?.to_lowercase(),
                    fk_column: get(3)?.to_lowercase(),
                    constraint_name: row.get::<String, _>(4),
                    inverted: imported,
                })
            })
            .collect()
    }
}

fn convert_row(row: &Row) -> RawRow {
    let columns = row.columns_ref();
    (0..columns.len())
        .map(|i| {
            let name = columns[i].name_str().to_string();
            let value = row.as_ref(i).cloned().unwrap_or(Value::NULL);
            (name, convert_value(value, columns[i].column_type()))
        })
        .collect()
}

fn convert_value(value: Value, column_type: ColumnType) -> SqlValue {
    match value {
        Value::NULL => SqlValue::Null(SqlNullType::String),
        Value::Int(v) => SqlValue::I64(v),
        Value::UInt(v) => SqlValue::I64(v as i64),
        Value::Float(v) => SqlValue::F32(v),
        Value::Double(v) => SqlValue::F64(v),
        Value::Date(y, mo, d, h, mi, s, us) => {
            let date = NaiveDate::from_ymd_opt(i32::from(y), u32::from(mo), u32::from(d));
            match date {
                Some(date) if column_type == ColumnType::MYSQL_TYPE_DATE => SqlValue::Date(date),
                Some(date) => date
                    .and_hms_micro_opt(u32::from(h), u32::from(mi), u32::from(s), us)
                    .map(SqlValue::DateTime)
                    .unwrap_or(SqlValue::Null(SqlNullType::DateTime)),
                None => SqlValue::Null(SqlNullType::DateTime),
            }
        }
        Value::Time(_neg, _days, h, m, s, us) => {
            NaiveTime::from_hms_micro_opt(u32::from(h), u32::from(m), u32::from(s), us)
                .map(SqlValue::Time)
                .unwrap_or(SqlValue::Null(SqlNullType::Time))
        }
        Value::Bytes(bytes) => match column_type {
            ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
                String::from_utf8(bytes.clone())
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .map(SqlValue::Decimal)
                    .unwrap_or(SqlValue::Bytes(bytes))
            }
            ColumnType::MYSQL_TYPE_TINY_BLOB
            | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
            | ColumnType::MYSQL_TYPE_LONG_BLOB
            | ColumnType::MYSQL_TYPE_BLOB => SqlValue::Bytes(bytes),
            _ => match String::from_utf8(bytes) {
                Ok(text) => SqlValue::Text(text),
                Err(e) => SqlValue::Bytes(e.into_bytes()),
            },
        },
    }
}

fn to_mysql_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null(_) => Value::NULL,
        SqlValue::Bool(b) => Value::Int(i64::from(*b)),
        SqlValue::I16(v) => Value::Int(i64::from(*v)),
        SqlValue::I32(v) => Value::Int(i64::from(*v)),
        SqlValue::I64(v) => Value::Int(*v),
        SqlValue::F32(v) => Value::Float(*v),
        SqlValue::F64(v) => Value::Double(*v),
        SqlValue::Text(s) => Value::Bytes(s.clone().into_bytes()),
        SqlValue::Bytes(b) => Value::Bytes(b.clone()),
        SqlValue::Uuid(u) => Value::Bytes(u.hyphenated().to_string().into_bytes()),
        SqlValue::Decimal(d) => Value::Bytes(d.to_string().into_bytes()),
        SqlValue::Date(d) => date_value(d.and_hms_opt(0, 0, 0).unwrap_or_default()),
        SqlValue::DateTime(dt) => date_value(*dt),
        SqlValue::DateTimeOffset(dt) => date_value(dt.naive_utc()),
        SqlValue::Time(t) => Value::Time(
            false,
            0,
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
            t.nanosecond() / 1_000,
        ),
    }
}

fn date_value(dt: NaiveDateTime) -> Value {
    use chrono::Datelike;
    Value::Date(
        dt.year() as u16,
        dt.month() as u8,
        dt.day() as u8,
        dt.hour() as u8,
        dt.minute() as u8,
        dt.second() as u8,
        dt.and_utc().timestamp_subsec_micros(),
    )
}
