//! PostgreSQL driver on top of `tokio-postgres`.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, NoTls};
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::{ColumnMetadata, Dialect, Fk, SqlNullType, SqlValue};
use crate::driver::{Connection, RawRow};
use crate::error::{ExportError, Result};

/// A single PostgreSQL connection.
pub struct PostgresConnection {
    client: Client,
}

impl PostgresConnection {
    /// Connect using a `postgres://` connection string; `user` and `password`
    /// override whatever the URL carries.
    pub async fn connect(url: &str, user: &str, password: &str) -> Result<Self> {
        let mut config: tokio_postgres::Config = url
            .parse()
            .map_err(|e| ExportError::metadata(url, format!("invalid connection url: {}", e)))?;
        if !user.is_empty() {
            config.user(user);
        }
        if !password.is_empty() {
            config.password(password);
        }

        let (client, connection) = config.connect(NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!("PostgreSQL connection closed: {}", e);
            }
        });

        client.simple_query("SELECT 1").await?;
        info!("Connected to PostgreSQL");

        Ok(Self { client })
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let rows = self
            .client
            .query(
                "SELECT 1 FROM information_schema.tables WHERE table_name = $1 LIMIT 1",
                &[&table],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn column_metadata(&self, table: &str) -> Result<Vec<ColumnMetadata>> {
        let query = r#"
            SELECT
                column_name,
                udt_name,
                COALESCE(character_maximum_length, numeric_precision, 0)::int4,
                column_default,
                ordinal_position::int4
            FROM information_schema.columns
            WHERE table_name = $1
            ORDER BY ordinal_position
        "#;

        let rows = self.client.query(query, &[&table]).await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let type_name: String = row.get(1);
            let size: i32 = row.get(2);
            let mut meta = ColumnMetadata::new(row.get::<_, String>(0), type_name, row.get(4));
            meta.size = (size > 0).then_some(size);
            meta.default_expr = row.get::<_, Option<String>>(3);
            columns.push(meta);
        }

        debug!("Loaded {} columns for {}", columns.len(), table);
        Ok(columns)
    }

    async fn primary_keys(&self, table: &str) -> Result<Vec<String>> {
        let query = r#"
            SELECT a.attname
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid
            WHERE t.relname = $1
              AND c.contype = 'p'
              AND a.attnum = ANY(c.conkey)
            ORDER BY array_position(c.conkey, a.attnum)
        "#;

        let rows = self.client.query(query, &[&table]).await?;
        Ok(rows.iter().map(|r| r.get::<_, String>(0)).collect())
    }

    async fn exported_keys(&self, table: &str) -> Result<Vec<Fk>> {
        self.foreign_keys(table, false).await
    }

    async fn imported_keys(&self, table: &str) -> Result<Vec<Fk>> {
        self.foreign_keys(table, true).await
    }

    async fn select_eq(&self, table: &str, column: &str, value: &SqlValue) -> Result<Vec<RawRow>> {
        let dialect = self.dialect();
        let sql = format!(
            "SELECT * FROM {} WHERE {} = $1",
            dialect.quote(table)?,
            dialect.quote(column)?
        );

        let stmt = self.client.prepare(&sql).await?;
        let param_type = stmt.params().first().cloned().unwrap_or(Type::TEXT);
        let param = bind_param(&param_type, value)?;
        let param_ref: &(dyn ToSql + Sync) = param.as_ref();

        let rows = self.client.query(&stmt, &[param_ref]).await?;
        Ok(rows.iter().map(convert_row).collect())
    }
}

impl PostgresConnection {
    async fn foreign_keys(&self, table: &str, imported: bool) -> Result<Vec<Fk>> {
        // Both directions of the same physical constraint come from
        // pg_constraint; only the side filtered on differs.
        let filter = if imported {
            "fkt.relname = $1"
        } else {
            "pkt.relname = $1"
        };
        let query = format!(
            r#"
            SELECT pkt.relname, pka.attname, fkt.relname, fka.attname, con.conname
            FROM pg_catalog.pg_constraint con
            JOIN pg_catalog.pg_class fkt ON fkt.oid = con.conrelid
            JOIN pg_catalog.pg_class pkt ON pkt.oid = con.confrelid
            CROSS JOIN LATERAL unnest(con.conkey, con.confkey) AS k(fk_attnum, pk_attnum)
            JOIN pg_catalog.pg_attribute fka
              ON fka.attrelid = con.conrelid AND fka.attnum = k.fk_attnum
            JOIN pg_catalog.pg_attribute pka
              ON pka.attrelid = con.confrelid AND pka.attnum = k.pk_attnum
            WHERE con.contype = 'f' AND {}
            ORDER BY con.conname
            "#,
            filter
        );

        let rows = self.client.query(&query, &[&table]).await?;
        Ok(rows
            .iter()
            .map(|row| Fk {
                pk_table: row.get::<_, String>(0).to_lowercase(),
                pk_column: row.get::<_, String>(1).to_lowercase(),
                fk_table: row.get::<_, String>(2).to_lowercase(),
                fk_column: row.get::<_, String>(3).to_lowercase(),
                constraint_name: Some(row.get::<_, String>(4)),
                inverted: imported,
            })
            .collect())
    }
}

/// Adapt a [`SqlValue`] to the statement's declared parameter type.
///
/// `tokio-postgres` binds strictly by wire type, so a 64-bit coerced integer
/// must be narrowed for an `int4` parameter, text re-parsed for `uuid`, and so
/// on.
fn bind_param(ty: &Type, value: &SqlValue) -> Result<Box<dyn ToSql + Sync + Send>> {
    let mismatch = || ExportError::Coercion {
        type_name: ty.name().to_string(),
        value: value.canonical_text(),
    };

    let boxed: Box<dyn ToSql + Sync + Send> = match ty.name() {
        "bool" => match value {
            SqlValue::Null(_) => Box::new(None::<bool>),
            SqlValue::Bool(b) => Box::new(*b),
            other => Box::new(other.canonical_text() == "true"),
        },
        "int2" => match value {
            SqlValue::Null(_) => Box::new(None::<i16>),
            v => Box::new(i16::try_from(int_of(v).ok_or_else(mismatch)?).map_err(|_| mismatch())?),
        },
        "int4" => match value {
            SqlValue::Null(_) => Box::new(None::<i32>),
            v => Box::new(i32::try_from(int_of(v).ok_or_else(mismatch)?).map_err(|_| mismatch())?),
        },
        "int8" => match value {
            SqlValue::Null(_) => Box::new(None::<i64>),
            v => Box::new(int_of(v).ok_or_else(mismatch)?),
        },
        "float4" => match value {
            SqlValue::Null(_) => Box::new(None::<f32>),
            SqlValue::F32(v) => Box::new(*v),
            SqlValue::F64(v) => Box::new(*v as f32),
            v => Box::new(int_of(v).ok_or_else(mismatch)? as f32),
        },
        "float8" => match value {
            SqlValue::Null(_) => Box::new(None::<f64>),
            SqlValue::F32(v) => Box::new(f64::from(*v)),
            SqlValue::F64(v) => Box::new(*v),
            v => Box::new(int_of(v).ok_or_else(mismatch)? as f64),
        },
        "numeric" => match value {
            SqlValue::Null(_) => Box::new(None::<Decimal>),
            SqlValue::Decimal(d) => Box::new(*d),
            SqlValue::F64(v) => Box::new(Decimal::try_from(*v).map_err(|_| mismatch())?),
            SqlValue::F32(v) => Box::new(Decimal::try_from(*v).map_err(|_| mismatch())?),
            v => Box::new(Decimal::from(int_of(v).ok_or_else(mismatch)?)),
        },
        "uuid" => match value {
            SqlValue::Null(_) => Box::new(None::<Uuid>),
            SqlValue::Uuid(u) => Box::new(*u),
            v => Box::new(Uuid::parse_str(&v.canonical_text()).map_err(|_| mismatch())?),
        },
        "timestamp" => match value {
            SqlValue::Null(_) => Box::new(None::<chrono::NaiveDateTime>),
            SqlValue::DateTime(dt) => Box::new(*dt),
            v => Box::new(
                chrono::NaiveDateTime::parse_from_str(
                    &v.canonical_text().replace(' ', "T"),
                    "%Y-%m-%dT%H:%M:%S%.f",
                )
                .map_err(|_| mismatch())?,
            ),
        },
        "date" => match value {
            SqlValue::Null(_) => Box::new(None::<chrono::NaiveDate>),
            SqlValue::Date(d) => Box::new(*d),
            v => Box::new(
                chrono::NaiveDate::parse_from_str(&v.canonical_text(), "%Y-%m-%d")
                    .map_err(|_| mismatch())?,
            ),
        },
        _ => match value {
            SqlValue::Null(_) => Box::new(None::<String>),
            v => Box::new(v.canonical_text()),
        },
    };
    Ok(boxed)
}

/// Extract an i64 from integral values or integer-shaped text.
fn int_of(value: &SqlValue) -> Option<i64> {
    value.as_i64().or_else(|| match value {
        SqlValue::Text(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Materialize one driver row as ordered (name, value) pairs.
fn convert_row(row: &tokio_postgres::Row) -> RawRow {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| (col.name().to_string(), convert_value(row, i, col.type_())))
        .collect()
}

fn convert_value(row: &tokio_postgres::Row, idx: usize, ty: &Type) -> SqlValue {
    match ty.name() {
        "bool" => opt(row.try_get::<_, Option<bool>>(idx), SqlValue::Bool, SqlNullType::Bool),
        "int2" => opt(row.try_get::<_, Option<i16>>(idx), SqlValue::I16, SqlNullType::I16),
        "int4" => opt(row.try_get::<_, Option<i32>>(idx), SqlValue::I32, SqlNullType::I32),
        "int8" => opt(row.try_get::<_, Option<i64>>(idx), SqlValue::I64, SqlNullType::I64),
        "float4" => opt(row.try_get::<_, Option<f32>>(idx), SqlValue::F32, SqlNullType::F32),
        "float8" => opt(row.try_get::<_, Option<f64>>(idx), SqlValue::F64, SqlNullType::F64),
        "numeric" => opt(
            row.try_get::<_, Option<Decimal>>(idx),
            SqlValue::Decimal,
            SqlNullType::Decimal,
        ),
        "uuid" => opt(row.try_get::<_, Option<Uuid>>(idx), SqlValue::Uuid, SqlNullType::Uuid),
        "timestamp" => opt(
            row.try_get::<_, Option<chrono::NaiveDateTime>>(idx),
            SqlValue::DateTime,
            SqlNullType::DateTime,
        ),
        "timestamptz" => opt(
            row.try_get::<_, Option<chrono::DateTime<chrono::FixedOffset>>>(idx),
            SqlValue::DateTimeOffset,
            SqlNullType::DateTimeOffset,
        ),
        "date" => opt(
            row.try_get::<_, Option<chrono::NaiveDate>>(idx),
            SqlValue::Date,
            SqlNullType::Date,
        ),
        "time" => opt(
            row.try_get::<_, Option<chrono::NaiveTime>>(idx),
            SqlValue::Time,
            SqlNullType::Time,
        ),
        "bytea" => opt(
            row.try_get::<_, Option<Vec<u8>>>(idx),
            SqlValue::Bytes,
            SqlNullType::Bytes,
        ),
        _ => opt(
            row.try_get::<_, Option<String>>(idx),
            SqlValue::Text,
            SqlNullType::String,
        ),
    }
}

fn opt<T>(
    got: std::result::Result<Option<T>, tokio_postgres::Error>,
    wrap: impl Fn(T) -> SqlValue,
    null: SqlNullType,
) -> SqlValue {
    match got {
        Ok(Some(v)) => wrap(v),
        _ => SqlValue::Null(null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_param_narrows_integers() {
        assert!(bind_param(&Type::INT4, &SqlValue::I64(41)).is_ok());
        assert!(bind_param(&Type::INT2, &SqlValue::I64(1 << 40)).is_err());
    }

    #[test]
    fn test_bind_param_parses_uuid_text() {
        let ok = bind_param(
            &Type::UUID,
            &SqlValue::Text("00000000-0000-0000-0000-000000000000".into()),
        );
        assert!(ok.is_ok());
        assert!(bind_param(&Type::UUID, &SqlValue::Text("not-a-uuid".into())).is_err());
    }

    #[test]
    fn test_bind_param_null_is_typed() {
        assert!(bind_param(&Type::INT8, &SqlValue::Null(SqlNullType::I64)).is_ok());
        assert!(bind_param(&Type::TIMESTAMP, &SqlValue::Null(SqlNullType::DateTime)).is_ok());
    }
}
