//! Schema introspection: turns the catalog into `CREATE TABLE` text the
//! assistant can be trained on.

use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    pub fn to_ddl(&self) -> String {
        let column_defs: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                if c.nullable {
                    format!("{} {}", c.name, c.data_type)
                } else {
                    format!("{} {} NOT NULL", c.name, c.data_type)
                }
            })
            .collect();

        format!(
            "CREATE TABLE {} (\n  {}\n);",
            self.name,
            column_defs.join(",\n  ")
        )
    }
}

/// List ordinary and partitioned tables in `schema`, columns in ordinal order.
pub async fn list_tables(pool: &PgPool, schema: &str) -> Result<Vec<TableDef>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, String, String, bool)>(
        r#"
        SELECT
            c.relname::text,
            a.attname::text,
            format_type(a.atttypid, a.atttypmod),
            NOT a.attnotnull
        FROM pg_catalog.pg_class c
        JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
        JOIN pg_catalog.pg_attribute a ON a.attrelid = c.oid
        WHERE n.nspname = $1
          AND c.relkind IN ('r', 'p')
          AND NOT c.relispartition
          AND a.attnum > 0
          AND NOT a.attisdropped
        ORDER BY c.relname, a.attnum
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await?;

    let tables = group_columns(rows);
    tracing::debug!(schema, tables = tables.len(), "Introspected schema");
    Ok(tables)
}

/// Rows arrive sorted by table; fold consecutive rows into one `TableDef`.
fn group_columns(rows: Vec<(String, String, String, bool)>) -> Vec<TableDef> {
    let mut tables: Vec<TableDef> = Vec::new();
    for (table, name, data_type, nullable) in rows {
        let column = ColumnDef {
            name,
            data_type,
            nullable,
        };
        match tables.last_mut() {
            Some(last) if last.name == table => last.columns.push(column),
            _ => tables.push(TableDef {
                name: table,
                columns: vec![column],
            }),
        }
    }
    tables
}

pub async fn all_ddl(pool: &PgPool, schema: &str) -> Result<Vec<String>, sqlx::Error> {
    Ok(list_tables(pool, schema)
        .await?
        .iter()
        .map(TableDef::to_ddl)
        .collect())
}
