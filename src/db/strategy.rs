//! Dialect-specific catalog queries.
//!
//! Every dialect publishes ordered candidate query sets for tables, columns
//! and relationships. Candidates are tried in order and the first that
//! executes without a driver error wins; an empty result set is a success.
//! Each candidate's rows carry the canonical column names (`table_name`,
//! `column_name`, `data_type`, `is_nullable`, `column_default`, and the
//! relationship septet), so downstream transformation is dialect-agnostic.

use crate::models::{DatabaseType, QueryParam};

/// One candidate catalog statement with its bound arguments.
#[derive(Debug, Clone)]
pub struct CatalogQuery {
    pub sql: String,
    pub params: Vec<QueryParam>,
}

impl CatalogQuery {
    fn plain(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    fn with_params(sql: impl Into<String>, params: Vec<QueryParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Strategy for one dialect's catalog layout.
pub trait DialectStrategy: Send + Sync {
    fn tables_queries(&self) -> Vec<CatalogQuery>;
    fn columns_queries(&self, table: &str) -> Vec<CatalogQuery>;
    fn relationships_queries(&self, table: Option<&str>) -> Vec<CatalogQuery>;
}

/// Select the strategy for a dialect.
pub fn strategy_for(db_type: DatabaseType) -> Box<dyn DialectStrategy> {
    match db_type {
        DatabaseType::Postgres => Box::new(PostgresStrategy),
        DatabaseType::MySql => Box::new(MySqlStrategy),
        DatabaseType::Sqlite => Box::new(SqliteStrategy),
        DatabaseType::Oracle => Box::new(OracleStrategy),
    }
}

fn text_param(table: &str) -> Vec<QueryParam> {
    vec![QueryParam::String(table.to_string())]
}

pub struct PostgresStrategy;

impl DialectStrategy for PostgresStrategy {
    fn tables_queries(&self) -> Vec<CatalogQuery> {
        vec![
            CatalogQuery::plain(
                "SELECT tablename AS table_name FROM pg_catalog.pg_tables WHERE schemaname = 'public'",
            ),
            CatalogQuery::plain(
                "SELECT table_name FROM information_schema.tables WHERE table_schema = 'public'",
            ),
            CatalogQuery::plain(
                "SELECT relname AS table_name FROM pg_catalog.pg_class \
                 WHERE relkind = 'r' AND relnamespace = \
                 (SELECT oid FROM pg_catalog.pg_namespace WHERE nspname = 'public')",
            ),
        ]
    }

    fn columns_queries(&self, table: &str) -> Vec<CatalogQuery> {
        vec![
            CatalogQuery::with_params(
                "SELECT column_name, data_type, \
                 CASE WHEN is_nullable = 'YES' THEN 'YES' ELSE 'NO' END AS is_nullable, \
                 column_default \
                 FROM information_schema.columns \
                 WHERE table_name = $1 AND table_schema = 'public' \
                 ORDER BY ordinal_position",
                text_param(table),
            ),
            CatalogQuery::with_params(
                "SELECT a.attname AS column_name, \
                 pg_catalog.format_type(a.atttypid, a.atttypmod) AS data_type, \
                 CASE WHEN a.attnotnull THEN 'NO' ELSE 'YES' END AS is_nullable, \
                 pg_catalog.pg_get_expr(d.adbin, d.adrelid) AS column_default \
                 FROM pg_catalog.pg_attribute a \
                 LEFT JOIN pg_catalog.pg_attrdef d ON (a.attrelid = d.adrelid AND a.attnum = d.adnum) \
                 WHERE a.attrelid = (SELECT oid FROM pg_catalog.pg_class WHERE relname = $1 \
                 AND relnamespace = (SELECT oid FROM pg_catalog.pg_namespace WHERE nspname = 'public')) \
                 AND a.attnum > 0 AND NOT a.attisdropped \
                 ORDER BY a.attnum",
                text_param(table),
            ),
        ]
    }

    fn relationships_queries(&self, table: Option<&str>) -> Vec<CatalogQuery> {
        let information_schema = "SELECT \
             tc.table_schema, tc.constraint_name, tc.table_name, kcu.column_name, \
             ccu.table_schema AS foreign_table_schema, \
             ccu.table_name AS foreign_table_name, \
             ccu.column_name AS foreign_column_name \
             FROM information_schema.table_constraints AS tc \
             JOIN information_schema.key_column_usage AS kcu \
             ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
             JOIN information_schema.constraint_column_usage AS ccu \
             ON ccu.constraint_name = tc.constraint_name AND ccu.table_schema = tc.table_schema \
             WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_schema = 'public'";
        let pg_catalog = "SELECT \
             ns.nspname AS table_schema, c.conname AS constraint_name, \
             cl.relname AS table_name, att.attname AS column_name, \
             ns2.nspname AS foreign_table_schema, cl2.relname AS foreign_table_name, \
             att2.attname AS foreign_column_name \
             FROM pg_constraint c \
             JOIN pg_class cl ON c.conrelid = cl.oid \
             JOIN pg_attribute att ON att.attrelid = cl.oid AND att.attnum = ANY(c.conkey) \
             JOIN pg_namespace ns ON ns.oid = cl.relnamespace \
             JOIN pg_class cl2 ON c.confrelid = cl2.oid \
             JOIN pg_attribute att2 ON att2.attrelid = cl2.oid AND att2.attnum = ANY(c.confkey) \
             JOIN pg_namespace ns2 ON ns2.oid = cl2.relnamespace \
             WHERE c.contype = 'f' AND ns.nspname = 'public'";

        match table {
            None => vec![
                CatalogQuery::plain(information_schema),
                CatalogQuery::plain(pg_catalog),
            ],
            Some(t) => vec![
                CatalogQuery::with_params(
                    format!(
                        "{} AND (tc.table_name = $1 OR ccu.table_name = $1)",
                        information_schema
                    ),
                    text_param(t),
                ),
                CatalogQuery::with_params(
                    format!("{} AND (cl.relname = $1 OR cl2.relname = $1)", pg_catalog),
                    text_param(t),
                ),
            ],
        }
    }
}

pub struct MySqlStrategy;

impl DialectStrategy for MySqlStrategy {
    fn tables_queries(&self) -> Vec<CatalogQuery> {
        vec![
            CatalogQuery::plain(
                "SELECT table_name FROM information_schema.tables WHERE table_schema = DATABASE()",
            ),
            CatalogQuery::plain("SHOW TABLES"),
        ]
    }

    fn columns_queries(&self, table: &str) -> Vec<CatalogQuery> {
        vec![
            CatalogQuery::with_params(
                "SELECT column_name, data_type, is_nullable, column_default \
                 FROM information_schema.columns \
                 WHERE table_name = ? AND table_schema = DATABASE() \
                 ORDER BY ordinal_position",
                text_param(table),
            ),
            // Older servers without information_schema grants.
            CatalogQuery::plain(format!("SHOW COLUMNS FROM {}", table)),
        ]
    }

    fn relationships_queries(&self, table: Option<&str>) -> Vec<CatalogQuery> {
        let constraints = "SELECT \
             tc.table_schema, tc.constraint_name, tc.table_name, kcu.column_name, \
             kcu.referenced_table_schema AS foreign_table_schema, \
             kcu.referenced_table_name AS foreign_table_name, \
             kcu.referenced_column_name AS foreign_column_name \
             FROM information_schema.table_constraints AS tc \
             JOIN information_schema.key_column_usage AS kcu \
             ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
             WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_schema = DATABASE()";
        let key_usage = "SELECT \
             kcu.constraint_schema AS table_schema, kcu.constraint_name, \
             kcu.table_name, kcu.column_name, \
             kcu.referenced_table_schema AS foreign_table_schema, \
             kcu.referenced_table_name AS foreign_table_name, \
             kcu.referenced_column_name AS foreign_column_name \
             FROM information_schema.key_column_usage kcu \
             WHERE kcu.referenced_table_name IS NOT NULL \
             AND kcu.constraint_schema = DATABASE()";

        match table {
            None => vec![
                CatalogQuery::plain(constraints),
                CatalogQuery::plain(key_usage),
            ],
            Some(t) => vec![
                CatalogQuery::with_params(
                    format!(
                        "{} AND (tc.table_name = ? OR kcu.referenced_table_name = ?)",
                        constraints
                    ),
                    vec![
                        QueryParam::String(t.to_string()),
                        QueryParam::String(t.to_string()),
                    ],
                ),
                CatalogQuery::with_params(
                    format!(
                        "{} AND (kcu.table_name = ? OR kcu.referenced_table_name = ?)",
                        key_usage
                    ),
                    vec![
                        QueryParam::String(t.to_string()),
                        QueryParam::String(t.to_string()),
                    ],
                ),
            ],
        }
    }
}

pub struct SqliteStrategy;

impl DialectStrategy for SqliteStrategy {
    fn tables_queries(&self) -> Vec<CatalogQuery> {
        vec![
            CatalogQuery::plain(
                "SELECT name AS table_name FROM sqlite_master \
                 WHERE type='table' AND name NOT LIKE 'sqlite_%'",
            ),
            CatalogQuery::plain(
                "SELECT name AS table_name FROM sqlite_master \
                 WHERE type='table' AND name NOT IN ('sqlite_sequence', 'sqlite_stat1')",
            ),
            CatalogQuery::plain(
                "SELECT name AS table_name FROM pragma_table_list() \
                 WHERE type='table' AND schema='main' AND name NOT LIKE 'sqlite_%'",
            ),
        ]
    }

    fn columns_queries(&self, table: &str) -> Vec<CatalogQuery> {
        vec![
            CatalogQuery::with_params(
                "SELECT p.name AS column_name, p.type AS data_type, \
                 CASE WHEN p.\"notnull\" = 0 THEN 'YES' ELSE 'NO' END AS is_nullable, \
                 p.dflt_value AS column_default \
                 FROM pragma_table_info(?) p \
                 ORDER BY p.cid",
                text_param(table),
            ),
            CatalogQuery::plain(format!("PRAGMA table_info({})", table)),
        ]
    }

    fn relationships_queries(&self, table: Option<&str>) -> Vec<CatalogQuery> {
        let all_tables = "SELECT \
             'main' AS table_schema, \
             'fk_' || m.name || '_' || f.id AS constraint_name, \
             m.name AS table_name, \
             f.\"from\" AS column_name, \
             'main' AS foreign_table_schema, \
             f.\"table\" AS foreign_table_name, \
             f.\"to\" AS foreign_column_name \
             FROM sqlite_master m \
             JOIN pragma_foreign_key_list(m.name) f \
             WHERE m.type = 'table' AND m.name NOT LIKE 'sqlite_%'";

        match table {
            None => vec![CatalogQuery::plain(all_tables)],
            Some(t) => vec![
                CatalogQuery::with_params(
                    "SELECT \
                     'main' AS table_schema, \
                     'fk_' || ? || '_' || id AS constraint_name, \
                     ? AS table_name, \
                     \"from\" AS column_name, \
                     'main' AS foreign_table_schema, \
                     \"table\" AS foreign_table_name, \
                     \"to\" AS foreign_column_name \
                     FROM pragma_foreign_key_list(?)",
                    vec![
                        QueryParam::String(t.to_string()),
                        QueryParam::String(t.to_string()),
                        QueryParam::String(t.to_string()),
                    ],
                ),
                CatalogQuery::plain(all_tables),
            ],
        }
    }
}

pub struct OracleStrategy;

// Oracle upper-cases unquoted aliases, so every alias is double-quoted to
// keep the canonical lower-case column names.
impl DialectStrategy for OracleStrategy {
    fn tables_queries(&self) -> Vec<CatalogQuery> {
        vec![
            CatalogQuery::plain("SELECT table_name AS \"table_name\" FROM user_tables"),
            CatalogQuery::plain(
                "SELECT object_name AS \"table_name\" FROM user_objects \
                 WHERE object_type = 'TABLE'",
            ),
        ]
    }

    fn columns_queries(&self, table: &str) -> Vec<CatalogQuery> {
        vec![
            CatalogQuery::with_params(
                "SELECT column_name AS \"column_name\", data_type AS \"data_type\", \
                 CASE WHEN nullable = 'Y' THEN 'YES' ELSE 'NO' END AS \"is_nullable\", \
                 data_default AS \"column_default\" \
                 FROM user_tab_columns WHERE table_name = UPPER(:1) \
                 ORDER BY column_id",
                text_param(table),
            ),
            CatalogQuery::with_params(
                "SELECT column_name AS \"column_name\", data_type AS \"data_type\", \
                 CASE WHEN nullable = 'Y' THEN 'YES' ELSE 'NO' END AS \"is_nullable\", \
                 data_default AS \"column_default\" \
                 FROM all_tab_columns WHERE table_name = UPPER(:1) AND owner = USER \
                 ORDER BY column_id",
                text_param(table),
            ),
        ]
    }

    fn relationships_queries(&self, table: Option<&str>) -> Vec<CatalogQuery> {
        let base = "SELECT \
             c.owner AS \"table_schema\", c.constraint_name AS \"constraint_name\", \
             c.table_name AS \"table_name\", cc.column_name AS \"column_name\", \
             r.owner AS \"foreign_table_schema\", r.table_name AS \"foreign_table_name\", \
             rc.column_name AS \"foreign_column_name\" \
             FROM user_constraints c \
             JOIN user_cons_columns cc ON cc.constraint_name = c.constraint_name \
             JOIN user_constraints r ON r.constraint_name = c.r_constraint_name \
             JOIN user_cons_columns rc ON rc.constraint_name = r.constraint_name \
             AND rc.position = cc.position \
             WHERE c.constraint_type = 'R'";

        match table {
            None => vec![CatalogQuery::plain(base)],
            Some(t) => vec![CatalogQuery::with_params(
                format!(
                    "{} AND (c.table_name = UPPER(:1) OR r.table_name = UPPER(:1))",
                    base
                ),
                text_param(t),
            )],
        }
    }
}
