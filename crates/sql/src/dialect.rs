//! Dialect resolution and statement rewriting.
//!
//! `resolve_dialect` maps a user-supplied dialect name to a `sqlparser`
//! dialect. `transpile` parses with the origin dialect and re-renders the
//! AST; `optimize` parses with the generic dialect and re-renders, which
//! normalizes whitespace, keyword casing and redundant syntax.

use sqlparser::dialect::{
    AnsiDialect, BigQueryDialect, ClickHouseDialect, Dialect, DuckDbDialect, GenericDialect,
    HiveDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect, RedshiftSqlDialect,
    SQLiteDialect, SnowflakeDialect,
};
use sqlparser::parser::Parser;
use sqlyard_error::{Error, ErrorCode, Result};

const SUPPORTED_DIALECTS: &str = "sqlite, postgres, mysql, mssql, snowflake, bigquery, \
     clickhouse, duckdb, hive, redshift, ansi, generic";

/// Map a dialect name to a `sqlparser` dialect. Unknown names are a
/// validation error, raised before any parsing happens.
pub fn resolve_dialect(name: &str) -> Result<Box<dyn Dialect>> {
    match name.to_lowercase().as_str() {
        "sqlite" => Ok(Box::new(SQLiteDialect {})),
        "postgres" | "postgresql" => Ok(Box::new(PostgreSqlDialect {})),
        "mysql" | "mariadb" => Ok(Box::new(MySqlDialect {})),
        "mssql" | "sqlserver" => Ok(Box::new(MsSqlDialect {})),
        "snowflake" => Ok(Box::new(SnowflakeDialect {})),
        "bigquery" => Ok(Box::new(BigQueryDialect {})),
        "clickhouse" => Ok(Box::new(ClickHouseDialect {})),
        "duckdb" => Ok(Box::new(DuckDbDialect {})),
        "hive" => Ok(Box::new(HiveDialect {})),
        "redshift" => Ok(Box::new(RedshiftSqlDialect {})),
        "ansi" => Ok(Box::new(AnsiDialect {})),
        "generic" => Ok(Box::new(GenericDialect {})),
        other => Err(
            Error::new(ErrorCode::InvalidDialect, format!("Unknown SQL dialect '{}'", other))
                .with_hint(format!("Supported dialects: {}", SUPPORTED_DIALECTS)),
        ),
    }
}

/// Convert a query from one SQL dialect to another.
///
/// The statement is parsed with the origin dialect and re-rendered from the
/// AST. Rendering is portable SQL rather than target-specific syntax; the
/// target dialect is still validated so callers get a synchronous error for
/// a bad name.
pub fn transpile(sql: &str, origin_dialect: &str, target_dialect: &str) -> Result<String> {
    let origin = resolve_dialect(origin_dialect)?;
    resolve_dialect(target_dialect)?;

    let statements = parse(&*origin, sql)?;

    Ok(statements
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; "))
}

/// Normalize a query: collapse whitespace, canonicalize keyword casing.
pub fn optimize(sql: &str) -> Result<String> {
    let statements = parse(&GenericDialect {}, sql)?;

    Ok(statements
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; "))
}

fn parse(dialect: &dyn Dialect, sql: &str) -> Result<Vec<sqlparser::ast::Statement>> {
    let statements = Parser::parse_sql(dialect, sql).map_err(|e| {
        Error::new(ErrorCode::SyntaxError, format!("Error parsing query: {}", e))
    })?;

    if statements.is_empty() {
        return Err(Error::new(ErrorCode::EmptyQuery, "Query contains no statements"));
    }

    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transpile_roundtrip() {
        let out = transpile("SELECT id, name FROM users WHERE id = 1", "mysql", "postgres")
            .unwrap();
        assert_eq!(out, "SELECT id, name FROM users WHERE id = 1");
    }

    #[test]
    fn test_transpile_unknown_dialect() {
        let err = transpile("SELECT 1", "mysql", "oracle9i").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidDialect);

        let err = transpile("SELECT 1", "clipper", "postgres").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidDialect);
    }

    #[test]
    fn test_transpile_syntax_error() {
        let err = transpile("SELEKT 1", "mysql", "postgres").unwrap_err();
        assert_eq!(err.code, ErrorCode::SyntaxError);
    }

    #[test]
    fn test_optimize_normalizes_whitespace_and_keywords() {
        let out = optimize("select   *\n  from   t\twhere x=1").unwrap();
        assert_eq!(out, "SELECT * FROM t WHERE x = 1");
    }

    #[test]
    fn test_optimize_empty_query() {
        let err = optimize("   ").unwrap_err();
        assert_eq!(err.code, ErrorCode::EmptyQuery);
    }

    #[test]
    fn test_multiple_statements_joined() {
        let out = optimize("SELECT 1; SELECT 2").unwrap();
        assert_eq!(out, "SELECT 1; SELECT 2");
    }

    #[test]
    fn test_dialect_aliases() {
        assert!(resolve_dialect("PostgreSQL").is_ok());
        assert!(resolve_dialect("mariadb").is_ok());
        assert!(resolve_dialect("sqlserver").is_ok());
    }
}
