// Column type mapping for CREATE TABLE
//
// Runs on engine-dialect text after the general rewrite. The statement is
// parsed with the SQLite grammar and its column definitions are rewritten in
// the AST. Counter columns become rowid aliases unless the table declares its
// own primary key.

use anyhow::{bail, Context, Result};
use sqlparser::ast::{ColumnDef, ColumnOption, ColumnOptionDef, DataType, Ident, ObjectName, Statement, TableConstraint};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::keywords::Keyword;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;

use super::inspect::type_base_name;
use super::lexer::{lex, matching_paren, significant, LexMode};
use crate::models::{canonical_type, COUNTER_TYPE};

/// Foreign type name to engine type; arguments of mapped types are dropped
const TYPE_MAP: &[(&str, &str)] = &[
    ("MONEY", "NUMERIC"),
    ("CURRENCY", "NUMERIC"),
    ("TEXT", "TEXT"),
    ("MEMO", "TEXT"),
    ("CHAR", "TEXT"),
    ("VARCHAR", "TEXT"),
    ("LONGTEXT", "TEXT"),
    ("STRING", "TEXT"),
    ("GUID", "TEXT"),
    ("YESNO", "BOOLEAN"),
    ("BIT", "BOOLEAN"),
    ("LOGICAL", "BOOLEAN"),
    ("BYTE", "INTEGER"),
    ("SHORT", "INTEGER"),
    ("SMALLINT", "INTEGER"),
    ("LONG", "INTEGER"),
    ("INT", "INTEGER"),
    ("SINGLE", "REAL"),
    ("DOUBLE", "REAL"),
    ("FLOAT", "REAL"),
    ("OLEOBJECT", "BLOB"),
    ("LONGBINARY", "BLOB"),
    ("BINARY", "BLOB"),
    ("IMAGE", "BLOB"),
];

fn map_type(type_name: &str) -> Option<&'static str> {
    TYPE_MAP
        .iter()
        .find(|(foreign, _)| foreign.eq_ignore_ascii_case(type_name))
        .map(|(_, engine)| *engine)
}

fn engine_type(name: &str) -> DataType {
    DataType::Custom(ObjectName::from(vec![Ident::new(name)]), vec![])
}

/// Rewrite the column types of an engine-dialect CREATE TABLE.
///
/// Statements without a column list (`CREATE TABLE … AS SELECT`) pass through.
pub fn rewrite_column_types(sql: &str) -> Result<String> {
    let normalized = drop_text_length(sql);
    let mut statements =
        Parser::parse_sql(&SQLiteDialect {}, &normalized).context("Failed to parse CREATE TABLE statement")?;
    if statements.len() != 1 {
        bail!("Expected one CREATE TABLE statement, found {}", statements.len());
    }
    let Some(Statement::CreateTable(create)) = statements.first_mut() else {
        bail!("Expected a CREATE TABLE statement");
    };
    if create.query.is_some() {
        return Ok(sql.to_string());
    }

    let has_table_key = create
        .constraints
        .iter()
        .any(|constraint| matches!(constraint, TableConstraint::PrimaryKey(_)))
        || create
            .columns
            .iter()
            .any(|column| !is_counter(column) && column.options.iter().any(|def| is_primary_key(&def.option)));

    for column in &mut create.columns {
        rewrite_column(column, has_table_key);
    }

    Ok(create.to_string())
}

fn is_counter(column: &ColumnDef) -> bool {
    canonical_type(&type_base_name(&column.data_type)) == COUNTER_TYPE
}

fn is_primary_key(option: &ColumnOption) -> bool {
    matches!(option, ColumnOption::PrimaryKey(_))
}

/// Key clauses already implied by `INTEGER PRIMARY KEY AUTOINCREMENT`
fn is_key_clause(option: &ColumnOption) -> bool {
    match option {
        ColumnOption::DialectSpecific(tokens) => tokens.iter().all(|token| {
            matches!(
                token,
                Token::Word(word) if matches!(word.keyword, Keyword::AUTOINCREMENT | Keyword::ASC | Keyword::DESC)
            )
        }),
        other => is_primary_key(other),
    }
}

fn rewrite_column(column: &mut ColumnDef, has_table_key: bool) {
    if is_counter(column) {
        column.data_type = engine_type("INTEGER");
        if !has_table_key {
            column.options.retain(|def| !is_key_clause(&def.option));
            column.options.insert(
                0,
                ColumnOptionDef {
                    name: None,
                    option: ColumnOption::DialectSpecific(vec![
                        Token::make_keyword("PRIMARY"),
                        Token::make_keyword("KEY"),
                        Token::make_keyword("AUTOINCREMENT"),
                    ]),
                },
            );
        }
    } else if let Some(mapped) = map_type(&type_base_name(&column.data_type)) {
        column.data_type = engine_type(mapped);
    }
}

/// Remove the length of `TEXT(n)`, which the SQLite grammar does not accept
fn drop_text_length(sql: &str) -> String {
    let lexemes = lex(sql, LexMode::Engine);
    let sig = significant(&lexemes);

    let mut out = String::with_capacity(sql.len());
    let mut i = 0;
    while i < lexemes.len() {
        out.push_str(lexemes[i].raw());
        if lexemes[i].is_keyword("TEXT") {
            let close = sig
                .iter()
                .find(|&&next| next > i)
                .filter(|&&next| lexemes[next].is_symbol("("))
                .and_then(|&open| matching_paren(&lexemes, open));
            if let Some(close) = close {
                i = close + 1;
                continue;
            }
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_becomes_rowid_alias() {
        let sql = rewrite_column_types(r#"CREATE TABLE "T" ("ID" COUNTER PRIMARY KEY, "NAME" TEXT(50))"#).unwrap();
        assert_eq!(
            sql,
            r#"CREATE TABLE "T" ("ID" INTEGER PRIMARY KEY AUTOINCREMENT, "NAME" TEXT)"#
        );
    }

    #[test]
    fn test_counter_with_table_key_stays_plain_integer() {
        let sql = rewrite_column_types(
            "CREATE TABLE t (id AUTOINCREMENT(1, 1), code TEXT, PRIMARY KEY (code))",
        )
        .unwrap();
        assert_eq!(sql, "CREATE TABLE t (id INTEGER, code TEXT, PRIMARY KEY (code))");
    }

    #[test]
    fn test_counter_with_column_key_elsewhere_stays_plain_integer() {
        let sql = rewrite_column_types("CREATE TABLE t (id COUNTER, code TEXT PRIMARY KEY)").unwrap();
        assert_eq!(sql, "CREATE TABLE t (id INTEGER, code TEXT PRIMARY KEY)");
    }

    #[test]
    fn test_access_types_are_mapped() {
        let sql = rewrite_column_types(
            "CREATE TABLE t (price MONEY NOT NULL, flag YESNO, n LONG, r DOUBLE, pic OLEOBJECT, d DATETIME, x NUMERIC(10,2))",
        )
        .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE t (price NUMERIC NOT NULL, flag BOOLEAN, n INTEGER, r REAL, pic BLOB, d DATETIME, x NUMERIC(10,2))"
        );
    }

    #[test]
    fn test_constraint_name_before_primary_is_dropped() {
        let sql = rewrite_column_types("CREATE TABLE t (id COUNTER CONSTRAINT pk PRIMARY KEY)").unwrap();
        assert!(!sql.contains("pk"));
        assert_eq!(sql.matches("PRIMARY KEY").count(), 1);
    }

    #[test]
    fn test_defaults_survive_the_rewrite() {
        let sql = rewrite_column_types(
            "CREATE TABLE t (label TEXT(10) DEFAULT 'n/a', placed DATETIME DEFAULT (datetime('now', 'localtime')))",
        )
        .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE t (label TEXT DEFAULT 'n/a', placed DATETIME DEFAULT (datetime('now', 'localtime')))"
        );
    }

    #[test]
    fn test_create_as_select_passes_through() {
        let sql = "CREATE TABLE t2 AS SELECT (a + 1) AS b FROM t";
        assert_eq!(rewrite_column_types(sql).unwrap(), sql);
    }

    #[test]
    fn test_malformed_statements_are_errors() {
        assert!(rewrite_column_types("CREATE TABLE t (a TEXT").is_err());
        assert!(rewrite_column_types("CREATE TABLE t (a TEXT); DROP TABLE u").is_err());
    }
}
