// Access Dialect Translator
//
// Translates Access (Jet) SQL to SQLite: bracketed identifiers, double-quoted
// strings, #date# literals, the & operator and a handful of function names.
// Zero-argument Now(), Date() and Time() are carried through classification
// as placeholders so the statement text can be restored for the journal.

use anyhow::{bail, Result};

use super::create_table::rewrite_column_types;
use super::inspect;
use super::lexer::{lex, quote_identifier, quote_string, significant, unquote, LexMode, Lexeme};
use super::{DialectTranslator, SchemaChange};
use crate::models::DdlType;

const WORKAROUND_PREFIX: &str = "UCA_WA_";

/// Functions that need a placeholder, with their engine expression
const WORKAROUND_FUNCTIONS: &[(&str, &str)] = &[
    ("NOW", "(datetime('now', 'localtime'))"),
    ("DATE", "(date('now', 'localtime'))"),
    ("TIME", "(time('now', 'localtime'))"),
];

const FUNCTION_RENAMES: &[(&str, &str)] = &[
    ("LEN", "length"),
    ("UCASE", "upper"),
    ("LCASE", "lower"),
    ("MID", "substr"),
    ("NZ", "ifnull"),
];

fn lookup(table: &'static [(&'static str, &'static str)], word: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(word))
        .map(|(_, value)| *value)
}

fn strip_workaround_prefix(word: &str) -> Option<&str> {
    word.get(..WORKAROUND_PREFIX.len())
        .filter(|prefix| prefix.eq_ignore_ascii_case(WORKAROUND_PREFIX))
        .map(|_| &word[WORKAROUND_PREFIX.len()..])
}

/// Position of `at` among the significant lexemes
fn position(sig: &[usize], at: usize) -> Option<usize> {
    sig.binary_search(&at).ok()
}

/// Whether the word at `at` is a function call
fn is_call(lexemes: &[Lexeme<'_>], sig: &[usize], at: usize) -> bool {
    position(sig, at)
        .and_then(|p| sig.get(p + 1))
        .is_some_and(|&next| lexemes[next].is_symbol("("))
}

/// Index of the `)` when the word at `at` is called with no arguments
fn empty_call_end(lexemes: &[Lexeme<'_>], sig: &[usize], at: usize) -> Option<usize> {
    let p = position(sig, at)?;
    let (open, close) = (*sig.get(p + 1)?, *sig.get(p + 2)?);
    (lexemes[open].is_symbol("(") && lexemes[close].is_symbol(")")).then_some(close)
}

/// Whether the word at `at` follows a `.` (a column or member name)
fn is_qualified(lexemes: &[Lexeme<'_>], sig: &[usize], at: usize) -> bool {
    position(sig, at)
        .and_then(|p| p.checked_sub(1))
        .is_some_and(|prev| lexemes[sig[prev]].is_symbol("."))
}

/// Whether a bare word is already a valid engine identifier as written
fn is_plain_word(word: &str) -> bool {
    word.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Translator for the Microsoft Access SQL dialect
pub struct AccessDialectTranslator;

impl AccessDialectTranslator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AccessDialectTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl DialectTranslator for AccessDialectTranslator {
    fn dialect_name(&self) -> &str {
        "Access"
    }

    fn is_ddl(&self, sql: &str) -> bool {
        self.rewrite(sql).is_ok_and(|engine_sql| inspect::is_ddl(&engine_sql))
    }

    fn classify_ddl(&self, sql: &str) -> Option<DdlType> {
        let engine_sql = self.rewrite(sql).ok()?;
        inspect::classify(&engine_sql)
    }

    fn rewrite(&self, sql: &str) -> Result<String> {
        let lexemes = lex(sql, LexMode::Foreign);
        if let Some(open) = lexemes.iter().find(|lexeme| !lexeme.is_terminated()) {
            bail!("Unterminated literal or identifier: {}", open.raw());
        }
        let sig = significant(&lexemes);

        let mut out = String::with_capacity(sql.len() + 16);
        let mut resume_at = 0;
        for (i, lexeme) in lexemes.iter().enumerate() {
            if i < resume_at {
                continue;
            }
            match lexeme {
                Lexeme::Identifier { name, .. } => {
                    out.push_str(&quote_identifier(&self.escape_identifier(name)));
                }
                Lexeme::Str(raw) if raw.starts_with('"') => out.push_str(&quote_string(&unquote(raw))),
                Lexeme::Date(raw) => out.push_str(&quote_string(raw.trim_matches('#').trim())),
                Lexeme::Symbol("&") => out.push_str("||"),
                Lexeme::Word(word) if !is_plain_word(word) => {
                    out.push_str(&quote_identifier(&self.escape_identifier(word)));
                }
                Lexeme::Word(word) if !is_qualified(&lexemes, &sig, i) => {
                    let workaround = strip_workaround_prefix(word)
                        .and_then(|function| lookup(WORKAROUND_FUNCTIONS, function))
                        .zip(empty_call_end(&lexemes, &sig, i));
                    if let Some((expression, close)) = workaround {
                        out.push_str(expression);
                        resume_at = close + 1;
                    } else if word.eq_ignore_ascii_case("DISTINCTROW") {
                        out.push_str("DISTINCT");
                    } else if let Some(renamed) =
                        lookup(FUNCTION_RENAMES, word).filter(|_| is_call(&lexemes, &sig, i))
                    {
                        out.push_str(renamed);
                    } else {
                        out.push_str(word);
                    }
                }
                other => out.push_str(other.raw()),
            }
        }

        Ok(out)
    }

    fn rewrite_create_table(&self, sql: &str) -> Result<String> {
        rewrite_column_types(sql)
    }

    fn substitute_workarounds(&self, sql: &str) -> String {
        let lexemes = lex(sql, LexMode::Foreign);
        let sig = significant(&lexemes);

        let mut out = String::with_capacity(sql.len() + 16);
        for (i, lexeme) in lexemes.iter().enumerate() {
            if let Lexeme::Word(word) = lexeme {
                if lookup(WORKAROUND_FUNCTIONS, word).is_some()
                    && !is_qualified(&lexemes, &sig, i)
                    && empty_call_end(&lexemes, &sig, i).is_some()
                {
                    out.push_str(WORKAROUND_PREFIX);
                }
            }
            out.push_str(lexeme.raw());
        }
        out
    }

    fn restore_original_text(&self, sql: &str) -> String {
        lex(sql, LexMode::Foreign)
            .iter()
            .map(|lexeme| match lexeme {
                Lexeme::Word(word) => strip_workaround_prefix(word).unwrap_or(word),
                other => other.raw(),
            })
            .collect()
    }

    fn describe_schema_change(&self, sql: &str, ddl_type: DdlType) -> Result<SchemaChange> {
        let change = inspect::describe(sql, ddl_type)?;
        Ok(change.map_defaults(|default| self.restore_original_text(default)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_identifiers_and_literals() {
        let translator = AccessDialectTranslator::new();
        let sql = translator
            .rewrite(r#"SELECT [Unit Price], "it""s" & Name FROM [Order Details] WHERE d > #2012-01-31#"#)
            .unwrap();
        assert_eq!(
            sql,
            r#"SELECT "UNIT_PRICE", 'it"s' || Name FROM "ORDER_DETAILS" WHERE d > '2012-01-31'"#
        );
    }

    #[test]
    fn test_bare_words_outside_ascii_are_escaped() {
        let translator = AccessDialectTranslator::new();
        let sql = translator.rewrite("SELECT Prix, t.Größe FROM Café t").unwrap();
        assert_eq!(sql, r#"SELECT Prix, t."GR__E" FROM "CAF_" t"#);
    }

    #[test]
    fn test_rewrite_functions() {
        let translator = AccessDialectTranslator::new();
        let sql = translator
            .rewrite("SELECT DISTINCTROW UCase(Name), Len(t.Len), Nz(x, 0) FROM t")
            .unwrap();
        assert_eq!(sql, "SELECT DISTINCT upper(Name), length(t.Len), ifnull(x, 0) FROM t");
    }

    #[test]
    fn test_rewrite_rejects_unterminated_literal() {
        let translator = AccessDialectTranslator::new();
        assert!(translator.rewrite("SELECT 'abc FROM t").is_err());
        assert!(translator.rewrite("SELECT [abc FROM t").is_err());
        assert!(!translator.is_ddl("CREATE TABLE [t (a TEXT)"));
    }

    #[test]
    fn test_workaround_round_trip() {
        let translator = AccessDialectTranslator::new();
        let original = "INSERT INTO t (a, b, c) VALUES (Now(), Date ( ), x.Time())";
        let substituted = translator.substitute_workarounds(original);

        assert_eq!(
            substituted,
            "INSERT INTO t (a, b, c) VALUES (UCA_WA_Now(), UCA_WA_Date ( ), x.Time())"
        );
        assert_eq!(translator.restore_original_text(&substituted), original);

        let engine = translator.rewrite(&substituted).unwrap();
        assert!(engine.contains("(datetime('now', 'localtime'))"));
        assert!(engine.contains("(date('now', 'localtime'))"));
        assert!(!engine.contains("UCA_WA_"));
    }

    #[test]
    fn test_functions_with_arguments_are_not_substituted() {
        let translator = AccessDialectTranslator::new();
        let sql = "SELECT Date(created) FROM t";
        assert_eq!(translator.substitute_workarounds(sql), sql);
    }

    #[test]
    fn test_classify_through_rewrite() {
        let translator = AccessDialectTranslator::new();
        assert!(translator.is_ddl("create table [Order Details] ([ID] COUNTER)"));
        assert_eq!(
            translator.classify_ddl("CREATE TABLE [Order Details] ([ID] COUNTER)"),
            Some(DdlType::CreateTable)
        );
        assert_eq!(
            translator.classify_ddl("ALTER TABLE [Order Details] ADD COLUMN [Due] DATETIME"),
            Some(DdlType::AddColumn)
        );
        assert_eq!(translator.classify_ddl("ALTER TABLE t DROP COLUMN c"), None);
        assert!(!translator.is_ddl("SELECT * FROM [Create]"));
    }

    #[test]
    fn test_describe_restores_default_text() {
        let translator = AccessDialectTranslator::new();
        let sql = translator.substitute_workarounds("CREATE TABLE t (created DATETIME DEFAULT Now())");
        let change = translator
            .describe_schema_change(&sql, DdlType::CreateTable)
            .unwrap();

        let SchemaChange::CreateTable(table) = change else {
            panic!("expected a table definition");
        };
        assert_eq!(table.columns[0].default.as_deref(), Some("Now()"));
    }

    #[test]
    fn test_create_table_end_to_end() {
        let translator = AccessDialectTranslator::new();
        let prepared = translator.substitute_workarounds(
            "CREATE TABLE [Order Details] ([ID] COUNTER PRIMARY KEY, [Unit Price] CURRENCY, [Placed] DATETIME DEFAULT Now())",
        );
        let engine = translator.rewrite(&prepared).unwrap();
        let engine = translator.rewrite_create_table(&engine).unwrap();
        let squashed = engine.split_whitespace().collect::<Vec<_>>().join(" ");

        assert_eq!(
            squashed,
            r#"CREATE TABLE "ORDER_DETAILS" ("ID" INTEGER PRIMARY KEY AUTOINCREMENT , "UNIT_PRICE" NUMERIC, "PLACED" DATETIME DEFAULT (datetime('now', 'localtime')))"#
        );
    }
}
