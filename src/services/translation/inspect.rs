// Statement inspection
//
// Classification runs over engine-dialect text with the sqlparser tokenizer,
// so keywords are recognised by the same rules the engine grammar uses.
// Engine-dialect DDL is described from the parsed statement. Foreign text
// keeps names the engine grammar would reject, so it is described from
// lexemes instead.

use anyhow::{anyhow, bail, Context, Result};
use sqlparser::ast::{AlterTableOperation, ColumnDef, ColumnOption, DataType, ObjectName, ObjectNamePart, ObjectType, RenameTableNameKind, Statement};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::keywords::Keyword;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};

use super::lexer::{concat, lex, matching_paren, significant, split_top_level, LexMode, Lexeme};
use super::{ColumnDefinition, SchemaChange, TableDefinition};
use crate::models::{canonical_type, DdlType};

/// Keywords that open a table constraint inside a column list
const TABLE_CONSTRAINTS: &[&str] = &["CONSTRAINT", "PRIMARY", "UNIQUE", "FOREIGN", "CHECK"];

/// Keywords that may follow a column name when the type is omitted
const COLUMN_CONSTRAINTS: &[&str] = &[
    "NOT", "NULL", "PRIMARY", "UNIQUE", "CHECK", "REFERENCES", "CONSTRAINT", "COLLATE", "DEFAULT", "GENERATED", "AS",
];

struct TokenCursor {
    tokens: Vec<Token>,
    pos: usize,
}

impl TokenCursor {
    fn new(sql: &str) -> Option<Self> {
        let dialect = SQLiteDialect {};
        let tokens = Tokenizer::new(&dialect, sql).tokenize().ok()?;
        Some(Self {
            tokens: tokens
                .into_iter()
                .filter(|token| !matches!(token, Token::Whitespace(_)))
                .collect(),
            pos: 0,
        })
    }

    fn peek_keyword(&self, keywords: &[Keyword]) -> bool {
        matches!(
            self.tokens.get(self.pos),
            Some(Token::Word(word)) if word.quote_style.is_none() && keywords.contains(&word.keyword)
        )
    }

    fn keyword(&mut self, keyword: Keyword) -> bool {
        let found = self.peek_keyword(&[keyword]);
        if found {
            self.pos += 1;
        }
        found
    }

    /// Consume a run of keywords, or nothing
    fn keywords(&mut self, keywords: &[Keyword]) -> bool {
        let start = self.pos;
        if keywords.iter().all(|keyword| self.keyword(*keyword)) {
            true
        } else {
            self.pos = start;
            false
        }
    }

    fn token(&mut self, token: &Token) -> bool {
        let found = self.tokens.get(self.pos) == Some(token);
        if found {
            self.pos += 1;
        }
        found
    }

    /// Possibly qualified object name
    fn object_name(&mut self) -> bool {
        if !matches!(self.tokens.get(self.pos), Some(Token::Word(_))) {
            return false;
        }
        self.pos += 1;
        while self.token(&Token::Period) {
            if !matches!(self.tokens.get(self.pos), Some(Token::Word(_))) {
                return false;
            }
            self.pos += 1;
        }
        true
    }
}

/// Whether engine-dialect text is a schema-mutating statement
pub fn is_ddl(engine_sql: &str) -> bool {
    TokenCursor::new(engine_sql)
        .is_some_and(|cursor| cursor.peek_keyword(&[Keyword::CREATE, Keyword::ALTER, Keyword::DROP]))
}

/// DDL subtype of engine-dialect text, if it is one of the recognised forms
pub fn classify(engine_sql: &str) -> Option<DdlType> {
    let mut cursor = TokenCursor::new(engine_sql)?;

    if cursor.keyword(Keyword::CREATE) {
        cursor.keyword(Keyword::TEMPORARY);
        if cursor.keyword(Keyword::TABLE) {
            cursor.keywords(&[Keyword::IF, Keyword::NOT, Keyword::EXISTS]);
            if !cursor.object_name() {
                return None;
            }
            if cursor.keyword(Keyword::AS) {
                return Some(DdlType::CreateTableAsSelect);
            }
            return cursor.token(&Token::LParen).then_some(DdlType::CreateTable);
        }
        if cursor.keyword(Keyword::VIEW) {
            return Some(DdlType::CreateView);
        }
        cursor.keyword(Keyword::UNIQUE);
        return cursor.keyword(Keyword::INDEX).then_some(DdlType::CreateIndex);
    }

    if cursor.keyword(Keyword::DROP) {
        if cursor.keyword(Keyword::TABLE) {
            return Some(DdlType::DropTable);
        }
        if cursor.keyword(Keyword::VIEW) {
            return Some(DdlType::DropView);
        }
        return cursor.keyword(Keyword::INDEX).then_some(DdlType::DropIndex);
    }

    if cursor.keyword(Keyword::ALTER) && cursor.keyword(Keyword::TABLE) && cursor.object_name() {
        if cursor.keywords(&[Keyword::RENAME, Keyword::TO]) {
            return Some(DdlType::AlterRename);
        }
        if cursor.keyword(Keyword::ADD) {
            if cursor.peek_keyword(&[
                Keyword::CONSTRAINT,
                Keyword::PRIMARY,
                Keyword::FOREIGN,
                Keyword::UNIQUE,
                Keyword::CHECK,
            ]) {
                return None;
            }
            cursor.keyword(Keyword::COLUMN);
            return cursor.object_name().then_some(DdlType::AddColumn);
        }
    }

    None
}

/// Sanitized engine identifier for a foreign name
pub fn escape_identifier(name: &str) -> String {
    let mut escaped: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    if escaped.starts_with(|c: char| c.is_ascii_digit()) {
        escaped.insert(0, '_');
    }
    escaped
}

/// Walks the significant lexemes of one statement
struct Scan<'l, 'a> {
    lexemes: &'l [Lexeme<'a>],
    sig: Vec<usize>,
    pos: usize,
}

impl<'l, 'a> Scan<'l, 'a> {
    fn new(lexemes: &'l [Lexeme<'a>]) -> Self {
        Self {
            lexemes,
            sig: significant(lexemes),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<&'l Lexeme<'a>> {
        self.sig.get(self.pos).map(|&i| &self.lexemes[i])
    }

    /// Lexeme index of the current position
    fn index(&self) -> Option<usize> {
        self.sig.get(self.pos).copied()
    }

    fn keyword(&mut self, keyword: &str) -> bool {
        let found = self.peek().is_some_and(|lexeme| lexeme.is_keyword(keyword));
        if found {
            self.pos += 1;
        }
        found
    }

    fn expect(&mut self, keyword: &str) -> Result<()> {
        if self.keyword(keyword) {
            Ok(())
        } else {
            Err(anyhow!("Expected {} in statement", keyword))
        }
    }

    fn keywords(&mut self, keywords: &[&str]) -> bool {
        let start = self.pos;
        if keywords.iter().all(|keyword| self.keyword(keyword)) {
            true
        } else {
            self.pos = start;
            false
        }
    }

    /// Last part of a possibly qualified name
    fn name(&mut self) -> Result<String> {
        let mut name = self
            .peek()
            .and_then(Lexeme::identifier)
            .ok_or_else(|| anyhow!("Expected an object name"))?;
        self.pos += 1;
        while self.peek().is_some_and(|lexeme| lexeme.is_symbol(".")) {
            self.pos += 1;
            name = self
                .peek()
                .and_then(Lexeme::identifier)
                .ok_or_else(|| anyhow!("Expected a name after '.'"))?;
            self.pos += 1;
        }
        Ok(name)
    }

    fn create_prefix(&mut self, object: &str) -> Result<String> {
        self.expect("CREATE")?;
        let _ = self.keyword("TEMPORARY") || self.keyword("TEMP");
        self.expect(object)?;
        self.keywords(&["IF", "NOT", "EXISTS"]);
        self.name()
    }

    fn drop_prefix(&mut self, object: &str) -> Result<String> {
        self.expect("DROP")?;
        self.expect(object)?;
        self.keywords(&["IF", "EXISTS"]);
        self.name()
    }
}

/// Extract what a classified foreign-dialect DDL statement does to the schema
pub fn describe(sql: &str, ddl_type: DdlType) -> Result<SchemaChange> {
    let all = lex(sql, LexMode::Foreign);
    let end = all.iter().position(|lexeme| lexeme.is_symbol(";")).unwrap_or(all.len());
    let lexemes = &all[..end];
    let mut scan = Scan::new(lexemes);

    let change = match ddl_type {
        DdlType::CreateTable => {
            let name = scan.create_prefix("TABLE")?;
            let open = scan
                .index()
                .filter(|&i| lexemes[i].is_symbol("("))
                .ok_or_else(|| anyhow!("Expected a column list for table {}", name))?;
            let close = matching_paren(lexemes, open)
                .ok_or_else(|| anyhow!("Unbalanced parentheses in column list of {}", name))?;
            let columns = split_top_level(&lexemes[open + 1..close])
                .into_iter()
                .filter_map(column_definition)
                .collect();
            SchemaChange::CreateTable(TableDefinition { name, columns })
        }
        DdlType::CreateTableAsSelect => SchemaChange::CreateTableAsSelect {
            table: scan.create_prefix("TABLE")?,
        },
        DdlType::CreateView => SchemaChange::CreateView {
            view: scan.create_prefix("VIEW")?,
        },
        DdlType::DropTable => SchemaChange::DropTable {
            table: scan.drop_prefix("TABLE")?,
        },
        DdlType::DropView => SchemaChange::DropView {
            view: scan.drop_prefix("VIEW")?,
        },
        DdlType::AlterRename => {
            scan.expect("ALTER")?;
            scan.expect("TABLE")?;
            let from = scan.name()?;
            scan.expect("RENAME")?;
            scan.expect("TO")?;
            SchemaChange::RenameTable {
                from,
                to: scan.name()?,
            }
        }
        DdlType::AddColumn => {
            scan.expect("ALTER")?;
            scan.expect("TABLE")?;
            let table = scan.name()?;
            scan.expect("ADD")?;
            scan.keyword("COLUMN");
            let start = scan
                .index()
                .ok_or_else(|| anyhow!("Expected a column definition for {}", table))?;
            let column = column_definition(&lexemes[start..])
                .ok_or_else(|| anyhow!("Expected a column definition for {}", table))?;
            SchemaChange::AddColumn { table, column }
        }
        DdlType::CreateIndex | DdlType::DropIndex => SchemaChange::Untracked,
    };

    Ok(change)
}

/// Extract what a classified engine-dialect DDL statement does to the schema
pub fn describe_engine(engine_sql: &str, ddl_type: DdlType) -> Result<SchemaChange> {
    if matches!(ddl_type, DdlType::CreateIndex | DdlType::DropIndex) {
        return Ok(SchemaChange::Untracked);
    }

    let statements = Parser::parse_sql(&SQLiteDialect {}, engine_sql).context("Failed to parse DDL statement")?;
    let [statement] = statements.as_slice() else {
        bail!("Expected one DDL statement, found {}", statements.len());
    };

    let change = match (ddl_type, statement) {
        (DdlType::CreateTable, Statement::CreateTable(create)) => SchemaChange::CreateTable(TableDefinition {
            name: object_name(&create.name)?,
            columns: create.columns.iter().map(column_from_def).collect(),
        }),
        (DdlType::CreateTableAsSelect, Statement::CreateTable(create)) => SchemaChange::CreateTableAsSelect {
            table: object_name(&create.name)?,
        },
        (DdlType::CreateView, Statement::CreateView(view)) => SchemaChange::CreateView {
            view: object_name(&view.name)?,
        },
        (DdlType::DropTable | DdlType::DropView, Statement::Drop { object_type, names, .. }) => {
            let name = names.first().ok_or_else(|| anyhow!("Expected an object name"))?;
            let name = object_name(name)?;
            match object_type {
                ObjectType::View => SchemaChange::DropView { view: name },
                _ => SchemaChange::DropTable { table: name },
            }
        }
        (DdlType::AlterRename, Statement::AlterTable(alter)) => match alter.operations.as_slice() {
            [AlterTableOperation::RenameTable {
                table_name: RenameTableNameKind::To(to) | RenameTableNameKind::As(to),
            }] => SchemaChange::RenameTable {
                from: object_name(&alter.name)?,
                to: object_name(to)?,
            },
            _ => bail!("Expected a single RENAME TO operation"),
        },
        (DdlType::AddColumn, Statement::AlterTable(alter)) => match alter.operations.as_slice() {
            [AlterTableOperation::AddColumn { column_def, .. }] => SchemaChange::AddColumn {
                table: object_name(&alter.name)?,
                column: column_from_def(column_def),
            },
            _ => bail!("Expected a single ADD COLUMN operation"),
        },
        (ddl_type, _) => bail!("Statement does not have the shape of {}", ddl_type),
    };

    Ok(change)
}

/// Last part of a possibly qualified object name
fn object_name(name: &ObjectName) -> Result<String> {
    name.0
        .last()
        .and_then(ObjectNamePart::as_ident)
        .map(|ident| ident.value.clone())
        .ok_or_else(|| anyhow!("Unsupported object name {}", name))
}

fn column_from_def(column: &ColumnDef) -> ColumnDefinition {
    ColumnDefinition {
        name: column.name.value.clone(),
        type_name: canonical_type(&type_base_name(&column.data_type)),
        default: column.options.iter().find_map(|def| match &def.option {
            ColumnOption::Default(expr) => Some(expr.to_string()),
            _ => None,
        }),
    }
}

/// Upper-cased type name without its arguments, empty when unspecified
pub(crate) fn type_base_name(data_type: &DataType) -> String {
    let rendered = match data_type {
        DataType::Custom(name, _) => name.to_string(),
        other => other.to_string(),
    };
    rendered
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_uppercase()
}

/// Parse one element of a column list; table constraints yield nothing
fn column_definition(element: &[Lexeme<'_>]) -> Option<ColumnDefinition> {
    let sig = significant(element);
    let first = &element[*sig.first()?];
    if TABLE_CONSTRAINTS.iter().any(|keyword| first.is_keyword(keyword)) {
        return None;
    }
    let name = first.identifier()?;

    let type_name = sig
        .get(1)
        .map(|&i| &element[i])
        .filter(|lexeme| matches!(lexeme, Lexeme::Word(_)))
        .filter(|lexeme| !COLUMN_CONSTRAINTS.iter().any(|keyword| lexeme.is_keyword(keyword)))
        .map(|lexeme| canonical_type(lexeme.raw()))
        .unwrap_or_default();

    Some(ColumnDefinition {
        name,
        type_name,
        default: default_expression(element, &sig),
    })
}

/// Text of the DEFAULT clause, up to the next column constraint
fn default_expression(element: &[Lexeme<'_>], sig: &[usize]) -> Option<String> {
    let at = sig.iter().position(|&i| element[i].is_keyword("DEFAULT"))?;
    let start = *sig.get(at + 1)?;

    let mut depth = 0i32;
    let mut end = element.len();
    for (i, lexeme) in element.iter().enumerate().skip(start) {
        if lexeme.is_symbol("(") {
            depth += 1;
        } else if lexeme.is_symbol(")") {
            depth -= 1;
        } else if i > start
            && depth == 0
            && ["NOT", "PRIMARY", "UNIQUE", "CHECK", "REFERENCES", "CONSTRAINT", "COLLATE"]
                .iter()
                .any(|keyword| lexeme.is_keyword(keyword))
        {
            end = i;
            break;
        }
    }

    let text = concat(&element[start..end]).trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// Target table of an INSERT or REPLACE statement in engine dialect
pub fn insert_target(engine_sql: &str) -> Option<String> {
    let lexemes = lex(engine_sql, LexMode::Engine);
    let mut scan = Scan::new(&lexemes);
    if scan.keyword("INSERT") {
        if scan.keyword("OR") {
            scan.pos += 1;
        }
    } else if !scan.keyword("REPLACE") {
        return None;
    }
    if !scan.keyword("INTO") {
        return None;
    }
    scan.name().ok()
}
