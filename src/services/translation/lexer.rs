// Statement lexer
//
// Splits SQL text into lexemes that keep their exact source text, so a
// rewrite can change some lexemes and copy the rest through untouched.
// Access and the engine disagree on what double quotes mean, hence the mode.

/// Which quoting rules apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexMode {
    /// Access: `"…"` is a string literal, `#…#` is a date literal
    Foreign,
    /// SQLite: `"…"` is an identifier
    Engine,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lexeme<'a> {
    /// Unquoted identifier or keyword
    Word(&'a str),
    /// Delimited identifier: `[…]`, `` `…` `` or (engine mode) `"…"`
    Identifier { raw: &'a str, name: String },
    /// String literal including its delimiters
    Str(&'a str),
    /// `#…#` date literal including the hashes
    Date(&'a str),
    Number(&'a str),
    /// Whitespace or a comment
    Space(&'a str),
    Symbol(&'a str),
}

impl<'a> Lexeme<'a> {
    pub fn raw(&self) -> &'a str {
        match self {
            Lexeme::Word(raw)
            | Lexeme::Identifier { raw, .. }
            | Lexeme::Str(raw)
            | Lexeme::Date(raw)
            | Lexeme::Number(raw)
            | Lexeme::Space(raw)
            | Lexeme::Symbol(raw) => raw,
        }
    }

    pub fn is_trivia(&self) -> bool {
        matches!(self, Lexeme::Space(_))
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Lexeme::Word(word) if word.eq_ignore_ascii_case(keyword))
    }

    pub fn is_symbol(&self, symbol: &str) -> bool {
        matches!(self, Lexeme::Symbol(s) if *s == symbol)
    }

    /// Name carried by an identifier lexeme, quoted or not
    pub fn identifier(&self) -> Option<String> {
        match self {
            Lexeme::Word(word) => Some(word.to_string()),
            Lexeme::Identifier { name, .. } => Some(name.clone()),
            _ => None,
        }
    }

    /// Whether a delimited lexeme has its closing delimiter
    pub fn is_terminated(&self) -> bool {
        match self {
            Lexeme::Str(raw) | Lexeme::Identifier { raw, .. } => match raw.chars().next() {
                Some('[') => raw.len() >= 2 && raw.ends_with(']'),
                Some(quote) => closing_quote(raw, quote) == Some(raw.len()),
                None => false,
            },
            _ => true,
        }
    }
}

pub fn lex(sql: &str, mode: LexMode) -> Vec<Lexeme<'_>> {
    let mut lexemes = Vec::new();
    let mut pos = 0;

    while let Some(ch) = sql[pos..].chars().next() {
        let rest = &sql[pos..];
        let (len, kind) = if ch.is_whitespace() {
            (span(rest, char::is_whitespace), Kind::Space)
        } else if rest.starts_with("--") {
            (rest.find('\n').unwrap_or(rest.len()), Kind::Space)
        } else if rest.starts_with("/*") {
            (rest[2..].find("*/").map_or(rest.len(), |i| i + 4), Kind::Space)
        } else if ch == '\'' || (ch == '"' && mode == LexMode::Foreign) {
            (quoted_len(rest, ch), Kind::Str)
        } else if ch == '"' || ch == '`' {
            (quoted_len(rest, ch), Kind::Delimited)
        } else if ch == '[' {
            (rest[1..].find(']').map_or(rest.len(), |i| i + 2), Kind::Delimited)
        } else if let Some(len) = (ch == '#' && mode == LexMode::Foreign)
            .then(|| date_len(rest))
            .flatten()
        {
            (len, Kind::Date)
        } else if ch.is_ascii_digit() || (ch == '.' && rest[1..].starts_with(|c: char| c.is_ascii_digit())) {
            (span(rest, |c| c.is_ascii_alphanumeric() || c == '.'), Kind::Number)
        } else if ch.is_alphanumeric() || ch == '_' {
            (span(rest, |c| c.is_alphanumeric() || c == '_' || c == '$'), Kind::Word)
        } else {
            (ch.len_utf8(), Kind::Symbol)
        };

        let raw = &rest[..len];
        lexemes.push(match kind {
            Kind::Space => Lexeme::Space(raw),
            Kind::Str => Lexeme::Str(raw),
            Kind::Delimited => Lexeme::Identifier {
                raw,
                name: unquote(raw),
            },
            Kind::Date => Lexeme::Date(raw),
            Kind::Number => Lexeme::Number(raw),
            Kind::Word => Lexeme::Word(raw),
            Kind::Symbol => Lexeme::Symbol(raw),
        });
        pos += len;
    }

    lexemes
}

enum Kind {
    Space,
    Str,
    Delimited,
    Date,
    Number,
    Word,
    Symbol,
}

/// Byte length of the leading run of characters matching `pred`
fn span(rest: &str, pred: impl Fn(char) -> bool) -> usize {
    rest.char_indices()
        .find(|&(_, c)| !pred(c))
        .map_or(rest.len(), |(i, _)| i)
}

/// Length of a quoted run where the quote is escaped by doubling it
fn quoted_len(rest: &str, quote: char) -> usize {
    closing_quote(rest, quote).unwrap_or(rest.len())
}

/// End of the quoted run opening `rest`, if its closing quote is present
fn closing_quote(rest: &str, quote: char) -> Option<usize> {
    let mut chars = rest.char_indices().skip(1).peekable();
    while let Some((i, c)) = chars.next() {
        if c == quote {
            if matches!(chars.peek(), Some(&(_, next)) if next == quote) {
                chars.next();
            } else {
                return Some(i + c.len_utf8());
            }
        }
    }
    None
}

/// `#…#` on one line with non-blank content
fn date_len(rest: &str) -> Option<usize> {
    let close = rest[1..].find('#')?;
    let content = &rest[1..1 + close];
    if content.is_empty() || content.contains('\n') || content.starts_with(char::is_whitespace) {
        return None;
    }
    Some(close + 2)
}

/// Content of a delimited lexeme with doubled quotes collapsed
pub fn unquote(raw: &str) -> String {
    let mut chars = raw.chars();
    let (open, close) = match chars.next() {
        Some('[') => ('[', ']'),
        Some(c) => (c, c),
        None => return String::new(),
    };
    let inner = raw[open.len_utf8()..].strip_suffix(close).unwrap_or(&raw[open.len_utf8()..]);
    if open == '[' {
        inner.to_string()
    } else {
        let doubled: String = [close, close].iter().collect();
        inner.replace(&doubled, &close.to_string())
    }
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn quote_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Indexes of the non-trivia lexemes
pub fn significant(lexemes: &[Lexeme<'_>]) -> Vec<usize> {
    (0..lexemes.len()).filter(|&i| !lexemes[i].is_trivia()).collect()
}

/// Index of the parenthesis closing the one at `open`
pub fn matching_paren(lexemes: &[Lexeme<'_>], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, lexeme) in lexemes.iter().enumerate().skip(open) {
        if lexeme.is_symbol("(") {
            depth += 1;
        } else if lexeme.is_symbol(")") {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Split lexemes on commas outside parentheses
pub fn split_top_level<'l, 'a>(lexemes: &'l [Lexeme<'a>]) -> Vec<&'l [Lexeme<'a>]> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, lexeme) in lexemes.iter().enumerate() {
        if lexeme.is_symbol("(") {
            depth += 1;
        } else if lexeme.is_symbol(")") {
            depth -= 1;
        } else if lexeme.is_symbol(",") && depth == 0 {
            parts.push(&lexemes[start..i]);
            start = i + 1;
        }
    }
    parts.push(&lexemes[start..]);
    parts
}

pub fn concat(lexemes: &[Lexeme<'_>]) -> String {
    lexemes.iter().map(Lexeme::raw).collect()
}

/// Whether anything but trivia follows the first `;` outside literals
pub fn has_trailing_statement(sql: &str, mode: LexMode) -> bool {
    lex(sql, mode)
        .iter()
        .filter(|lexeme| !lexeme.is_trivia())
        .skip_while(|lexeme| !lexeme.is_symbol(";"))
        .any(|lexeme| !lexeme.is_symbol(";"))
}

/// Split a script into statements on `;` outside literals and comments
pub fn split_statements(script: &str) -> Vec<String> {
    let lexemes = lex(script, LexMode::Foreign);
    lexemes
        .split(|lexeme| lexeme.is_symbol(";"))
        .filter(|statement| statement.iter().any(|lexeme| !lexeme.is_trivia()))
        .map(|statement| concat(statement).trim().to_string())
        .collect()
}
