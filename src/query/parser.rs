//! Parser for the query subset understood by the executor.
//!
//! Supported: an optional `query` keyword with an optional operation name,
//! one selection set, fields with aliases and literal arguments (strings,
//! numbers, booleans, null). Commas and `#` comments are ignored.
//! Selection sets nest at most [`MAX_SELECTION_DEPTH`] deep.

use std::collections::BTreeMap;

use crate::error::QueryError;

/// Deepest selection-set nesting a document may use.
pub const MAX_SELECTION_DEPTH: usize = 256;

/// A parsed query document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub operation_name: Option<String>,
    pub selection: Vec<Selection>,
}

/// One field selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub alias: Option<String>,
    pub name: String,
    pub arguments: BTreeMap<String, serde_json::Value>,
    /// Sub-selection; `None` for scalar fields.
    pub selection: Option<Vec<Selection>>,
}

impl Selection {
    /// Key under which the field appears in the response.
    #[must_use]
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Parses a query document.
pub fn parse(source: &str) -> Result<Document, QueryError> {
    let mut parser = Parser {
        src: source,
        pos: 0,
        depth: 0,
    };
    let document = parser.document()?;
    parser.skip_ignored();
    if parser.pos < source.len() {
        return Err(QueryError::syntax(parser.pos, "unexpected trailing input"));
    }
    Ok(document)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ignored(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\n' | '\r' | ',' | '\u{feff}' => {
                    self.bump();
                }
                '#' => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn expect(&mut self, want: char) -> Result<(), QueryError> {
        self.skip_ignored();
        match self.peek() {
            Some(c) if c == want => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(QueryError::syntax(
                self.pos,
                format!("expected '{want}', found '{c}'"),
            )),
            None => Err(QueryError::syntax(
                self.pos,
                format!("expected '{want}', found end of input"),
            )),
        }
    }

    fn eat(&mut self, want: char) -> bool {
        self.skip_ignored();
        if self.peek() == Some(want) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn name(&mut self) -> Result<&'a str, QueryError> {
        self.skip_ignored();
        let start = self.pos;
        match self.peek() {
            Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
            Some(c) => return Err(QueryError::syntax(start, format!("expected a name, found '{c}'"))),
            None => return Err(QueryError::syntax(start, "expected a name, found end of input")),
        }
        while let Some(c) = self.peek() {
            if c == '_' || c.is_ascii_alphanumeric() {
                self.bump();
            } else {
                break;
            }
        }
        Ok(&self.src[start..self.pos])
    }

    fn document(&mut self) -> Result<Document, QueryError> {
        self.skip_ignored();
        if self.peek() == Some('{') {
            return Ok(Document {
                operation_name: None,
                selection: self.selection_set()?,
            });
        }

        let at = self.pos;
        let keyword = self.name()?;
        match keyword {
            "query" => {}
            "mutation" | "subscription" => {
                return Err(QueryError::UnsupportedOperation {
                    operation: keyword.to_string(),
                });
            }
            _ => return Err(QueryError::syntax(at, format!("unexpected name '{keyword}'"))),
        }

        self.skip_ignored();
        let operation_name = match self.peek() {
            Some(c) if c == '_' || c.is_ascii_alphabetic() => Some(self.name()?.to_string()),
            _ => None,
        };
        self.skip_ignored();
        if self.peek() == Some('(') {
            return Err(QueryError::syntax(self.pos, "variables are not supported"));
        }

        Ok(Document {
            operation_name,
            selection: self.selection_set()?,
        })
    }

    fn selection_set(&mut self) -> Result<Vec<Selection>, QueryError> {
        self.expect('{')?;
        if self.depth == MAX_SELECTION_DEPTH {
            return Err(QueryError::syntax(
                self.pos - 1,
                format!("selection sets nested deeper than {MAX_SELECTION_DEPTH}"),
            ));
        }
        self.depth += 1;
        let fields = self.fields();
        self.depth -= 1;
        fields
    }

    fn fields(&mut self) -> Result<Vec<Selection>, QueryError> {
        let mut fields = Vec::new();
        loop {
            if self.eat('}') {
                break;
            }
            if self.peek().is_none() {
                return Err(QueryError::syntax(self.pos, "unterminated selection set"));
            }
            fields.push(self.field()?);
        }
        if fields.is_empty() {
            return Err(QueryError::syntax(self.pos, "selection set must not be empty"));
        }
        Ok(fields)
    }

    fn field(&mut self) -> Result<Selection, QueryError> {
        self.skip_ignored();
        if self.peek() == Some('.') {
            return Err(QueryError::syntax(self.pos, "fragments are not supported"));
        }
        let first = self.name()?;
        let (alias, name) = if self.eat(':') {
            (Some(first.to_string()), self.name()?.to_string())
        } else {
            (None, first.to_string())
        };

        let mut arguments = BTreeMap::new();
        if self.eat('(') {
            loop {
                if self.eat(')') {
                    break;
                }
                let arg = self.name()?.to_string();
                self.expect(':')?;
                let value = self.value()?;
                if arguments.insert(arg.clone(), value).is_some() {
                    return Err(QueryError::syntax(
                        self.pos,
                        format!("duplicate argument '{arg}'"),
                    ));
                }
            }
        }

        self.skip_ignored();
        if self.peek() == Some('@') {
            return Err(QueryError::syntax(self.pos, "directives are not supported"));
        }
        let selection = if self.peek() == Some('{') {
            Some(self.selection_set()?)
        } else {
            None
        };

        Ok(Selection {
            alias,
            name,
            arguments,
            selection,
        })
    }

    fn value(&mut self) -> Result<serde_json::Value, QueryError> {
        self.skip_ignored();
        let at = self.pos;
        match self.peek() {
            Some('"') => self.string().map(serde_json::Value::String),
            Some(c) if c == '-' || c.is_ascii_digit() => self.number(),
            Some('$') => Err(QueryError::syntax(at, "variables are not supported")),
            Some(c) if c == '_' || c.is_ascii_alphabetic() => match self.name()? {
                "true" => Ok(serde_json::Value::Bool(true)),
                "false" => Ok(serde_json::Value::Bool(false)),
                "null" => Ok(serde_json::Value::Null),
                other => Err(QueryError::syntax(at, format!("unsupported value '{other}'"))),
            },
            Some(c) => Err(QueryError::syntax(at, format!("unexpected '{c}' in value"))),
            None => Err(QueryError::syntax(at, "expected a value, found end of input")),
        }
    }

    fn string(&mut self) -> Result<String, QueryError> {
        let start = self.pos;
        self.bump();
        let mut out = String::new();
        loop {
            let at = self.pos;
            match self.bump() {
                None | Some('\n' | '\r') => {
                    return Err(QueryError::syntax(start, "unterminated string"));
                }
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('"') => out.push('"'),
                    Some('\\') => out.push('\\'),
                    Some('/') => out.push('/'),
                    Some('b') => out.push('\u{8}'),
                    Some('f') => out.push('\u{c}'),
                    Some('n') => out.push('\n'),
                    Some('r') => out.push('\r'),
                    Some('t') => out.push('\t'),
                    Some('u') => out.push(self.unicode_escape(at)?),
                    _ => return Err(QueryError::syntax(at, "invalid escape sequence")),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn unicode_escape(&mut self, at: usize) -> Result<char, QueryError> {
        let end = self.pos + 4;
        let hex = self
            .src
            .get(self.pos..end)
            .ok_or_else(|| QueryError::syntax(at, "truncated unicode escape"))?;
        let code = u32::from_str_radix(hex, 16)
            .map_err(|_| QueryError::syntax(at, "invalid unicode escape"))?;
        self.pos = end;
        char::from_u32(code).ok_or_else(|| QueryError::syntax(at, "invalid unicode scalar"))
    }

    fn number(&mut self) -> Result<serde_json::Value, QueryError> {
        let start = self.pos;
        let mut is_float = false;
        if self.peek() == Some('-') {
            self.bump();
        }
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {}
                '.' | 'e' | 'E' => is_float = true,
                '+' | '-' if is_float => {}
                _ => break,
            }
            self.bump();
        }
        let text = &self.src[start..self.pos];
        let parsed = if is_float {
            text.parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
        } else {
            text.parse::<i64>().ok().map(serde_json::Value::from)
        };
        parsed.ok_or_else(|| QueryError::syntax(start, format!("invalid number '{text}'")))
    }
}
