// searchplan-core/src/memory/raw.rs
//! Minimal SQL expression support for raw fragments run in memory.
//!
//! ```text
//! expr    := and ( OR and )*
//! and     := not ( AND not )*
//! not     := NOT not | primary
//! primary := "(" expr ")"
//!          | operand ( cmp operand
//!                    | [NOT] (LIKE | ILIKE) operand
//!                    | [NOT] IN "(" operand ("," operand)* ")"
//!                    | IS [NOT] NULL )?
//! operand := column | number | 'string' | ? | NULL | TRUE | FALSE | count(...)
//! cmp     := = | == | != | <> | < | <= | > | >=
//! ```
//!
//! `?` placeholders take the expression bindings in order; the number of
//! placeholders must equal the number of bindings. Aggregates other than
//! `count` are not supported; `count(...)` reads the `count` column that
//! grouping produces. Parentheses and `NOT` nest at most
//! [`MAX_NESTING`] levels deep.

use serde_json::{Number, Value};

use crate::cursor::Direction;
use crate::error::{Result, SearchError};
use crate::value_utils::{get_nested_value, truthy};

use super::matching::{in_list, matcher_for};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(Number),
    Str(String),
    Placeholder,
    Op(String),
    LParen,
    RParen,
    Comma,
    Star,
}

/// Deepest allowed run of nested parentheses / `NOT`
pub const MAX_NESTING: usize = 64;

fn invalid(sql: &str, reason: impl std::fmt::Display) -> SearchError {
    SearchError::InvalidQuery(format!("Cannot evaluate raw expression '{}': {}", sql, reason))
}

fn tokenize(sql: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '?' => {
                tokens.push(Token::Placeholder);
                i += 1;
            }
            '\'' | '"' => {
                let quote = ch;
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(invalid(sql, "unterminated string")),
                        Some(&c) if c == quote && chars.get(i + 1) == Some(&quote) => {
                            text.push(quote);
                            i += 2;
                        }
                        Some(&c) if c == quote => {
                            i += 1;
                            break;
                        }
                        Some(&c) => {
                            text.push(c);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(text));
            }
            '`' => {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&c| c == '`')
                    .map(|p| start + p)
                    .ok_or_else(|| invalid(sql, "unterminated identifier"))?;
                tokens.push(Token::Ident(chars[start..end].iter().collect()));
                i = end + 1;
            }
            c if c.is_ascii_digit()
                || (c == '-' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())
                    && !matches!(tokens.last(), Some(Token::Ident(_) | Token::Number(_) | Token::Str(_) | Token::RParen | Token::Placeholder))) =>
            {
                let start = i;
                i += 1;
                while chars.get(i).is_some_and(|c| c.is_ascii_digit() || *c == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number = text
                    .parse::<i64>()
                    .map(Number::from)
                    .ok()
                    .or_else(|| text.parse::<f64>().ok().and_then(Number::from_f64))
                    .ok_or_else(|| invalid(sql, format!("bad number '{}'", text)))?;
                tokens.push(Token::Number(number));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while chars
                    .get(i)
                    .is_some_and(|c| c.is_alphanumeric() || *c == '_' || *c == '.')
                {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            '=' | '!' | '<' | '>' => {
                let next = chars.get(i + 1).copied();
                let op = match (ch, next) {
                    ('=', Some('=')) | ('!', Some('=')) | ('<', Some('=')) | ('>', Some('='))
                    | ('<', Some('>')) => {
                        i += 2;
                        format!("{}{}", ch, next.unwrap_or_default())
                    }
                    ('!', _) => return Err(invalid(sql, "unexpected '!'")),
                    _ => {
                        i += 1;
                        ch.to_string()
                    }
                };
                tokens.push(Token::Op(op));
            }
            other => return Err(invalid(sql, format!("unexpected character '{}'", other))),
        }
    }
    Ok(tokens)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(String),
    Literal(Value),
}

impl Operand {
    fn resolve<'a>(&'a self, row: &'a Value) -> Option<&'a Value> {
        match self {
            Operand::Column(name) => get_nested_value(row, name),
            Operand::Literal(value) => Some(value),
        }
    }
}

/// Parsed boolean expression over one row
#[derive(Debug, Clone, PartialEq)]
pub enum RawPredicate {
    And(Box<RawPredicate>, Box<RawPredicate>),
    Or(Box<RawPredicate>, Box<RawPredicate>),
    Not(Box<RawPredicate>),
    Compare { left: Operand, op: String, right: Operand },
    In { left: Operand, items: Vec<Operand>, negated: bool },
    Null { operand: Operand, negated: bool },
    Truthy(Operand),
}

impl RawPredicate {
    pub fn parse(sql: &str, bindings: &[Value]) -> Result<RawPredicate> {
        let tokens = tokenize(sql)?;
        let mut parser = Parser {
            sql,
            tokens,
            pos: 0,
            bindings,
            next_binding: 0,
            depth: 0,
        };
        let predicate = parser.expr()?;
        if parser.pos < parser.tokens.len() {
            return Err(invalid(sql, format!("unexpected {:?}", parser.tokens[parser.pos])));
        }
        if parser.next_binding != bindings.len() {
            return Err(invalid(
                sql,
                format!("{} placeholders for {} bindings", parser.next_binding, bindings.len()),
            ));
        }
        // comparison operators are checked once, not per row
        predicate.validate()?;
        Ok(predicate)
    }

    fn validate(&self) -> Result<()> {
        match self {
            RawPredicate::And(a, b) | RawPredicate::Or(a, b) => {
                a.validate()?;
                b.validate()
            }
            RawPredicate::Not(inner) => inner.validate(),
            RawPredicate::Compare { op, .. } => matcher_for(op).map(|_| ()),
            _ => Ok(()),
        }
    }

    pub fn eval(&self, row: &Value) -> Result<bool> {
        Ok(match self {
            RawPredicate::And(a, b) => a.eval(row)? && b.eval(row)?,
            RawPredicate::Or(a, b) => a.eval(row)? || b.eval(row)?,
            RawPredicate::Not(inner) => !inner.eval(row)?,
            RawPredicate::Compare { left, op, right } => match right.resolve(row) {
                Some(expected) => matcher_for(op)?.matches(left.resolve(row), expected)?,
                None => false,
            },
            RawPredicate::In { left, items, negated } => {
                let actual = left.resolve(row).filter(|v| !v.is_null());
                let values: Vec<Value> = items
                    .iter()
                    .filter_map(|item| item.resolve(row).cloned())
                    .collect();
                match actual {
                    None => false,
                    Some(_) => in_list(actual, &values) != *negated,
                }
            }
            RawPredicate::Null { operand, negated } => {
                let is_null = operand.resolve(row).map_or(true, Value::is_null);
                is_null != *negated
            }
            RawPredicate::Truthy(operand) => operand.resolve(row).is_some_and(truthy),
        })
    }
}

struct Parser<'a> {
    sql: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    bindings: &'a [Value],
    next_binding: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(word)) if word.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.peek() {
            Some(token) if *token == expected => {
                self.pos += 1;
                Ok(())
            }
            other => Err(invalid(self.sql, format!("expected {:?}, found {:?}", expected, other))),
        }
    }

    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(invalid(self.sql, format!("nested deeper than {} levels", MAX_NESTING)));
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<RawPredicate> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("or") {
            let right = self.and_expr()?;
            left = RawPredicate::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<RawPredicate> {
        let mut left = self.not_expr()?;
        while self.eat_keyword("and") {
            let right = self.not_expr()?;
            left = RawPredicate::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<RawPredicate> {
        if self.eat_keyword("not") {
            self.descend()?;
            let inner = self.not_expr()?;
            self.depth -= 1;
            return Ok(RawPredicate::Not(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<RawPredicate> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            self.descend()?;
            let inner = self.expr()?;
            self.expect(Token::RParen)?;
            self.depth -= 1;
            return Ok(inner);
        }

        let left = self.operand()?;

        if let Some(Token::Op(op)) = self.peek() {
            let op = op.clone();
            self.pos += 1;
            let right = self.operand()?;
            return Ok(RawPredicate::Compare { left, op, right });
        }

        if self.eat_keyword("is") {
            let negated = self.eat_keyword("not");
            if !self.eat_keyword("null") {
                return Err(invalid(self.sql, "expected NULL after IS"));
            }
            return Ok(RawPredicate::Null { operand: left, negated });
        }

        let negated = self.eat_keyword("not");
        let like = match self.peek() {
            Some(Token::Ident(word))
                if word.eq_ignore_ascii_case("like") || word.eq_ignore_ascii_case("ilike") =>
            {
                Some(word.to_lowercase())
            }
            _ => None,
        };
        if let Some(word) = like {
            self.pos += 1;
            let op = if negated { format!("not {}", word) } else { word };
            let right = self.operand()?;
            return Ok(RawPredicate::Compare { left, op, right });
        }
        if self.eat_keyword("in") {
            self.expect(Token::LParen)?;
            let mut items = vec![self.operand()?];
            while self.peek() == Some(&Token::Comma) {
                self.pos += 1;
                items.push(self.operand()?);
            }
            self.expect(Token::RParen)?;
            return Ok(RawPredicate::In { left, items, negated });
        }
        if negated {
            return Err(invalid(self.sql, "expected LIKE or IN after NOT"));
        }

        Ok(RawPredicate::Truthy(left))
    }

    fn operand(&mut self) -> Result<Operand> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| invalid(self.sql, "unexpected end of expression"))?;
        self.pos += 1;

        match token {
            Token::Number(n) => Ok(Operand::Literal(Value::Number(n))),
            Token::Str(s) => Ok(Operand::Literal(Value::String(s))),
            Token::Placeholder => {
                let value = self
                    .bindings
                    .get(self.next_binding)
                    .cloned()
                    .ok_or_else(|| invalid(self.sql, "more placeholders than bindings"))?;
                self.next_binding += 1;
                Ok(Operand::Literal(value))
            }
            Token::Ident(word) => match word.to_lowercase().as_str() {
                "null" => Ok(Operand::Literal(Value::Null)),
                "true" => Ok(Operand::Literal(Value::Bool(true))),
                "false" => Ok(Operand::Literal(Value::Bool(false))),
                lower if self.peek() == Some(&Token::LParen) => {
                    if lower != "count" {
                        return Err(invalid(self.sql, format!("unsupported function '{}'", word)));
                    }
                    self.skip_call_args()?;
                    Ok(Operand::Column("count".to_string()))
                }
                _ => Ok(Operand::Column(word)),
            },
            other => Err(invalid(self.sql, format!("unexpected {:?}", other))),
        }
    }

    fn skip_call_args(&mut self) -> Result<()> {
        self.expect(Token::LParen)?;
        let mut depth = 1;
        while depth > 0 {
            match self.tokens.get(self.pos) {
                Some(Token::LParen) => depth += 1,
                Some(Token::RParen) => depth -= 1,
                Some(_) => {}
                None => return Err(invalid(self.sql, "unbalanced parentheses")),
            }
            self.pos += 1;
        }
        Ok(())
    }
}

/// Parse `col [asc|desc], col2 [asc|desc]`
pub fn parse_order_list(sql: &str) -> Result<Vec<(String, Direction)>> {
    let mut keys = Vec::new();
    for part in sql.split(',') {
        let words: Vec<&str> = part.split_whitespace().collect();
        let (column, direction) = match words.as_slice() {
            [column] => (*column, Direction::Asc),
            [column, dir] => (
                *column,
                Direction::parse(dir).ok_or_else(|| invalid(sql, format!("bad direction '{}'", dir)))?,
            ),
            _ => return Err(invalid(sql, format!("cannot sort by '{}'", part.trim()))),
        };
        keys.push((column_name(sql, column)?, direction));
    }
    Ok(keys)
}

/// Parse a comma-separated column list
pub fn parse_column_list(sql: &str) -> Result<Vec<String>> {
    sql.split(',').map(|part| column_name(sql, part.trim())).collect()
}

fn column_name(sql: &str, word: &str) -> Result<String> {
    let name = word.trim_matches('`');
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.');
    if !valid {
        return Err(invalid(sql, format!("unsupported column '{}'", word)));
    }
    Ok(name.to_string())
}
