//! Recursive-descent parser for `$filter`.
//!
//! Precedence from loosest to tightest: `or`, `and`, comparisons and calls.
//! An opening parenthesis that is never closed is dropped before parsing, so
//! `a eq 1 and (b eq 2` reads as `a eq 1 and b eq 2`. A closing parenthesis
//! without an opener is an error.

use super::ast::{ComparisonOp, FilterFunction, FilterNode, LogicalOp};
use super::error::ParseError;
use super::lexer::{tokenize, Token, TokenKind};
use super::literal::{parse_datetime, parse_number, unescape, Literal};
use crate::edm::{is_navigation_property_name, is_reserved_name};

const MAX_DEPTH: usize = 64;

/// Upper bound on `and`/`or` operators in one expression.
pub const MAX_LOGICAL_OPERATORS: usize = 256;

const UNSUPPORTED_OPERATORS: &[&str] = &["add", "sub", "mul", "div", "mod", "not"];

const UNSUPPORTED_FUNCTIONS: &[&str] = &[
    "endswith",
    "indexof",
    "length",
    "substring",
    "replace",
    "tolower",
    "toupper",
    "trim",
    "concat",
    "year",
    "month",
    "day",
    "hour",
    "minute",
    "second",
    "round",
    "floor",
    "ceiling",
    "isof",
    "cast",
];

/// Parse a `$filter` expression.
pub fn parse(input: &str) -> Result<FilterNode, ParseError> {
    let tokens = drop_unclosed_groups(tokenize(input)?)?;
    if tokens.is_empty() {
        return Err(ParseError::syntax(0, "empty filter expression"));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
        depth: 0,
        operators: 0,
    };
    let node = parser.parse_or()?;
    match parser.peek() {
        None => Ok(node),
        Some(token) => Err(ParseError::syntax(token.position, "unexpected trailing token")),
    }
}

/// True for names made only of ASCII letters, digits, `_` and `-`.
pub fn is_valid_property_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn drop_unclosed_groups(tokens: Vec<Token>) -> Result<Vec<Token>, ParseError> {
    let mut open = Vec::new();
    for (index, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LParen => open.push(index),
            TokenKind::RParen => {
                if open.pop().is_none() {
                    return Err(ParseError::syntax(token.position, "unmatched ')'"));
                }
            }
            _ => {}
        }
    }
    if open.is_empty() {
        return Ok(tokens);
    }
    Ok(tokens
        .into_iter()
        .enumerate()
        .filter(|(index, _)| !open.contains(index))
        .map(|(_, token)| token)
        .collect())
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    end: usize,
    depth: usize,
    operators: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn position(&self) -> usize {
        self.peek().map(|t| t.position).unwrap_or(self.end)
    }

    fn peek_word(&self, word: &str) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Word(w)) if w == word)
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), ParseError> {
        let position = self.position();
        match self.next() {
            Some(token) if token.kind == kind => Ok(()),
            _ => Err(ParseError::syntax(position, format!("expected {}", what))),
        }
    }

    fn take_operator(&mut self) -> Result<(), ParseError> {
        let position = self.position();
        if self.operators >= MAX_LOGICAL_OPERATORS {
            return Err(ParseError::syntax(position, "too many 'and'/'or' operators"));
        }
        self.operators += 1;
        self.next();
        Ok(())
    }

    fn parse_or(&mut self) -> Result<FilterNode, ParseError> {
        let mut left = self.parse_and()?;
        while self.peek_word("or") {
            self.take_operator()?;
            let right = self.parse_and()?;
            left = FilterNode::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<FilterNode, ParseError> {
        let mut left = self.parse_primary()?;
        while self.peek_word("and") {
            self.take_operator()?;
            let right = self.parse_primary()?;
            left = FilterNode::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<FilterNode, ParseError> {
        let position = self.position();
        let Some(token) = self.next() else {
            return Err(ParseError::syntax(position, "expected expression"));
        };
        match token.kind {
            TokenKind::LParen => {
                if self.depth >= MAX_DEPTH {
                    return Err(ParseError::syntax(position, "expression nested too deeply"));
                }
                self.depth += 1;
                let inner = self.parse_or()?;
                self.depth -= 1;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(FilterNode::Group(Box::new(inner)))
            }
            TokenKind::Word(word) => {
                if word == "and" || word == "or" {
                    return Err(ParseError::syntax(
                        position,
                        format!("missing operand before '{}'", word),
                    ));
                }
                if UNSUPPORTED_OPERATORS.contains(&word.as_str()) {
                    return Err(ParseError::UnsupportedOperator(word));
                }
                if matches!(self.peek_kind(), Some(TokenKind::LParen)) {
                    return self.parse_call(word, position);
                }
                if is_literal_word(&word) {
                    return Err(ParseError::syntax(
                        position,
                        "left operand of a comparison must be a property",
                    ));
                }
                self.parse_comparison(word, position)
            }
            _ => Err(ParseError::syntax(
                position,
                "left operand of a comparison must be a property",
            )),
        }
    }

    fn parse_comparison(
        &mut self,
        property: String,
        position: usize,
    ) -> Result<FilterNode, ParseError> {
        check_property_name(&property, position)?;

        let op_position = self.position();
        let op = match self.next() {
            Some(Token {
                kind: TokenKind::Word(word),
                ..
            }) => match ComparisonOp::from_keyword(&word) {
                Some(op) => op,
                None if UNSUPPORTED_OPERATORS.contains(&word.as_str()) => {
                    return Err(ParseError::UnsupportedOperator(word));
                }
                None => {
                    return Err(ParseError::syntax(
                        op_position,
                        format!("unknown operator '{}'", word),
                    ))
                }
            },
            _ => return Err(ParseError::syntax(op_position, "expected comparison operator")),
        };

        let literal_position = self.position();
        let literal = self.parse_literal()?;
        if op.is_ordering() && matches!(literal, Literal::Null | Literal::Boolean(_)) {
            return Err(ParseError::syntax(
                literal_position,
                format!("'{}' is not defined for {} operands", op.as_str(), literal.class_name()),
            ));
        }
        Ok(FilterNode::Comparison {
            property,
            op,
            literal,
        })
    }

    fn parse_call(&mut self, name: String, position: usize) -> Result<FilterNode, ParseError> {
        let function = match name.as_str() {
            "startswith" => FilterFunction::StartsWith,
            "substringof" => FilterFunction::SubstringOf,
            other if UNSUPPORTED_FUNCTIONS.contains(&other) => {
                return Err(ParseError::UnsupportedFunction(name));
            }
            _ => {
                return Err(ParseError::syntax(
                    position,
                    format!("unknown function '{}'", name),
                ))
            }
        };

        self.expect(TokenKind::LParen, "'('")?;
        let (property, literal) = match function {
            FilterFunction::StartsWith => {
                let property = self.parse_property_argument()?;
                self.expect(TokenKind::Comma, "','")?;
                let literal = self.parse_literal()?;
                (property, literal)
            }
            FilterFunction::SubstringOf => {
                let literal = self.parse_literal()?;
                self.expect(TokenKind::Comma, "','")?;
                let property = self.parse_property_argument()?;
                (property, literal)
            }
        };
        self.expect(TokenKind::RParen, "')'")?;

        Ok(FilterNode::Call {
            function,
            property,
            literal,
        })
    }

    fn parse_property_argument(&mut self) -> Result<String, ParseError> {
        let position = self.position();
        match self.next() {
            Some(Token {
                kind: TokenKind::Word(word),
                ..
            }) if !is_literal_word(&word) => {
                check_property_name(&word, position)?;
                Ok(word)
            }
            _ => Err(ParseError::syntax(position, "expected property name")),
        }
    }

    fn parse_literal(&mut self) -> Result<Literal, ParseError> {
        let position = self.position();
        let Some(token) = self.next() else {
            return Err(ParseError::syntax(position, "expected literal"));
        };
        match token.kind {
            TokenKind::Quoted(raw) => match unescape(&raw) {
                Some(value) => Ok(Literal::String(value)),
                None => Err(ParseError::Unescape { operand: raw }),
            },
            TokenKind::Typed { prefix, body } => {
                let millis = parse_datetime(&body).ok_or_else(|| {
                    let message = format!("unrecognised datetime pattern '{}'", body);
                    ParseError::syntax(position, message)
                });
                match prefix.as_str() {
                    "datetime" => Ok(Literal::DateTime(millis?)),
                    "datetimeoffset" => Ok(Literal::DateTimeOffset(millis?)),
                    _ => Err(ParseError::syntax(
                        position,
                        format!("unsupported literal prefix '{}'", prefix),
                    )),
                }
            }
            TokenKind::Word(word) => match word.as_str() {
                "null" => Ok(Literal::Null),
                "true" => Ok(Literal::Boolean(true)),
                "false" => Ok(Literal::Boolean(false)),
                _ => match parse_number(&word) {
                    Some(Ok(literal)) => Ok(literal),
                    Some(Err(message)) => Err(ParseError::syntax(position, message)),
                    None if is_reserved_name(&word) || is_navigation_property_name(&word) => {
                        Err(ParseError::unknown_key(word))
                    }
                    None => Err(ParseError::syntax(
                        position,
                        format!("expected literal, found '{}'", word),
                    )),
                },
            },
            _ => Err(ParseError::syntax(position, "expected literal")),
        }
    }
}

fn is_literal_word(word: &str) -> bool {
    matches!(word, "null" | "true" | "false") || parse_number(word).is_some()
}

fn check_property_name(name: &str, position: usize) -> Result<(), ParseError> {
    if is_reserved_name(name) || is_navigation_property_name(name) {
        return Err(ParseError::unknown_key(name));
    }
    if !is_valid_property_name(name) {
        return Err(ParseError::syntax(
            position,
            format!("invalid property name '{}'", name),
        ));
    }
    Ok(())
}
