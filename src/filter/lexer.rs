use super::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    LParen,
    RParen,
    Comma,
    /// Identifier, keyword, operator, or bare numeric literal.
    Word(String),
    /// Single-quoted string; `''` already collapsed, backslash escapes intact.
    Quoted(String),
    /// A word immediately followed by a quoted body, e.g. `datetime'…'`.
    Typed { prefix: String, body: String },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | ',' | '\'')
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(position, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' | ')' | ',' => {
                chars.next();
                let kind = match c {
                    '(' => TokenKind::LParen,
                    ')' => TokenKind::RParen,
                    _ => TokenKind::Comma,
                };
                tokens.push(Token { kind, position });
            }
            '\'' => {
                chars.next();
                let body = read_quoted(&mut chars, position)?;
                tokens.push(Token {
                    kind: TokenKind::Quoted(body),
                    position,
                });
            }
            _ => {
                let mut word = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if !is_word_char(c) {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                let kind = match chars.peek() {
                    Some(&(quote_at, '\'')) => {
                        chars.next();
                        let body = read_quoted(&mut chars, quote_at)?;
                        TokenKind::Typed { prefix: word, body }
                    }
                    _ => TokenKind::Word(word),
                };
                tokens.push(Token { kind, position });
            }
        }
    }
    Ok(tokens)
}

fn read_quoted(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    start: usize,
) -> Result<String, ParseError> {
    let mut body = String::new();
    loop {
        match chars.next() {
            Some((_, '\'')) => {
                if matches!(chars.peek(), Some(&(_, '\''))) {
                    chars.next();
                    body.push('\'');
                } else {
                    return Ok(body);
                }
            }
            Some((_, '\\')) => {
                body.push('\\');
                if let Some((_, escaped)) = chars.next() {
                    body.push(escaped);
                }
            }
            Some((_, c)) => body.push(c),
            None => return Err(ParseError::syntax(start, "unterminated string literal")),
        }
    }
}
