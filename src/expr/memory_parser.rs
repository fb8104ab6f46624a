//! Parser for memory navigation expressions.
//!
//! The grammar is a small subset of the condition grammar:
//!
//! ```text
//! prog       : expression EOF
//! expression : mult ( ('+' | '-') mult )*
//! mult       : primary ( '*' primary )*
//! primary    : REGISTER | NUMBER | HEX_NUMBER
//!            | '[' expression ']' | '(' expression ')'
//! ```
//!
//! Runs of `+` fold into one n-ary `Plus`, runs of `-` into one `Minus`;
//! switching between the two nests left-associatively.

use crate::errors::ParseError;
use crate::expr::memory::MemoryExpression;

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Register(String),
    Number(u64),
    Plus,
    Minus,
    Star,
    BracketOpen,
    BracketClose,
    ParenOpen,
    ParenClose,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            Self::Register(name) => name.clone(),
            Self::Number(value) => value.to_string(),
            Self::Plus => "+".to_string(),
            Self::Minus => "-".to_string(),
            Self::Star => "*".to_string(),
            Self::BracketOpen => "[".to_string(),
            Self::BracketClose => "]".to_string(),
            Self::ParenOpen => "(".to_string(),
            Self::ParenClose => ")".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    position: usize,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut index = 0;

    while index < bytes.len() {
        let start = index;
        match bytes[index] {
            b' ' | b'\t' | b'\r' | b'\n' => {
                index += 1;
                continue;
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                while index < bytes.len()
                    && (bytes[index].is_ascii_alphanumeric() || bytes[index] == b'_')
                {
                    index += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Register(input[start..index].to_string()),
                    position: start,
                });
            }
            b'0'..=b'9' => {
                let value = if input[index..].starts_with("0x") || input[index..].starts_with("0X")
                {
                    index += 2;
                    let digits_start = index;
                    while index < bytes.len() && bytes[index].is_ascii_hexdigit() {
                        index += 1;
                    }
                    let digits = &input[digits_start..index];
                    if digits.is_empty() {
                        return Err(ParseError::new(
                            start,
                            input[start..index].to_string(),
                            "hexadecimal literal without digits",
                        ));
                    }
                    u64::from_str_radix(digits, 16).map_err(|_| {
                        ParseError::new(start, digits.to_string(), "hexadecimal literal too large")
                    })?
                } else {
                    while index < bytes.len() && bytes[index].is_ascii_digit() {
                        index += 1;
                    }
                    let digits = &input[start..index];
                    digits.parse::<u64>().map_err(|_| {
                        ParseError::new(start, digits.to_string(), "numeric literal too large")
                    })?
                };
                tokens.push(Token {
                    kind: TokenKind::Number(value),
                    position: start,
                });
            }
            byte => {
                let kind = match byte {
                    b'+' => TokenKind::Plus,
                    b'-' => TokenKind::Minus,
                    b'*' => TokenKind::Star,
                    b'[' => TokenKind::BracketOpen,
                    b']' => TokenKind::BracketClose,
                    b'(' => TokenKind::ParenOpen,
                    b')' => TokenKind::ParenClose,
                    other => {
                        return Err(ParseError::new(
                            start,
                            (other as char).to_string(),
                            "unexpected character",
                        ))
                    }
                };
                index += 1;
                tokens.push(Token {
                    kind,
                    position: start,
                });
            }
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    cursor: usize,
    input: &'a str,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.cursor).map(|token| &token.kind)
    }

    fn error_here(&self, message: &str) -> ParseError {
        match self.tokens.get(self.cursor) {
            Some(token) => ParseError::new(token.position, token.kind.describe(), message),
            None => ParseError::new(self.input.len(), "end of input", message),
        }
    }

    fn expect(&mut self, expected: TokenKind, message: &str) -> Result<(), ParseError> {
        match self.peek() {
            Some(kind) if *kind == expected => {
                self.cursor += 1;
                Ok(())
            }
            _ => Err(self.error_here(message)),
        }
    }

    fn parse_expression(&mut self) -> Result<MemoryExpression, ParseError> {
        let mut tree = self.parse_mult()?;
        let mut current: Option<TokenKind> = None;

        while let Some(op @ (TokenKind::Plus | TokenKind::Minus)) = self.peek().cloned() {
            self.cursor += 1;
            let next = self.parse_mult()?;
            if current.as_ref() == Some(&op) {
                match &mut tree {
                    MemoryExpression::Plus { children } | MemoryExpression::Minus { children } => {
                        children.push(next)
                    }
                    _ => {}
                }
            } else {
                tree = if op == TokenKind::Plus {
                    MemoryExpression::Plus {
                        children: vec![tree, next],
                    }
                } else {
                    MemoryExpression::Minus {
                        children: vec![tree, next],
                    }
                };
                current = Some(op);
            }
        }

        Ok(tree)
    }

    fn parse_mult(&mut self) -> Result<MemoryExpression, ParseError> {
        let mut tree = self.parse_primary()?;
        let mut folded = false;

        while self.peek() == Some(&TokenKind::Star) {
            self.cursor += 1;
            let next = self.parse_primary()?;
            if folded {
                if let MemoryExpression::Multiplication { children } = &mut tree {
                    children.push(next);
                }
            } else {
                tree = MemoryExpression::Multiplication {
                    children: vec![tree, next],
                };
                folded = true;
            }
        }

        Ok(tree)
    }

    fn parse_primary(&mut self) -> Result<MemoryExpression, ParseError> {
        match self.peek().cloned() {
            Some(TokenKind::Register(name)) => {
                self.cursor += 1;
                Ok(MemoryExpression::Register { name })
            }
            Some(TokenKind::Number(value)) => {
                self.cursor += 1;
                Ok(MemoryExpression::NumericalValue { value })
            }
            Some(TokenKind::BracketOpen) => {
                self.cursor += 1;
                let child = self.parse_expression()?;
                self.expect(TokenKind::BracketClose, "expected ']'")?;
                Ok(MemoryExpression::memory(child))
            }
            Some(TokenKind::ParenOpen) => {
                self.cursor += 1;
                let child = self.parse_expression()?;
                self.expect(TokenKind::ParenClose, "expected ')'")?;
                Ok(MemoryExpression::sub(child))
            }
            _ => Err(self.error_here("expected a register, number, '[' or '('")),
        }
    }
}

/// Parses a memory navigation expression such as `[4 * eax + ecx]`.
pub fn parse_memory_expression(input: &str) -> Result<MemoryExpression, ParseError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        cursor: 0,
        input,
    };
    let tree = parser.parse_expression()?;
    if parser.cursor != parser.tokens.len() {
        return Err(parser.error_here("trailing input after expression"));
    }
    Ok(tree)
}
