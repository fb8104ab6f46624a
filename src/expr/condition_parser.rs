//! Recursive-descent parser for conditional-breakpoint expressions.
//!
//! Grammar, loosest to tightest binding:
//!
//! ```text
//! prog      : chain EOF
//! chain     : and ( '||' and )*
//! and       : condition ( '&&' condition )*
//! condition : formula RELOP formula
//! formula   : bxor ( '|' bxor )*
//! bxor      : band ( '^' band )*
//! band      : shift ( '&' shift )*
//! shift     : add ( ('<<' | '>>') add )*
//! add       : mult ( ('+' | '-') mult )*
//! mult      : primary ( ('*' | '/' | '%') primary )*
//! primary   : IDENTIFIER | NUMBER | HEX_NUMBER
//!           | '[' formula ']' | '(' formula ')'
//! ```
//!
//! The relation in `condition` is mandatory; a bare register name is not a
//! valid breakpoint condition. Runs of the same chain operator fold into a
//! single n-ary node, so `a + b + c` parses to one addition with three
//! children while `a + b - c` nests left-associatively.

use crate::errors::ParseError;
use crate::expr::condition::{
    ConditionTree, ExpressionOperator, FormulaOperator, RelationOperator,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Identifier(String),
    Number(u64),
    Relation(RelationOperator),
    LogicalAnd,
    LogicalOr,
    BitOr,
    BitXor,
    BitAnd,
    ShiftLeft,
    ShiftRight,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    BracketOpen,
    BracketClose,
    ParenOpen,
    ParenClose,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            Self::Identifier(name) => name.clone(),
            Self::Number(value) => value.to_string(),
            Self::Relation(op) => op.as_str().to_string(),
            Self::LogicalAnd => "&&".to_string(),
            Self::LogicalOr => "||".to_string(),
            Self::BitOr => "|".to_string(),
            Self::BitXor => "^".to_string(),
            Self::BitAnd => "&".to_string(),
            Self::ShiftLeft => "<<".to_string(),
            Self::ShiftRight => ">>".to_string(),
            Self::Plus => "+".to_string(),
            Self::Minus => "-".to_string(),
            Self::Star => "*".to_string(),
            Self::Slash => "/".to_string(),
            Self::Percent => "%".to_string(),
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
        let byte = bytes[index];
        match byte {
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
                let name = input[start..index].to_string();
                tokens.push(Token {
                    kind: TokenKind::Identifier(name),
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
            _ => {
                let rest = &input[index..];
                let (kind, width) = if rest.starts_with("<<") {
                    (TokenKind::ShiftLeft, 2)
                } else if rest.starts_with("<=") {
                    (TokenKind::Relation(RelationOperator::LessOrEqual), 2)
                } else if rest.starts_with("<>") {
                    (TokenKind::Relation(RelationOperator::NotEqualAngle), 2)
                } else if rest.starts_with(">>") {
                    (TokenKind::ShiftRight, 2)
                } else if rest.starts_with(">=") {
                    (TokenKind::Relation(RelationOperator::GreaterOrEqual), 2)
                } else if rest.starts_with("==") {
                    (TokenKind::Relation(RelationOperator::Equal), 2)
                } else if rest.starts_with("!=") {
                    (TokenKind::Relation(RelationOperator::NotEqual), 2)
                } else if rest.starts_with("&&") {
                    (TokenKind::LogicalAnd, 2)
                } else if rest.starts_with("||") {
                    (TokenKind::LogicalOr, 2)
                } else {
                    let kind = match byte {
                        b'<' => TokenKind::Relation(RelationOperator::Less),
                        b'>' => TokenKind::Relation(RelationOperator::Greater),
                        b'&' => TokenKind::BitAnd,
                        b'|' => TokenKind::BitOr,
                        b'^' => TokenKind::BitXor,
                        b'+' => TokenKind::Plus,
                        b'-' => TokenKind::Minus,
                        b'*' => TokenKind::Star,
                        b'/' => TokenKind::Slash,
                        b'%' => TokenKind::Percent,
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
                    (kind, 1)
                };
                index += width;
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

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
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

    fn parse_chain(&mut self) -> Result<ConditionTree, ParseError> {
        let first = self.parse_and()?;
        let mut children = vec![first];
        while self.peek() == Some(&TokenKind::LogicalOr) {
            self.cursor += 1;
            children.push(self.parse_and()?);
        }
        Ok(collapse_expression(ExpressionOperator::Or, children))
    }

    fn parse_and(&mut self) -> Result<ConditionTree, ParseError> {
        let first = self.parse_condition()?;
        let mut children = vec![first];
        while self.peek() == Some(&TokenKind::LogicalAnd) {
            self.cursor += 1;
            children.push(self.parse_condition()?);
        }
        Ok(collapse_expression(ExpressionOperator::And, children))
    }

    fn parse_condition(&mut self) -> Result<ConditionTree, ParseError> {
        let lhs = self.parse_formula()?;
        let operator = match self.peek() {
            Some(TokenKind::Relation(op)) => *op,
            _ => return Err(self.error_here("expected a comparison operator")),
        };
        self.cursor += 1;
        let rhs = self.parse_formula()?;
        Ok(ConditionTree::relation(operator, lhs, rhs))
    }

    fn parse_formula(&mut self) -> Result<ConditionTree, ParseError> {
        self.parse_binary_run(Self::parse_bxor, |kind| match kind {
            TokenKind::BitOr => Some(FormulaOperator::BitOr),
            _ => None,
        })
    }

    fn parse_bxor(&mut self) -> Result<ConditionTree, ParseError> {
        self.parse_binary_run(Self::parse_band, |kind| match kind {
            TokenKind::BitXor => Some(FormulaOperator::BitXor),
            _ => None,
        })
    }

    fn parse_band(&mut self) -> Result<ConditionTree, ParseError> {
        self.parse_binary_run(Self::parse_shift, |kind| match kind {
            TokenKind::BitAnd => Some(FormulaOperator::BitAnd),
            _ => None,
        })
    }

    fn parse_shift(&mut self) -> Result<ConditionTree, ParseError> {
        self.parse_binary_run(Self::parse_add, |kind| match kind {
            TokenKind::ShiftLeft => Some(FormulaOperator::ShiftLeft),
            TokenKind::ShiftRight => Some(FormulaOperator::ShiftRight),
            _ => None,
        })
    }

    fn parse_add(&mut self) -> Result<ConditionTree, ParseError> {
        self.parse_binary_run(Self::parse_mult, |kind| match kind {
            TokenKind::Plus => Some(FormulaOperator::Add),
            TokenKind::Minus => Some(FormulaOperator::Sub),
            _ => None,
        })
    }

    fn parse_mult(&mut self) -> Result<ConditionTree, ParseError> {
        self.parse_binary_run(Self::parse_primary, |kind| match kind {
            TokenKind::Star => Some(FormulaOperator::Mul),
            TokenKind::Slash => Some(FormulaOperator::Div),
            TokenKind::Percent => Some(FormulaOperator::Mod),
            _ => None,
        })
    }

    /// Parses `operand (op operand)*` where `match_op` recognizes the
    /// operators of this precedence level. Consecutive uses of the same
    /// operator extend one n-ary node; an operator change nests the node
    /// built so far as the left child of a fresh one.
    fn parse_binary_run(
        &mut self,
        mut operand: impl FnMut(&mut Self) -> Result<ConditionTree, ParseError>,
        match_op: impl Fn(&TokenKind) -> Option<FormulaOperator>,
    ) -> Result<ConditionTree, ParseError> {
        let mut tree = operand(self)?;
        let mut current: Option<FormulaOperator> = None;

        while let Some(op) = self.peek().and_then(&match_op) {
            self.cursor += 1;
            let next = operand(self)?;
            if current == Some(op) {
                if let ConditionTree::Formula { children, .. } = &mut tree {
                    children.push(next);
                }
            } else {
                tree = ConditionTree::Formula {
                    operator: op,
                    children: vec![tree, next],
                };
                current = Some(op);
            }
        }

        Ok(tree)
    }

    fn parse_primary(&mut self) -> Result<ConditionTree, ParseError> {
        match self.peek() {
            Some(TokenKind::Identifier(_)) => {
                let token = self.advance();
                if let Some(Token {
                    kind: TokenKind::Identifier(name),
                    ..
                }) = token
                {
                    Ok(ConditionTree::Identifier { name })
                } else {
                    Err(self.error_here("expected an identifier"))
                }
            }
            Some(TokenKind::Number(value)) => {
                let value = *value;
                self.cursor += 1;
                Ok(ConditionTree::Number { value })
            }
            Some(TokenKind::BracketOpen) => {
                self.cursor += 1;
                let child = self.parse_formula()?;
                self.expect(TokenKind::BracketClose, "expected ']'")?;
                Ok(ConditionTree::memory(child))
            }
            Some(TokenKind::ParenOpen) => {
                self.cursor += 1;
                let child = self.parse_formula()?;
                self.expect(TokenKind::ParenClose, "expected ')'")?;
                Ok(ConditionTree::sub(child))
            }
            _ => Err(self.error_here("expected an identifier, number, '[' or '('")),
        }
    }
}

fn collapse_expression(operator: ExpressionOperator, mut children: Vec<ConditionTree>) -> ConditionTree {
    if children.len() == 1 {
        children.remove(0)
    } else {
        ConditionTree::Expression { operator, children }
    }
}

/// Parses a breakpoint condition such as `eax == 5 && [esp + 4] != 0`.
pub fn parse_condition(input: &str) -> Result<ConditionTree, ParseError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        cursor: 0,
        input,
    };
    let tree = parser.parse_chain()?;
    if parser.cursor != parser.tokens.len() {
        return Err(parser.error_here("trailing input after condition"));
    }
    Ok(tree)
}
