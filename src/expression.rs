//! License expression parsing.
//!
//! A license expression combines license keys with `AND`, `OR` and `WITH`
//! (case-insensitive), with parenthetical grouping: `mit OR apache-2.0`,
//! `gpl-2.0 WITH classpath-exception-2.0`. Keys starting with
//! `licenseref-` are references to licenses outside the canonical key set.
//!
//! Expressions are parsed when rules load so that an ill-formed expression
//! fails the index build instead of surfacing in match results.

use std::fmt;

/// Error raised for an ill-formed license expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Empty,
    UnexpectedChar { ch: char, position: usize },
    UnbalancedParens,
    DanglingOperator { operator: String },
    TrailingTokens,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty license expression"),
            Self::UnexpectedChar { ch, position } => {
                write!(f, "unexpected character '{ch}' at position {position}")
            }
            Self::UnbalancedParens => write!(f, "unbalanced parentheses"),
            Self::DanglingOperator { operator } => {
                write!(f, "operator '{operator}' is missing an operand")
            }
            Self::TrailingTokens => write!(f, "unexpected trailing tokens"),
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Key(String),
    And,
    Or,
    With,
    Open,
    Close,
}

/// A parsed license expression.
///
/// Operator precedence, loosest first: `OR`, `AND`, `WITH`. All keys are
/// normalized to lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseExpression {
    Key(String),
    LicenseRef(String),
    And(Box<LicenseExpression>, Box<LicenseExpression>),
    Or(Box<LicenseExpression>, Box<LicenseExpression>),
    With(Box<LicenseExpression>, Box<LicenseExpression>),
}

impl LicenseExpression {
    /// Parse an expression string.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ParseError::Empty);
        }
        let tokens = scan(trimmed)?;
        let (expr, rest) = parse_or(&tokens)?;
        if !rest.is_empty() {
            // a stray ')' is the common way to get here
            return if rest[0] == Token::Close {
                Err(ParseError::UnbalancedParens)
            } else {
                Err(ParseError::TrailingTokens)
            };
        }
        Ok(expr)
    }

    /// Every distinct license key in the expression, sorted.
    pub fn license_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        self.collect_keys(&mut keys);
        keys.sort();
        keys.dedup();
        keys
    }

    fn collect_keys(&self, keys: &mut Vec<String>) {
        match self {
            Self::Key(key) | Self::LicenseRef(key) => keys.push(key.clone()),
            Self::And(left, right) | Self::Or(left, right) | Self::With(left, right) => {
                left.collect_keys(keys);
                right.collect_keys(keys);
            }
        }
    }
}

impl fmt::Display for LicenseExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) | Self::LicenseRef(key) => write!(f, "{key}"),
            Self::And(left, right) => write!(f, "{left} AND {right}"),
            Self::Or(left, right) => write!(f, "{left} OR {right}"),
            Self::With(left, right) => write!(f, "{left} WITH {right}"),
        }
    }
}

fn scan(text: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        if c.is_whitespace() {
            pos += 1;
        } else if c == '(' {
            tokens.push(Token::Open);
            pos += 1;
        } else if c == ')' {
            tokens.push(Token::Close);
            pos += 1;
        } else if is_key_char(c) {
            let start = pos;
            while pos < chars.len() && is_key_char(chars[pos]) {
                pos += 1;
            }
            let word: String = chars[start..pos].iter().collect();
            tokens.push(match word.to_uppercase().as_str() {
                "AND" => Token::And,
                "OR" => Token::Or,
                "WITH" => Token::With,
                _ => Token::Key(word.to_lowercase()),
            });
        } else {
            return Err(ParseError::UnexpectedChar { ch: c, position: pos });
        }
    }
    Ok(tokens)
}

fn is_key_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '+'
}

fn parse_or(tokens: &[Token]) -> Result<(LicenseExpression, &[Token]), ParseError> {
    let (mut expr, mut rest) = parse_and(tokens)?;
    while rest.first() == Some(&Token::Or) {
        let (right, next) = parse_and(&rest[1..])?;
        expr = LicenseExpression::Or(Box::new(expr), Box::new(right));
        rest = next;
    }
    Ok((expr, rest))
}

fn parse_and(tokens: &[Token]) -> Result<(LicenseExpression, &[Token]), ParseError> {
    let (mut expr, mut rest) = parse_with(tokens)?;
    while rest.first() == Some(&Token::And) {
        let (right, next) = parse_with(&rest[1..])?;
        expr = LicenseExpression::And(Box::new(expr), Box::new(right));
        rest = next;
    }
    Ok((expr, rest))
}

fn parse_with(tokens: &[Token]) -> Result<(LicenseExpression, &[Token]), ParseError> {
    let (mut expr, mut rest) = parse_primary(tokens)?;
    while rest.first() == Some(&Token::With) {
        let (right, next) = parse_primary(&rest[1..])?;
        expr = LicenseExpression::With(Box::new(expr), Box::new(right));
        rest = next;
    }
    Ok((expr, rest))
}

fn parse_primary(tokens: &[Token]) -> Result<(LicenseExpression, &[Token]), ParseError> {
    match tokens.first() {
        None => Err(ParseError::Empty),
        Some(Token::Open) => {
            let (expr, rest) = parse_or(&tokens[1..])?;
            if rest.first() != Some(&Token::Close) {
                return Err(ParseError::UnbalancedParens);
            }
            Ok((expr, &rest[1..]))
        }
        Some(Token::Key(key)) => {
            let expr = if key.starts_with("licenseref-") {
                LicenseExpression::LicenseRef(key.clone())
            } else {
                LicenseExpression::Key(key.clone())
            };
            Ok((expr, &tokens[1..]))
        }
        Some(Token::Close) => Err(ParseError::UnbalancedParens),
        Some(op) => Err(ParseError::DanglingOperator {
            operator: format!("{op:?}").to_uppercase(),
        }),
    }
}
