//! Prerequisite expressions attached to learning units within a program.
//!
//! A prerequisite is written as a flat list of groups joined by a main
//! operator. Each group is either a single learning unit, or a parenthesised
//! list of learning units joined by the opposite operator:
//!
//! ```text
//! LDROI1200 AND (LBIR1100 OR LBIR1200) AND LECGE1111
//! ```
//!
//! The French keywords `ET` and `OU` are accepted as aliases of `AND` and `OR`.

use std::{collections::BTreeSet, fmt, iter::Peekable, str::FromStr, sync::LazyLock};

use nonempty::NonEmpty;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::{Acronym, AcronymError, NodeId};

static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(|\)|[^\s()]+").expect("token pattern is valid"));

/// Boolean operator joining learning units in a prerequisite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operator {
    /// Every operand is required.
    #[default]
    And,
    /// At least one operand is required.
    Or,
}

impl Operator {
    /// The operator used inside groups when `self` is the main operator.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::And => Self::Or,
            Self::Or => Self::And,
        }
    }

    fn parse_keyword(word: &str) -> Option<Self> {
        match word.to_uppercase().as_str() {
            "AND" | "ET" => Some(Self::And),
            "OR" | "OU" => Some(Self::Or),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// A parsed prerequisite expression.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrerequisiteExpression {
    main_operator: Operator,
    groups: Vec<NonEmpty<Acronym>>,
}

impl PrerequisiteExpression {
    /// Builds an expression from its parts.
    #[must_use]
    pub const fn new(main_operator: Operator, groups: Vec<NonEmpty<Acronym>>) -> Self {
        Self {
            main_operator,
            groups,
        }
    }

    /// The operator joining top-level groups.
    #[must_use]
    pub const fn main_operator(&self) -> Operator {
        self.main_operator
    }

    /// The groups of the expression, in written order.
    #[must_use]
    pub fn groups(&self) -> &[NonEmpty<Acronym>] {
        &self.groups
    }

    /// Whether the expression references no learning unit at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Every acronym referenced by the expression.
    #[must_use]
    pub fn acronyms(&self) -> BTreeSet<Acronym> {
        self.groups
            .iter()
            .flat_map(|group| group.iter().cloned())
            .collect()
    }
}

impl fmt::Display for PrerequisiteExpression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = format!(" {} ", self.main_operator.opposite());
        let outer = format!(" {} ", self.main_operator);

        let rendered: Vec<String> = self
            .groups
            .iter()
            .map(|group| {
                if group.len() == 1 {
                    group.head.to_string()
                } else {
                    let items: Vec<&str> = group.iter().map(Acronym::as_str).collect();
                    format!("({})", items.join(&inner))
                }
            })
            .collect();

        write!(f, "{}", rendered.join(&outer))
    }
}

/// Errors that can occur when parsing a prerequisite expression.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExpressionError {
    /// A token was found where it is not allowed.
    #[error("unexpected '{0}' in prerequisite")]
    UnexpectedToken(String),
    /// The expression ended too early.
    #[error("prerequisite ends unexpectedly")]
    UnexpectedEnd,
    /// A parenthesis was opened but never closed.
    #[error("unbalanced parenthesis in prerequisite")]
    UnbalancedParenthesis,
    /// `AND` and `OR` were mixed at the same level.
    #[error("operators cannot be mixed at the same level; use parentheses")]
    MixedOperators,
    /// A learning unit reference is not a valid acronym.
    #[error(transparent)]
    Acronym(#[from] AcronymError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    Operator(Operator),
    Word(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Open => write!(f, "("),
            Self::Close => write!(f, ")"),
            Self::Operator(op) => write!(f, "{op}"),
            Self::Word(word) => write!(f, "{word}"),
        }
    }
}

fn tokenize(s: &str) -> Vec<Token> {
    TOKEN_PATTERN
        .find_iter(s)
        .map(|m| match m.as_str() {
            "(" => Token::Open,
            ")" => Token::Close,
            word => Operator::parse_keyword(word)
                .map_or_else(|| Token::Word(word.to_string()), Token::Operator),
        })
        .collect()
}

struct Parser<I: Iterator<Item = Token>> {
    tokens: Peekable<I>,
}

impl<I: Iterator<Item = Token>> Parser<I> {
    fn expression(&mut self) -> Result<PrerequisiteExpression, ExpressionError> {
        let mut groups = Vec::new();
        let mut main: Option<Operator> = None;
        let mut inner: Option<Operator> = None;

        loop {
            let (group, group_operator) = self.group()?;
            groups.push(group);
            if let Some(op) = group_operator {
                agree(&mut inner, op)?;
            }

            match self.tokens.next() {
                None => break,
                Some(Token::Operator(op)) => {
                    agree(&mut main, op)?;
                    if self.tokens.peek().is_none() {
                        return Err(ExpressionError::UnexpectedEnd);
                    }
                }
                Some(token) => return Err(ExpressionError::UnexpectedToken(token.to_string())),
            }
        }

        let main_operator = match (main, inner) {
            (Some(main), Some(inner)) if main == inner => {
                return Err(ExpressionError::MixedOperators);
            }
            (Some(main), _) => main,
            (None, Some(inner)) => inner.opposite(),
            (None, None) => Operator::default(),
        };

        Ok(PrerequisiteExpression::new(main_operator, groups))
    }

    fn group(&mut self) -> Result<(NonEmpty<Acronym>, Option<Operator>), ExpressionError> {
        match self.tokens.next() {
            Some(Token::Word(word)) => Ok((NonEmpty::new(Acronym::parse_lenient(&word)?), None)),
            Some(Token::Open) => {
                let mut items = NonEmpty::new(self.acronym()?);
                let mut operator = None;
                loop {
                    match self.tokens.next() {
                        Some(Token::Close) => return Ok((items, operator)),
                        Some(Token::Operator(op)) => {
                            agree(&mut operator, op)?;
                            items.push(self.acronym()?);
                        }
                        Some(token) => {
                            return Err(ExpressionError::UnexpectedToken(token.to_string()));
                        }
                        None => return Err(ExpressionError::UnbalancedParenthesis),
                    }
                }
            }
            Some(token) => Err(ExpressionError::UnexpectedToken(token.to_string())),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }

    fn acronym(&mut self) -> Result<Acronym, ExpressionError> {
        match self.tokens.next() {
            Some(Token::Word(word)) => Ok(Acronym::parse_lenient(&word)?),
            Some(token) => Err(ExpressionError::UnexpectedToken(token.to_string())),
            None => Err(ExpressionError::UnbalancedParenthesis),
        }
    }
}

fn agree(current: &mut Option<Operator>, op: Operator) -> Result<(), ExpressionError> {
    match current {
        Some(existing) if *existing != op => Err(ExpressionError::MixedOperators),
        _ => {
            *current = Some(op);
            Ok(())
        }
    }
}

impl FromStr for PrerequisiteExpression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens = tokenize(s);
        if tokens.is_empty() {
            return Ok(Self::default());
        }

        Parser {
            tokens: tokens.into_iter().peekable(),
        }
        .expression()
    }
}

impl Serialize for PrerequisiteExpression {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PrerequisiteExpression {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The prerequisite of one learning unit within one program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prerequisite {
    /// Identifier of the prerequisite record.
    pub id: u64,
    /// The program the prerequisite was defined in.
    pub root: NodeId,
    /// The learning unit the prerequisite applies to.
    pub learning_unit: Acronym,
    /// The learning units that must be acquired first.
    pub expression: PrerequisiteExpression,
}

impl Prerequisite {
    /// Whether the learning unit is listed among its own prerequisites.
    #[must_use]
    pub fn references_itself(&self) -> bool {
        self.expression
            .groups()
            .iter()
            .any(|group| group.iter().any(|acronym| *acronym == self.learning_unit))
    }
}

/// Lookup of prerequisite records by identifier.
pub trait PrerequisiteSource {
    /// Returns the prerequisite with the given identifier, if any.
    fn prerequisite(&self, id: u64) -> Option<&Prerequisite>;
}
