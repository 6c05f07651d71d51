//! Diagnostic codes: a category letter and a three-digit number.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What part of the pipeline a diagnostic comes from.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Category {
    /// `S`: the model cannot be loaded.
    Schema,
    /// `L`: a frequency limit or a register setting is violated.
    Limit,
    /// `R`: resolver outcome.
    Resolve,
    /// `W`: model lint.
    Lint,
    /// `C`: `clocktree.toml` problem.
    Config,
}

impl Category {
    const ALL: [Category; 5] = [
        Category::Schema,
        Category::Limit,
        Category::Resolve,
        Category::Lint,
        Category::Config,
    ];

    /// The letter a code of this category starts with.
    pub fn prefix(self) -> char {
        match self {
            Category::Schema => 'S',
            Category::Limit => 'L',
            Category::Resolve => 'R',
            Category::Lint => 'W',
            Category::Config => 'C',
        }
    }

    /// The category whose codes start with `c`.
    pub fn from_prefix(c: char) -> Option<Category> {
        Self::ALL.into_iter().find(|cat| cat.prefix() == c)
    }
}

/// A diagnostic code such as `L003` or `W002`.
///
/// Serialized as its display string so that JSON reports carry the same code
/// users see on the terminal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct DiagnosticCode {
    /// The category.
    pub category: Category,
    /// Number within the category.
    pub number: u16,
}

impl DiagnosticCode {
    /// Creates a code.
    pub fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}

/// A string that is not a diagnostic code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCodeError(pub String);

impl fmt::Display for ParseCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid diagnostic code '{}'", self.0)
    }
}

impl std::error::Error for ParseCodeError {}

impl FromStr for DiagnosticCode {
    type Err = ParseCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseCodeError(s.to_string());
        let mut chars = s.chars();
        let category = chars.next().and_then(Category::from_prefix).ok_or_else(err)?;
        let digits = chars.as_str();
        if digits.len() != 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let number = digits.parse().map_err(|_| err())?;
        Ok(Self::new(category, number))
    }
}

impl From<DiagnosticCode> for String {
    fn from(code: DiagnosticCode) -> String {
        code.to_string()
    }
}

impl TryFrom<String> for DiagnosticCode {
    type Error = ParseCodeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
