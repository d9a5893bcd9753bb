//! Query safety classification module.
//!
//! Parses planned SQL and classifies it as safe, mutating, or destructive so
//! the pipeline only executes read-only statements by default.

mod parser;

pub use parser::{classify_sql, SqlClassifier};

use std::fmt;

/// Safety level classification for SQL queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SafetyLevel {
    /// Read-only queries (SELECT, plain EXPLAIN, SHOW).
    Safe,
    /// Data modification (INSERT, UPDATE, MERGE).
    Mutating,
    /// Data loss, schema or privilege changes, and anything unrecognized.
    Destructive,
}

impl SafetyLevel {
    /// Returns true if the statement only reads data.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::Safe)
    }
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safe => write!(f, "Safe"),
            Self::Mutating => write!(f, "Mutating"),
            Self::Destructive => write!(f, "Destructive"),
        }
    }
}

/// The type of SQL statement detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementType {
    Select,
    Insert,
    Update,
    Merge,
    Explain,
    Show,
    /// Multiple statements detected; contains the most dangerous type.
    Multiple(Box<StatementType>),
    /// Any other statement (DDL, DELETE, GRANT, ...), or unparseable input.
    Other,
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Merge => write!(f, "MERGE"),
            Self::Explain => write!(f, "EXPLAIN"),
            Self::Show => write!(f, "SHOW"),
            Self::Multiple(inner) => write!(f, "Multiple ({})", inner),
            Self::Other => write!(f, "Other"),
        }
    }
}

/// Result of classifying a SQL query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    /// The determined safety level.
    pub level: SafetyLevel,
    /// The type of statement(s) detected.
    pub statement_type: StatementType,
    /// Optional note, e.g. the parse error for unparseable SQL.
    pub warning: Option<String>,
}

impl ClassificationResult {
    /// Creates a new classification result.
    pub fn new(level: SafetyLevel, statement_type: StatementType) -> Self {
        Self {
            level,
            statement_type,
            warning: None,
        }
    }

    /// Creates a classification result with a warning message.
    pub fn with_warning(
        level: SafetyLevel,
        statement_type: StatementType,
        warning: impl Into<String>,
    ) -> Self {
        Self {
            level,
            statement_type,
            warning: Some(warning.into()),
        }
    }

    /// Returns true if the SQL may be executed without explicit permission.
    pub fn is_read_only(&self) -> bool {
        self.level.is_read_only()
    }
}

impl fmt::Display for ClassificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.level, self.statement_type)?;
        if let Some(warning) = &self.warning {
            write!(f, ": {warning}")?;
        }
        Ok(())
    }
}
