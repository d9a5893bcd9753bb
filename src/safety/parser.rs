//! SQL parsing and classification logic.
//!
//! Uses sqlparser-rs with the dialect of the target backend.

use sqlparser::ast::{Query, Select, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::{Dialect, GenericDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

use crate::db::DatabaseBackend;

use super::{ClassificationResult, SafetyLevel, StatementType};

/// SQL classifier that parses and classifies SQL queries.
#[derive(Debug)]
pub struct SqlClassifier {
    backend: Option<DatabaseBackend>,
}

impl Default for SqlClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlClassifier {
    /// Creates a classifier using the generic SQL dialect.
    pub fn new() -> Self {
        Self { backend: None }
    }

    /// Creates a classifier using the dialect of the given backend.
    pub fn for_backend(backend: DatabaseBackend) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    fn dialect(&self) -> Box<dyn Dialect> {
        match self.backend {
            Some(DatabaseBackend::Postgres) => Box::new(PostgreSqlDialect {}),
            Some(DatabaseBackend::Sqlite) => Box::new(SQLiteDialect {}),
            None => Box::new(GenericDialect {}),
        }
    }

    /// Classifies a SQL string.
    ///
    /// Unparseable or empty SQL is classified as destructive.
    pub fn classify(&self, sql: &str) -> ClassificationResult {
        let dialect = self.dialect();
        let statements = match Parser::parse_sql(dialect.as_ref(), sql) {
            Ok(statements) => statements,
            Err(e) => {
                return ClassificationResult::with_warning(
                    SafetyLevel::Destructive,
                    StatementType::Other,
                    format!("Could not parse SQL: {e}"),
                )
            }
        };

        match statements.as_slice() {
            [] => ClassificationResult::with_warning(
                SafetyLevel::Destructive,
                StatementType::Other,
                "Empty SQL statement",
            ),
            [statement] => {
                let (level, stmt_type) = classify_statement(statement);
                ClassificationResult::new(level, stmt_type)
            }
            many => {
                let (level, stmt_type) = most_dangerous(many.iter().map(classify_statement));
                ClassificationResult::new(level, StatementType::Multiple(Box::new(stmt_type)))
            }
        }
    }
}

/// Convenience function to classify SQL for a backend.
pub fn classify_sql(sql: &str, backend: DatabaseBackend) -> ClassificationResult {
    SqlClassifier::for_backend(backend).classify(sql)
}

/// Picks the most dangerous classification; the first one wins ties.
fn most_dangerous(
    classifications: impl IntoIterator<Item = (SafetyLevel, StatementType)>,
) -> (SafetyLevel, StatementType) {
    classifications
        .into_iter()
        .fold((SafetyLevel::Safe, StatementType::Select), |max, next| {
            if next.0 > max.0 {
                next
            } else {
                max
            }
        })
}

fn classify_statement(statement: &Statement) -> (SafetyLevel, StatementType) {
    match statement {
        // Query: may contain data-modifying CTEs, so recurse
        Statement::Query(query) => classify_query(query),
        Statement::Explain {
            analyze, statement, ..
        } => {
            if *analyze {
                // EXPLAIN ANALYZE executes the statement
                let (inner_level, _) = classify_statement(statement);
                (inner_level, StatementType::Explain)
            } else {
                (SafetyLevel::Safe, StatementType::Explain)
            }
        }
        Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowVariable { .. } => (SafetyLevel::Safe, StatementType::Show),

        Statement::Insert { .. } => (SafetyLevel::Mutating, StatementType::Insert),
        Statement::Update { .. } => (SafetyLevel::Mutating, StatementType::Update),
        Statement::Merge { .. } => (SafetyLevel::Mutating, StatementType::Merge),

        _ => (SafetyLevel::Destructive, StatementType::Other),
    }
}

fn classify_query(query: &Query) -> (SafetyLevel, StatementType) {
    let ctes = query
        .with
        .iter()
        .flat_map(|with| with.cte_tables.iter())
        .map(|cte| classify_query(&cte.query));

    most_dangerous(ctes.chain(std::iter::once(classify_set_expr(&query.body))))
}

fn classify_set_expr(set_expr: &SetExpr) -> (SafetyLevel, StatementType) {
    match set_expr {
        SetExpr::Select(select) => classify_select(select),
        SetExpr::Query(query) => classify_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            most_dangerous([classify_set_expr(left), classify_set_expr(right)])
        }
        SetExpr::Values(_) | SetExpr::Table(_) => (SafetyLevel::Safe, StatementType::Select),
        SetExpr::Insert(stmt) | SetExpr::Update(stmt) => classify_statement(stmt),
    }
}

fn classify_select(select: &Select) -> (SafetyLevel, StatementType) {
    // SELECT ... INTO creates a table
    if select.into.is_some() {
        return (SafetyLevel::Destructive, StatementType::Other);
    }
    most_dangerous(select.from.iter().map(classify_table_with_joins))
}

fn classify_table_with_joins(twj: &TableWithJoins) -> (SafetyLevel, StatementType) {
    let joins = twj.joins.iter().map(|join| classify_table_factor(&join.relation));
    most_dangerous(std::iter::once(classify_table_factor(&twj.relation)).chain(joins))
}

fn classify_table_factor(factor: &TableFactor) -> (SafetyLevel, StatementType) {
    match factor {
        TableFactor::Derived { subquery, .. } => classify_query(subquery),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => classify_table_with_joins(table_with_joins),
        _ => (SafetyLevel::Safe, StatementType::Select),
    }
}
