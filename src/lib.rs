//! db-insight - answer questions about a database with two hosted agents.
//!
//! A query planner agent writes SQL for the question, the SQL is executed,
//! and an analysis agent with the hosted code interpreter explains the result.
//! This library exposes the core modules for use by the binary and the
//! integration tests.

pub mod agent;
pub mod config;
pub mod credential;
pub mod db;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod safety;
