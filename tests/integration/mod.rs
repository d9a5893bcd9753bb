//! Integration tests for db-insight.

pub mod openai_test;
pub mod pipeline_test;
pub mod postgres_test;
