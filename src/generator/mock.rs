//! Mock generator and classifier for testing.
//!
//! Provides deterministic responses based on input patterns, so the full
//! session pipeline can run without an inference endpoint.

use async_trait::async_trait;

use crate::error::Result;
use crate::generator::{Intent, IntentClassifier, SqlGenerator};

/// Mock SQL generator that returns canned SQL based on question patterns.
///
/// Used for unit testing and headless runs without a real model.
#[derive(Debug, Clone, Default)]
pub struct MockSqlGenerator {
    /// Custom response mappings (pattern -> response).
    custom_responses: Vec<(String, String)>,
}

impl MockSqlGenerator {
    /// Creates a new mock generator with default responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom response mapping.
    ///
    /// When the question contains `pattern`, the mock will return `response`.
    pub fn with_response(
        mut self,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.custom_responses
            .push((pattern.into(), response.into()));
        self
    }

    /// Generates a mock response based on the question.
    fn mock_response(&self, question: &str) -> String {
        let question_lower = question.to_lowercase();

        // Check custom responses first
        for (pattern, response) in &self.custom_responses {
            if question_lower.contains(&pattern.to_lowercase()) {
                return response.clone();
            }
        }

        // Default pattern matching
        if question_lower.contains("all users") || question_lower.contains("show users") {
            return "SELECT * FROM users".to_string();
        }

        if question_lower.contains("count") && question_lower.contains("orders") {
            return "SELECT COUNT(*) FROM orders".to_string();
        }

        if question_lower.contains("count") && question_lower.contains("users") {
            return "SELECT COUNT(*) FROM users".to_string();
        }

        if question_lower.contains("orders") && question_lower.contains("user") {
            return "SELECT o.* FROM orders o JOIN users u ON o.user_id = u.id".to_string();
        }

        "Error: Unable to generate SQL for this question.".to_string()
    }
}

#[async_trait]
impl SqlGenerator for MockSqlGenerator {
    async fn generate(&self, question: &str, _schema: &str) -> Result<String> {
        Ok(self.mock_response(question))
    }
}

/// A classifier that always returns the same intent.
#[derive(Debug, Clone, Copy)]
pub struct FixedClassifier(pub Intent);

#[async_trait]
impl IntentClassifier for FixedClassifier {
    async fn classify(&self, _text: &str) -> Intent {
        self.0
    }
}
