//! SQL generation for askdb.
//!
//! The natural-language-to-SQL generator and the intent classifier are
//! external collaborators consumed through narrow traits. The generation
//! pipeline flags its own failures in-band: anything it cannot turn into SQL
//! comes back as text carrying the error marker, which downstream code
//! treats as "do not execute".

pub mod http;
pub mod mock;

pub use http::{HttpGenerator, HttpGeneratorConfig};
pub use mock::{FixedClassifier, MockSqlGenerator};

use async_trait::async_trait;
use std::str::FromStr;

use crate::catalog::SchemaCatalog;
use crate::error::Result;
use crate::validate::question_mentions_schema;

/// Marker substring flagging generated text as an error rather than SQL.
/// Text carrying it must never reach the database.
pub const ERROR_MARKER: &str = "Error:";

/// Canned generator output when the schema description is empty.
pub const SCHEMA_MISSING_TEXT: &str = "Error: Schema could not be generated from the database.";

/// Canned generator output when the question references nothing in the schema.
pub const INVALID_QUESTION_TEXT: &str =
    "Error: The question references invalid tables or columns not found in the schema.";

/// Classified intent of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// The text is a question answerable with a database query.
    Sql,
    /// Anything else: small talk, commands, noise.
    Other,
}

/// Trait for NL-to-SQL generators.
///
/// Implementations receive the question and the flattened schema description
/// and return SQL text. There is no syntactic-validity guarantee; the output
/// may itself carry [`ERROR_MARKER`].
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    /// Generates SQL text for the given question and schema description.
    async fn generate(&self, question: &str, schema: &str) -> Result<String>;
}

/// Trait for intent classifiers.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Classifies a piece of inbound text.
    async fn classify(&self, text: &str) -> Intent;
}

/// Generator provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeneratorProvider {
    /// HTTP inference endpoint (Ollama-compatible).
    #[default]
    Http,
    /// Mock generator for testing (no endpoint required).
    Mock,
}

impl GeneratorProvider {
    /// Returns the provider as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Mock => "mock",
        }
    }
}

impl FromStr for GeneratorProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown generator provider: {}", s)),
        }
    }
}

impl std::fmt::Display for GeneratorProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runs the full generation pipeline for one question.
///
/// An empty schema description or a question that references nothing in the
/// current context short-circuits to marker text without calling the
/// generator. Otherwise the generator's output is returned as-is.
pub async fn generate_sql_query(
    question: &str,
    catalog: &SchemaCatalog,
    generator: &dyn SqlGenerator,
) -> Result<String> {
    if catalog.description().is_empty() {
        return Ok(SCHEMA_MISSING_TEXT.to_string());
    }

    if !question_mentions_schema(question, catalog) {
        return Ok(INVALID_QUESTION_TEXT.to_string());
    }

    generator.generate(question, catalog.description()).await
}

/// Keyword-based intent classifier.
///
/// A lightweight stand-in for a trained classifier: text that looks like a
/// data question (query verbs, interrogatives, SQL keywords) is `Sql`,
/// everything else is `Other`.
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    /// Creates a new keyword classifier.
    pub fn new() -> Self {
        Self
    }
}

const SQL_INTENT_KEYWORDS: &[&str] = &[
    "show", "list", "count", "how many", "select", "find", "which", "what", "who", "average",
    "sum", "total", "get", "fetch", "top", "latest", "newest", "oldest",
];

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> Intent {
        let text = text.to_lowercase();
        if SQL_INTENT_KEYWORDS.iter().any(|kw| text.contains(kw)) {
            Intent::Sql
        } else {
            Intent::Other
        }
    }
}
