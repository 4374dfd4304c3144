//! Question validation against the schema context.
//!
//! Checks whether a natural-language question references known schema
//! elements before it is handed to the SQL generator. A pure function over
//! the catalog, no side effects.

use crate::catalog::SchemaCatalog;

/// Returns true iff the question mentions, as a case-insensitive raw
/// substring, any table name currently in the context subset, or any column
/// name belonging to the first table of the context subset.
///
/// Current behavior: column names are checked for the *first* context table
/// only, not all tables in context. Matches are raw substrings with no
/// word-boundary check, so "user" inside "users" counts.
pub fn question_mentions_schema(question: &str, catalog: &SchemaCatalog) -> bool {
    let question = question.to_lowercase();

    for table in catalog.context_tables() {
        if question.contains(&table.to_lowercase()) {
            return true;
        }
    }

    if let Some(first) = catalog.first_context_table() {
        for column in &first.columns {
            if question.contains(&column.name.to_lowercase()) {
                return true;
            }
        }
    }

    false
}
