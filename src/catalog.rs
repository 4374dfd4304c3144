//! Schema catalog for askdb.
//!
//! Holds a structured model of the database's tables, columns, and key
//! constraints, plus the mutable context subset exposed to SQL generation.
//! The flattened text description handed to the generator is a projection of
//! the structured model, derived by one deterministic formatting function.
//! The model is authoritative; the string is never edited in place.

use serde::{Deserialize, Serialize};

use crate::db::DatabaseClient;
use crate::error::Result;

/// Separator between table lines in the flattened description.
const TABLE_SEPARATOR: &str = "\n [SEP] ";

/// Separator between fields within one table line.
const FIELD_SEPARATOR: &str = " , ";

/// Role a column plays in its table's key structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyRole {
    /// Not part of any key.
    #[default]
    None,
    /// Part of the primary key.
    Primary,
    /// Participates in a relation to another table (foreign-key column).
    Relation,
}

/// Represents a column in a table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,

    /// Raw declared type (e.g., "VARCHAR(50)").
    pub declared_type: String,

    /// Declared type with any parenthesized parameter suffix stripped
    /// (e.g., "VARCHAR").
    pub base_type: String,

    /// Key role of the column.
    pub key: KeyRole,

    /// Ordinal position within the table, starting at zero.
    pub ordinal: usize,
}

impl ColumnDescriptor {
    /// Creates a new column descriptor with the given name and declared type.
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        let declared_type = declared_type.into();
        let base_type = strip_type_params(&declared_type);
        Self {
            name: name.into(),
            declared_type,
            base_type,
            key: KeyRole::None,
            ordinal: 0,
        }
    }

    /// Marks the column as part of the primary key.
    pub fn primary(self) -> Self {
        Self {
            key: KeyRole::Primary,
            ..self
        }
    }

    /// Marks the column as a foreign-key column.
    pub fn relation(self) -> Self {
        Self {
            key: KeyRole::Relation,
            ..self
        }
    }
}

/// Represents a database table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TableDescriptor {
    /// Table name.
    pub name: String,

    /// Columns in declaration order.
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    /// Creates a new table with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Appends a column, assigning its ordinal position.
    pub fn with_column(mut self, mut column: ColumnDescriptor) -> Self {
        column.ordinal = self.columns.len();
        self.columns.push(column);
        self
    }

    /// Returns the names of the primary-key columns, in declaration order.
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.key == KeyRole::Primary)
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Read-only schema projection sent to clients on `get_schema_context`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaPayload {
    /// One entry per table in the full catalog.
    pub schema_data: Vec<TablePayload>,

    /// Names of the tables currently in the context subset.
    pub tables: Vec<String>,
}

/// One table in the exported schema payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TablePayload {
    #[serde(rename = "tableName")]
    pub table_name: String,
    pub columns: Vec<ColumnPayload>,
}

/// One column in the exported schema payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnPayload {
    pub name: String,
    #[serde(rename = "dataType")]
    pub data_type: String,
}

/// Structured model of the database schema plus the current context subset.
///
/// The full catalog is rebuilt only by [`SchemaCatalog::refresh`]; the context
/// subset and its flattened description change through
/// [`SchemaCatalog::restrict_context`]. The context is always a subset of the
/// full catalog, in catalog order.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    tables: Vec<TableDescriptor>,
    context: Vec<String>,
    description: String,
}

impl SchemaCatalog {
    /// Creates an empty catalog. `refresh` must run before the catalog is
    /// usable for generation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog from pre-built descriptors, with the context set to
    /// every table. Used by tests and the mock stack.
    pub fn from_tables(tables: Vec<TableDescriptor>) -> Self {
        let context = tables.iter().map(|t| t.name.clone()).collect();
        let mut catalog = Self {
            tables,
            context,
            description: String::new(),
        };
        catalog.rebuild_description();
        catalog
    }

    /// Rebuilds the full catalog from live introspection.
    ///
    /// Resets the context subset to all tables and regenerates the flattened
    /// description. Any introspection failure surfaces as `SchemaUnavailable`.
    pub async fn refresh(&mut self, db: &dyn DatabaseClient) -> Result<()> {
        let tables = db.introspect_tables().await?;

        self.context = tables.iter().map(|t| t.name.clone()).collect();
        self.tables = tables;
        self.rebuild_description();
        Ok(())
    }

    /// Restricts the context subset to the named tables.
    ///
    /// Names not present in the catalog are silently dropped. The full
    /// catalog is never mutated. Returns the names actually included, in
    /// catalog order. Idempotent.
    pub fn restrict_context(&mut self, table_names: &[String]) -> Vec<String> {
        self.context = self
            .tables
            .iter()
            .filter(|t| table_names.contains(&t.name))
            .map(|t| t.name.clone())
            .collect();
        self.rebuild_description();
        self.context.clone()
    }

    /// Returns the flattened description of the tables currently in context.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the names of the tables currently in context, in catalog order.
    pub fn context_tables(&self) -> &[String] {
        &self.context
    }

    /// Returns the first table of the context subset, if any.
    pub fn first_context_table(&self) -> Option<&TableDescriptor> {
        let name = self.context.first()?;
        self.tables.iter().find(|t| &t.name == name)
    }

    /// Returns true if the catalog has never been populated.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Produces the read-only schema projection: every table in the full
    /// catalog with data types upper-cased, plus the current context names.
    pub fn export_payload(&self) -> SchemaPayload {
        let schema_data = self
            .tables
            .iter()
            .map(|table| TablePayload {
                table_name: table.name.clone(),
                columns: table
                    .columns
                    .iter()
                    .map(|c| ColumnPayload {
                        name: c.name.clone(),
                        data_type: c.declared_type.to_uppercase(),
                    })
                    .collect(),
            })
            .collect();

        SchemaPayload {
            schema_data,
            tables: self.context.clone(),
        }
    }

    fn rebuild_description(&mut self) {
        self.description = self
            .tables
            .iter()
            .filter(|t| self.context.contains(&t.name))
            .map(format_table_line)
            .collect::<Vec<_>>()
            .join(TABLE_SEPARATOR);
    }
}

/// Formats one table's description line.
///
/// `"table" , "col" TYPE , ... [, primary key: "c1", "c2"]`. The primary
/// key clause appears only when the table declares at least one key column.
fn format_table_line(table: &TableDescriptor) -> String {
    let mut fields = vec![format!("\"{}\"", table.name)];

    for column in &table.columns {
        fields.push(format!("\"{}\" {}", column.name, column.base_type));
    }

    let primary_keys: Vec<String> = table
        .primary_key()
        .into_iter()
        .map(|name| format!("\"{name}\""))
        .collect();
    if !primary_keys.is_empty() {
        fields.push(format!("primary key: {}", primary_keys.join(", ")));
    }

    fields.join(FIELD_SEPARATOR)
}

/// Strips a parenthesized parameter suffix from a declared type.
///
/// `"VARCHAR(50)"` becomes `"VARCHAR"`; types without parameters pass
/// through unchanged.
fn strip_type_params(declared_type: &str) -> String {
    match declared_type.find('(') {
        Some(idx) => declared_type[..idx].to_string(),
        None => declared_type.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn users_table() -> TableDescriptor {
        TableDescriptor::new("users")
            .with_column(ColumnDescriptor::new("id", "INT").primary())
            .with_column(ColumnDescriptor::new("name", "VARCHAR(50)"))
    }

    fn orders_table() -> TableDescriptor {
        TableDescriptor::new("orders")
            .with_column(ColumnDescriptor::new("id", "INT").primary())
            .with_column(ColumnDescriptor::new("user_id", "INT").relation())
            .with_column(ColumnDescriptor::new("total", "NUMERIC(10,2)"))
    }

    #[test]
    fn test_strip_type_params() {
        assert_eq!(strip_type_params("VARCHAR(50)"), "VARCHAR");
        assert_eq!(strip_type_params("NUMERIC(10,2)"), "NUMERIC");
        assert_eq!(strip_type_params("INT"), "INT");
        assert_eq!(strip_type_params("character varying(255)"), "character varying");
    }

    #[test]
    fn test_format_table_line_with_primary_key() {
        let line = format_table_line(&users_table());
        assert_eq!(line, "\"users\" , \"id\" INT , \"name\" VARCHAR , primary key: \"id\"");
    }

    #[test]
    fn test_format_table_line_without_primary_key() {
        let table = TableDescriptor::new("log")
            .with_column(ColumnDescriptor::new("message", "TEXT"))
            .with_column(ColumnDescriptor::new("at", "TIMESTAMP"));

        let line = format_table_line(&table);
        assert_eq!(line, "\"log\" , \"message\" TEXT , \"at\" TIMESTAMP");
        assert!(!line.contains("primary key"));
    }

    #[test]
    fn test_relation_columns_are_not_rendered_as_keys() {
        let line = format_table_line(&orders_table());
        assert_eq!(
            line,
            "\"orders\" , \"id\" INT , \"user_id\" INT , \"total\" NUMERIC , primary key: \"id\""
        );
    }

    #[test]
    fn test_composite_primary_key() {
        let table = TableDescriptor::new("memberships")
            .with_column(ColumnDescriptor::new("user_id", "INT").primary())
            .with_column(ColumnDescriptor::new("group_id", "INT").primary());

        let line = format_table_line(&table);
        assert!(line.ends_with("primary key: \"user_id\", \"group_id\""));
    }

    #[test]
    fn test_description_one_line_per_table() {
        let catalog = SchemaCatalog::from_tables(vec![users_table(), orders_table()]);

        let lines: Vec<&str> = catalog.description().split(TABLE_SEPARATOR).collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("\"users\""));
        assert!(lines[1].starts_with("\"orders\""));
    }

    #[test]
    fn test_restrict_context_filters_description() {
        let mut catalog = SchemaCatalog::from_tables(vec![users_table(), orders_table()]);

        let included = catalog.restrict_context(&["orders".to_string()]);

        assert_eq!(included, vec!["orders"]);
        assert!(catalog.description().starts_with("\"orders\""));
        assert!(!catalog.description().contains("\"users\""));
        // The full catalog is untouched
        assert_eq!(catalog.export_payload().schema_data.len(), 2);
    }

    #[test]
    fn test_restrict_context_drops_unknown_names() {
        let mut catalog = SchemaCatalog::from_tables(vec![users_table(), orders_table()]);

        let included = catalog.restrict_context(&[
            "widgets".to_string(),
            "users".to_string(),
        ]);

        assert_eq!(included, vec!["users"]);
    }

    #[test]
    fn test_restrict_context_preserves_catalog_order() {
        let mut catalog = SchemaCatalog::from_tables(vec![users_table(), orders_table()]);

        // Request order does not matter; catalog order wins
        let included =
            catalog.restrict_context(&["orders".to_string(), "users".to_string()]);

        assert_eq!(included, vec!["users", "orders"]);
    }

    #[test]
    fn test_restrict_context_is_idempotent() {
        let mut catalog = SchemaCatalog::from_tables(vec![users_table(), orders_table()]);

        let first = catalog.restrict_context(&["users".to_string()]);
        let description_after_first = catalog.description().to_string();
        let second = catalog.restrict_context(&["users".to_string()]);

        assert_eq!(first, second);
        assert_eq!(catalog.description(), description_after_first);
    }

    #[test]
    fn test_export_payload_uppercases_types() {
        let catalog = SchemaCatalog::from_tables(vec![TableDescriptor::new("users")
            .with_column(ColumnDescriptor::new("name", "varchar(50)"))]);

        let payload = catalog.export_payload();

        assert_eq!(payload.schema_data.len(), 1);
        assert_eq!(payload.schema_data[0].table_name, "users");
        assert_eq!(payload.schema_data[0].columns[0].data_type, "VARCHAR(50)");
    }

    #[test]
    fn test_export_payload_tables_follow_context() {
        let mut catalog = SchemaCatalog::from_tables(vec![users_table(), orders_table()]);
        catalog.restrict_context(&["users".to_string()]);

        let payload = catalog.export_payload();

        assert_eq!(payload.tables, vec!["users"]);
        // schema_data still covers the full catalog
        assert_eq!(payload.schema_data.len(), 2);
    }

    #[test]
    fn test_export_payload_serializes_camel_case() {
        let catalog = SchemaCatalog::from_tables(vec![users_table()]);
        let json = serde_json::to_value(catalog.export_payload()).unwrap();

        assert!(json["schema_data"][0]["tableName"].is_string());
        assert!(json["schema_data"][0]["columns"][0]["dataType"].is_string());
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = SchemaCatalog::new();
        assert!(catalog.is_empty());
        assert_eq!(catalog.description(), "");
        assert!(catalog.context_tables().is_empty());
        assert!(catalog.first_context_table().is_none());
    }

    #[test]
    fn test_first_context_table_follows_restriction() {
        let mut catalog = SchemaCatalog::from_tables(vec![users_table(), orders_table()]);
        assert_eq!(catalog.first_context_table().unwrap().name, "users");

        catalog.restrict_context(&["orders".to_string()]);
        assert_eq!(catalog.first_context_table().unwrap().name, "orders");
    }

    #[test]
    fn test_primary_key_accessor() {
        assert_eq!(users_table().primary_key(), vec!["id"]);
        assert!(TableDescriptor::new("log").primary_key().is_empty());
    }

    #[test]
    fn test_column_ordinals_assigned_in_order() {
        let table = orders_table();
        let ordinals: Vec<usize> = table.columns.iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2]);
    }
}
