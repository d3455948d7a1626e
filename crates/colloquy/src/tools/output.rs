use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::errors::{AgentError, AgentResult};

/// Tabular tool result, such as the rows of a query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new<C: Into<String>>(columns: impl IntoIterator<Item = C>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_row(mut self, row: Vec<Value>) -> Self {
        self.rows.push(row);
        self
    }
}

/// The raw result of a tool invocation, before it is made transportable
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// A typed result exported to its canonical json form
    Structured(Value),
    /// A plain mapping, passed through as is
    Mapping(Map<String, Value>),
    Table(Table),
    /// Anything else, carried by its textual representation
    Text(String),
}

impl ToolOutput {
    /// Export a typed result through its `Serialize` implementation
    pub fn structured<T: Serialize>(value: &T) -> AgentResult<Self> {
        serde_json::to_value(value)
            .map(ToolOutput::Structured)
            .map_err(|e| AgentError::ExecutionError(format!("Failed to export tool result: {}", e)))
    }

    pub fn text<S: Into<String>>(text: S) -> Self {
        ToolOutput::Text(text.into())
    }

    /// Classify an untyped json value: objects are mappings, anything else is text
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => ToolOutput::Mapping(map),
            Value::String(text) => ToolOutput::Text(text),
            other => ToolOutput::Text(other.to_string()),
        }
    }

    /// Convert into a json value any caller can transport without knowing the tool
    pub fn normalize(self) -> Value {
        match self {
            ToolOutput::Structured(value) => value,
            ToolOutput::Mapping(map) => Value::Object(map),
            ToolOutput::Table(table) => json!({
                "columns": table.columns,
                "rows": table.rows,
            }),
            ToolOutput::Text(text) => json!({ "value": text }),
        }
    }
}

impl From<Map<String, Value>> for ToolOutput {
    fn from(map: Map<String, Value>) -> Self {
        ToolOutput::Mapping(map)
    }
}

impl From<Table> for ToolOutput {
    fn from(table: Table) -> Self {
        ToolOutput::Table(table)
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        ToolOutput::Text(text)
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        ToolOutput::Text(text.to_string())
    }
}
