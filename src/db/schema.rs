use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Immutable description of the tables the gateway may touch.
///
/// Built once at startup and shared read-only. Both the validator whitelist
/// and the SQL prompt derive from this one object, so they cannot drift.
#[derive(Debug, Clone)]
pub struct SchemaCatalog {
    tables: BTreeMap<String, Table>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub is_primary_key: bool,
    pub foreign_key_table: Option<String>,
    pub foreign_key_column: Option<String>,
}

impl ColumnInfo {
    fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_string(),
            is_primary_key: false,
            foreign_key_table: None,
            foreign_key_column: None,
        }
    }

    fn primary_key(name: &str, data_type: &str) -> Self {
        Self {
            is_primary_key: true,
            ..Self::new(name, data_type)
        }
    }

    fn foreign_key(name: &str, data_type: &str, table: &str, column: &str) -> Self {
        Self {
            foreign_key_table: Some(table.to_string()),
            foreign_key_column: Some(column.to_string()),
            ..Self::new(name, data_type)
        }
    }
}

impl SchemaCatalog {
    /// The fixed banking schema: customers, accounts, transactions.
    pub fn banking() -> Self {
        let tables = [
            Table {
                name: "customers".to_string(),
                columns: vec![
                    ColumnInfo::primary_key("id", "integer"),
                    ColumnInfo::new("name", "text"),
                    ColumnInfo::new("email", "text"),
                    ColumnInfo::new("created_at", "timestamp"),
                ],
            },
            Table {
                name: "accounts".to_string(),
                columns: vec![
                    ColumnInfo::primary_key("id", "integer"),
                    ColumnInfo::foreign_key("customer_id", "integer", "customers", "id"),
                    ColumnInfo::new("account_number", "text"),
                    ColumnInfo::new("balance", "numeric"),
                    ColumnInfo::new("created_at", "timestamp"),
                ],
            },
            Table {
                name: "transactions".to_string(),
                columns: vec![
                    ColumnInfo::primary_key("id", "integer"),
                    ColumnInfo::foreign_key("account_id", "integer", "accounts", "id"),
                    ColumnInfo::new("type", "text ('credit' | 'debit')"),
                    ColumnInfo::new("amount", "numeric"),
                    ColumnInfo::new("created_at", "timestamp"),
                ],
            },
        ];

        Self {
            tables: tables
                .into_iter()
                .map(|t| (t.name.clone(), t))
                .collect(),
        }
    }

    /// Canonical lowercase names of every permitted table.
    pub fn allowed_tables(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Case-insensitive membership test.
    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(&name.to_lowercase())
    }

    pub fn tables(&self) -> Vec<&Table> {
        self.tables.values().collect()
    }

    /// Markdown rendering injected into the SQL generation prompt.
    pub fn as_prompt_text(&self) -> String {
        let mut output = String::from("Tables:\n");

        for table in self.tables.values() {
            output.push_str(&format!("\n{}:\n", table.name));

            for col in &table.columns {
                let pk = if col.is_primary_key { " PRIMARY KEY" } else { "" };
                let fk = match (&col.foreign_key_table, &col.foreign_key_column) {
                    (Some(t), Some(c)) => format!(" -> {}.{}", t, c),
                    _ => String::new(),
                };

                output.push_str(&format!("  - {} ({}){}{}\n", col.name, col.data_type, pk, fk));
            }
        }

        output
    }
}
