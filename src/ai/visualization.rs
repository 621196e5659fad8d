use serde::{Deserialize, Serialize};

/// Supported chart suggestions with their use cases:
/// - Bar: comparing discrete categories (e.g., balances by customer)
/// - Line: trends over time (e.g., transaction volume by day)
/// - Pie / Doughnut: part-to-whole, best for few categories
/// - Table: plain tabular data, the safe default
/// - Metric: a single headline number (e.g., a COUNT)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Doughnut,
    Table,
    Metric,
}

impl ChartKind {
    /// Parse a chart name from model output. Anything outside the closed set
    /// coerces to `Table` rather than failing the request.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "bar" => ChartKind::Bar,
            "line" => ChartKind::Line,
            "pie" => ChartKind::Pie,
            "doughnut" => ChartKind::Doughnut,
            "metric" => ChartKind::Metric,
            _ => ChartKind::Table,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Pie => "pie",
            ChartKind::Doughnut => "doughnut",
            ChartKind::Table => "table",
            ChartKind::Metric => "metric",
        }
    }
}
