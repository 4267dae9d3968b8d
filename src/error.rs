use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    /// Required output columns absent after reconciliation.
    #[error("schema integrity error: required columns missing: {}", .missing.join(", "))]
    SchemaIntegrity { missing: Vec<String> },

    #[error("table '{table}': missing column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("no {role} source file found")]
    MissingSource { role: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("unknown mode: {0}")]
    UnknownMode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Excel read error: {0}")]
    Excel(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Excel write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

pub type Result<T> = std::result::Result<T, ReportError>;
