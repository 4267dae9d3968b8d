use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ReportError;
use crate::table::Table;

/// Menu entries, numbered as the operators know them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    DailyGpt,
    PeriodGpt,
    ProvincialSummary,
    Exit,
}

impl FromStr for RunMode {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(Self::DailyGpt),
            "2" => Ok(Self::PeriodGpt),
            "3" => Ok(Self::ProvincialSummary),
            "4" => Ok(Self::Exit),
            other => Err(ReportError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DailyGpt => write!(f, "1-单日GPT报表制作"),
            Self::PeriodGpt => write!(f, "2-周/月GPT报表制作"),
            Self::ProvincialSummary => write!(f, "3-省区汇总报表制作"),
            Self::Exit => write!(f, "4-退出"),
        }
    }
}

/// Which delay/route exports a GPT build reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodScope {
    Single,
    Multi,
}

impl PeriodScope {
    /// Single-day exports have short file names; weekly/monthly exports carry
    /// a date range and are longer.
    pub fn of_file_name(name: &str, single_name_max_chars: usize) -> Self {
        if name.chars().count() < single_name_max_chars {
            Self::Single
        } else {
            Self::Multi
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub table: Table,
}

/// Output of one run: named sheets written together.
#[derive(Debug, Clone, PartialEq)]
pub struct Workbook {
    pub name: String,
    pub sheets: Vec<Sheet>,
    /// Columns exported as numeric cells; every other column is text.
    pub numeric_columns: Vec<String>,
}

impl Workbook {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sheets: Vec::new(),
            numeric_columns: Vec::new(),
        }
    }

    pub fn with_numeric_columns(mut self, columns: Vec<String>) -> Self {
        self.numeric_columns = columns;
        self
    }

    pub fn with_sheet(mut self, name: impl Into<String>, table: Table) -> Self {
        self.sheets.push(Sheet {
            name: name.into(),
            table,
        });
        self
    }

    pub fn sheet(&self, name: &str) -> Option<&Table> {
        self.sheets.iter().find(|s| s.name == name).map(|s| &s.table)
    }
}
