//! Report tables: a named polars `DataFrame` whose columns are all nullable
//! strings. Every operation returns a new table; inputs are never modified.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use polars::prelude::*;

use crate::error::{ReportError, Result};

/// `None` is a missing cell (empty in the source sheet).
pub type Cell = Option<String>;

const LEFT_ROW: &str = "__left_row";
const RIGHT_ROW: &str = "__right_row";

#[derive(Clone)]
pub struct Table {
    name: String,
    df: DataFrame,
}

/// A left join result: the joined table and, for every left row, the row of
/// the right table it was matched with.
pub struct Joined {
    pub table: Table,
    pub matches: Vec<Option<usize>>,
}

/// Blank headers become `Unnamed: <i>`, repeated ones get a `.<n>` suffix.
fn unique_names(columns: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(columns.len());
    for (i, name) in columns.into_iter().enumerate() {
        let base = if name.is_empty() {
            format!("Unnamed: {i}")
        } else {
            name
        };
        let mut candidate = base.clone();
        let mut n = 1;
        while seen.contains(&candidate) {
            candidate = format!("{base}.{n}");
            n += 1;
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

fn string_column(name: &str, values: Vec<Cell>) -> Column {
    Column::new(name.into(), values)
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self::from_rows(name, columns, Vec::new())
    }

    /// Build a table from raw rows, padding short rows with missing cells and
    /// dropping surplus trailing cells.
    pub fn from_rows(name: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let columns = unique_names(columns);
        let width = columns.len();
        let mut values: Vec<Vec<Cell>> = vec![Vec::with_capacity(rows.len()); width];
        for mut row in rows {
            row.resize(width, None);
            for (column, cell) in values.iter_mut().zip(row) {
                column.push(cell);
            }
        }
        let series: Vec<Column> = columns
            .iter()
            .zip(values)
            .map(|(name, v)| string_column(name, v))
            .collect();
        // Names are unique and lengths equal, so construction cannot fail.
        let df = DataFrame::new(series).unwrap_or_else(|_| DataFrame::empty());
        Self {
            name: name.into(),
            df,
        }
    }

    fn with_frame(&self, df: DataFrame) -> Table {
        Table {
            name: self.name.clone(),
            df,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn columns(&self) -> Vec<String> {
        self.df
            .get_column_names_str()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.df.get_column_index(column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    /// Like [`Table::column_index`] but a missing column is an error naming
    /// this table.
    pub fn require(&self, column: &str) -> Result<usize> {
        self.column_index(column).ok_or_else(|| ReportError::MissingColumn {
            table: self.name.clone(),
            column: column.to_string(),
        })
    }

    fn strings(&self, col: usize) -> Option<&StringChunked> {
        self.df
            .get_columns()
            .get(col)?
            .as_materialized_series()
            .str()
            .ok()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.strings(col)?.get(row)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        self.cell(row, self.column_index(column)?)
    }

    /// All cells of one column, top to bottom.
    pub fn column_values(&self, column: &str) -> Result<Vec<Option<&str>>> {
        let col = self.require(column)?;
        Ok(match self.strings(col) {
            Some(ca) => ca.into_iter().collect(),
            None => vec![None; self.len()],
        })
    }

    /// Rows in order, each as its cells in column order.
    pub fn rows(&self) -> Vec<Vec<Option<&str>>> {
        let columns: Vec<Option<&StringChunked>> =
            (0..self.df.width()).map(|c| self.strings(c)).collect();
        (0..self.len())
            .map(|row| {
                columns
                    .iter()
                    .map(|ca| ca.and_then(|ca| ca.get(row)))
                    .collect()
            })
            .collect()
    }

    /// Distinct non-missing values of a column, sorted.
    pub fn distinct(&self, column: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .column_values(column)?
            .into_iter()
            .flatten()
            .map(str::to_string)
            .collect())
    }

    /// Project to the given columns, in the given order.
    pub fn select(&self, columns: &[String]) -> Result<Table> {
        for c in columns {
            self.require(c)?;
        }
        let df = self.df.select(columns.iter().map(String::as_str))?;
        Ok(self.with_frame(df))
    }

    /// Rename columns through `map`; unmapped columns keep their name.
    pub fn renamed(&self, map: &BTreeMap<String, String>) -> Result<Table> {
        let names: Vec<String> = self
            .columns()
            .into_iter()
            .map(|c| map.get(&c).cloned().unwrap_or(c))
            .collect();
        let mut df = self.df.clone();
        df.set_column_names(names.iter().map(String::as_str))?;
        Ok(self.with_frame(df))
    }

    /// Replace every cell of `column` with `f(cell)`.
    pub fn map_column<F>(&self, column: &str, f: F) -> Result<Table>
    where
        F: Fn(Option<&str>) -> Cell,
    {
        let values: Vec<Cell> = self.column_values(column)?.into_iter().map(f).collect();
        self.with_column(column, values)
    }

    /// Set a column from `values` (one per row), replacing it when it exists
    /// and appending it otherwise.
    pub fn with_column(&self, column: &str, mut values: Vec<Cell>) -> Result<Table> {
        values.resize(self.len(), None);
        let mut df = self.df.clone();
        df.with_column(string_column(column, values))?;
        Ok(self.with_frame(df))
    }

    /// Move `column` so it ends up at `index` (clamped to the last position).
    pub fn move_column(&self, column: &str, index: usize) -> Result<Table> {
        let from = self.require(column)?;
        let mut order = self.columns();
        let name = order.remove(from);
        let to = index.min(order.len());
        order.insert(to, name);
        self.select(&order)
    }

    /// Rows whose `column` equals `value`.
    pub fn filter_eq(&self, column: &str, value: &str) -> Result<Table> {
        self.require(column)?;
        let mask = self.df.column(column)?.as_materialized_series().str()?.equal(value);
        Ok(self.with_frame(self.df.filter(&mask)?))
    }

    /// Fill every missing cell with the nearest earlier non-missing value of
    /// the same column. Leading gaps stay missing.
    pub fn forward_filled(&self) -> Result<Table> {
        let df = self.df.fill_null(FillNullStrategy::Forward(None))?;
        Ok(self.with_frame(df))
    }

    /// Stack tables vertically. Columns are matched by name; the result has
    /// the union of columns in first-seen order.
    pub fn concat(name: impl Into<String>, tables: &[Table]) -> Result<Table> {
        let mut columns: Vec<String> = Vec::new();
        for t in tables {
            for c in t.columns() {
                if !columns.contains(&c) {
                    columns.push(c);
                }
            }
        }

        let mut stacked: Option<DataFrame> = None;
        for t in tables {
            let mut df = t.df.clone();
            for c in &columns {
                if df.get_column_index(c).is_none() {
                    df.with_column(Column::full_null(c.as_str().into(), t.len(), &DataType::String))?;
                }
            }
            let df = df.select(columns.iter().map(String::as_str))?;
            match stacked.as_mut() {
                Some(acc) => {
                    acc.vstack_mut(&df)?;
                }
                None => stacked = Some(df),
            }
        }

        let name = name.into();
        Ok(match stacked {
            Some(df) => Table { name, df },
            None => Table::new(name, columns),
        })
    }

    /// Stable ascending sort by the given columns; missing cells sort last.
    pub fn sorted_by(&self, keys: &[String]) -> Result<Table> {
        for k in keys {
            self.require(k)?;
        }
        let options = SortMultipleOptions::default()
            .with_maintain_order(true)
            .with_nulls_last(true);
        let df = self
            .df
            .sort(keys.iter().map(String::as_str).collect::<Vec<_>>(), options)?;
        Ok(self.with_frame(df))
    }

    /// Key columns plus the original row number, keeping only the first row
    /// of every key. Rows with a missing key cell can never match and are
    /// left out.
    fn first_per_key(&self, keys: &[&str]) -> Result<DataFrame> {
        let key_values = keys
            .iter()
            .map(|k| self.column_values(k))
            .collect::<Result<Vec<_>>>()?;
        let mut seen: HashSet<Vec<&str>> = HashSet::new();
        let first: Vec<bool> = (0..self.len())
            .map(|row| {
                let key: Option<Vec<&str>> = key_values.iter().map(|col| col[row]).collect();
                key.is_some_and(|k| seen.insert(k))
            })
            .collect();
        let mask = BooleanChunked::from_slice("first".into(), &first);
        let frame = self
            .df
            .select(keys.iter().copied())?
            .with_row_index(RIGHT_ROW.into(), None)?;
        Ok(frame.filter(&mask)?)
    }

    /// Left join on the key columns only, returning the matched right row
    /// index per left row.
    fn match_index(&self, right: &Table, left_keys: &[&str], right_keys: &[&str]) -> Result<IdxCa> {
        for k in left_keys {
            self.require(k)?;
        }
        let left = self
            .df
            .select(left_keys.iter().copied())?
            .with_row_index(LEFT_ROW.into(), None)?;
        let right = right.first_per_key(right_keys)?;

        let left_on: Vec<Expr> = left_keys.iter().map(|k| col(*k)).collect();
        let right_on: Vec<Expr> = right_keys.iter().map(|k| col(*k)).collect();
        let joined = left
            .lazy()
            .join(right.lazy(), left_on, right_on, JoinArgs::new(JoinType::Left))
            .sort([LEFT_ROW], SortMultipleOptions::default())
            .collect()?;
        Ok(joined
            .column(RIGHT_ROW)?
            .as_materialized_series()
            .idx()?
            .clone())
    }

    /// For every row, the first row of `right` with an equal key, if any.
    pub fn join_index(
        &self,
        right: &Table,
        left_keys: &[&str],
        right_keys: &[&str],
    ) -> Result<Vec<Option<usize>>> {
        let index = self.match_index(right, left_keys, right_keys)?;
        Ok(index.into_iter().map(|r| r.map(|r| r as usize)).collect())
    }

    /// Left join anchored on `self`: every left row is kept exactly once and
    /// receives the non-key columns of the first right row with an equal key.
    /// Right columns whose name already exists on the left get a `_y` suffix.
    pub fn left_join(&self, right: &Table, left_keys: &[&str], right_keys: &[&str]) -> Result<Joined> {
        let index = self.match_index(right, left_keys, right_keys)?;

        let existing = self.columns();
        let carried: Vec<String> = right
            .columns()
            .into_iter()
            .filter(|c| !right_keys.contains(&c.as_str()))
            .collect();
        let renamed: Vec<String> = carried
            .iter()
            .map(|c| {
                if existing.contains(c) {
                    format!("{c}_y")
                } else {
                    c.clone()
                }
            })
            .collect();

        let mut gathered = right
            .df
            .select(carried.iter().map(String::as_str))?
            .take(&index)?;
        gathered.set_column_names(renamed.iter().map(String::as_str))?;
        let mut df = self.df.clone();
        df.hstack_mut(gathered.get_columns())?;

        let matches = index.into_iter().map(|r| r.map(|r| r as usize)).collect();
        Ok(Joined {
            table: self.with_frame(df),
            matches,
        })
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::new("", Vec::new())
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.columns() == other.columns() && self.rows() == other.rows()
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("columns", &self.columns())
            .field("rows", &self.len())
            .finish()
    }
}
