//! Time-indexed numeric data returned by fetch capabilities.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

/// Whether a dataset came back as a single series or a multi-column table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Series,
    Table,
}

/// A UTC timestamp index with one or more aligned float columns.
///
/// A series is a dataset with exactly one column, named after the series.
/// Missing observations are stored as `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    index: Vec<DateTime<Utc>>,
    columns: IndexMap<String, Vec<f64>>,
    shape: Shape,
}

impl Dataset {
    /// Build a named series. Fails when index and values differ in length.
    pub fn series(
        name: impl Into<String>,
        index: Vec<DateTime<Utc>>,
        values: Vec<f64>,
    ) -> Result<Self, String> {
        if index.len() != values.len() {
            return Err(format!(
                "series has {} timestamps but {} values",
                index.len(),
                values.len()
            ));
        }
        let mut columns = IndexMap::new();
        columns.insert(name.into(), values);
        Ok(Self {
            index,
            columns,
            shape: Shape::Series,
        })
    }

    /// Build a table from named columns aligned on `index`.
    pub fn table(
        index: Vec<DateTime<Utc>>,
        columns: IndexMap<String, Vec<f64>>,
    ) -> Result<Self, String> {
        if columns.is_empty() {
            return Err("table has no columns".to_string());
        }
        if let Some((name, values)) = columns.iter().find(|(_, v)| v.len() != index.len()) {
            return Err(format!(
                "column '{}' has {} values for {} timestamps",
                name,
                values.len(),
                index.len()
            ));
        }
        Ok(Self {
            index,
            columns,
            shape: Shape::Table,
        })
    }

    /// Series from `(timestamp, value)` pairs, kept in the given order.
    pub fn from_pairs(
        name: impl Into<String>,
        pairs: impl IntoIterator<Item = (DateTime<Utc>, f64)>,
    ) -> Self {
        let (index, values): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        let mut columns = IndexMap::new();
        columns.insert(name.into(), values);
        Self {
            index,
            columns,
            shape: Shape::Series,
        }
    }

    /// Reject indexes that are not strictly increasing (unsorted or duplicate keys).
    pub fn validate(&self) -> Result<(), String> {
        match self.index.windows(2).find(|pair| pair[0] >= pair[1]) {
            Some(pair) if pair[0] == pair[1] => {
                Err(format!("duplicate timestamp {} in index", pair[0]))
            }
            Some(pair) => Err(format!(
                "index is not sorted: {} precedes {}",
                pair[0], pair[1]
            )),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    pub fn columns(&self) -> &IndexMap<String, Vec<f64>> {
        &self.columns
    }

    /// Series name; `None` for tables and unnamed series.
    pub fn name(&self) -> Option<&str> {
        match self.shape {
            Shape::Series => self
                .columns
                .keys()
                .next()
                .map(String::as_str)
                .filter(|n| !n.is_empty()),
            Shape::Table => None,
        }
    }

    /// Values of a series; `None` for tables.
    pub fn series_values(&self) -> Option<&[f64]> {
        match self.shape {
            Shape::Series => self.columns.values().next().map(Vec::as_slice),
            Shape::Table => None,
        }
    }

    /// Every non-missing cell, column by column.
    pub fn valid_values(&self) -> Vec<f64> {
        self.columns
            .values()
            .flat_map(|c| c.iter().copied())
            .filter(|v| !v.is_nan())
            .collect()
    }

    /// True when any column holds an observation at `row`.
    pub fn row_has_value(&self, row: usize) -> bool {
        self.columns.values().any(|c| !c[row].is_nan())
    }

    /// True when every column holds an observation at `row`.
    pub fn row_is_complete(&self, row: usize) -> bool {
        self.columns.values().all(|c| !c[row].is_nan())
    }

    /// Keep only the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Dataset {
        Dataset {
            index: rows.iter().map(|&r| self.index[r]).collect(),
            columns: self
                .columns
                .iter()
                .map(|(name, values)| (name.clone(), rows.iter().map(|&r| values[r]).collect()))
                .collect(),
            shape: self.shape,
        }
    }

    /// Keep the rows whose timestamp satisfies `keep`.
    pub fn filter_index(&self, keep: impl Fn(&DateTime<Utc>) -> bool) -> Dataset {
        let rows: Vec<usize> = (0..self.len()).filter(|&r| keep(&self.index[r])).collect();
        self.select_rows(&rows)
    }

    /// Apply `f` to every cell.
    pub fn map_values(&self, f: impl Fn(f64) -> f64) -> Dataset {
        self.map_columns(|values| values.iter().map(|&v| f(v)).collect())
    }

    /// Replace each column by `f(column)`; the index is unchanged.
    pub fn map_columns(&self, f: impl Fn(&[f64]) -> Vec<f64>) -> Dataset {
        Dataset {
            index: self.index.clone(),
            columns: self
                .columns
                .iter()
                .map(|(name, values)| (name.clone(), f(values)))
                .collect(),
            shape: self.shape,
        }
    }

    /// Group rows by `label` (which must be non-decreasing over the index)
    /// and reduce each group per column with `reduce`. The first labelling
    /// error aborts the grouping.
    pub fn group_by<E>(
        &self,
        label: impl Fn(&DateTime<Utc>) -> Result<DateTime<Utc>, E>,
        reduce: impl Fn(&[f64]) -> f64,
    ) -> Result<Dataset, E> {
        let mut index = Vec::new();
        let mut bounds = Vec::new();
        for (row, ts) in self.index.iter().enumerate() {
            let key = label(ts)?;
            if index.last() != Some(&key) {
                index.push(key);
                bounds.push(row);
            }
        }
        bounds.push(self.len());
        let columns = self
            .columns
            .iter()
            .map(|(name, values)| {
                let reduced = bounds
                    .windows(2)
                    .map(|span| reduce(&values[span[0]..span[1]]))
                    .collect();
                (name.clone(), reduced)
            })
            .collect();
        Ok(Dataset {
            index,
            columns,
            shape: self.shape,
        })
    }
}
