//! Hyperframe-like table of samples.
//!
//! Rows are samples identified by a stable ID; columns are appended, never
//! replaced or reordered.

mod column;

use std::collections::{HashMap, HashSet};

pub use column::{Column, ColumnKind, ModelRef};

use crate::error::PpaError;
use crate::spatial::{DensityField, PointPattern};

#[derive(Debug, Clone)]
pub struct SampleCollection {
    ids: Vec<String>,
    row_index: HashMap<String, usize>,
    columns: Vec<(String, Column)>,
}

impl SampleCollection {
    pub fn new(ids: Vec<String>) -> Result<Self, PpaError> {
        let mut row_index = HashMap::with_capacity(ids.len());
        for (row, id) in ids.iter().enumerate() {
            if id.trim().is_empty() {
                return Err(PpaError::Column(format!("row {} has an empty sample id", row)));
            }
            if row_index.insert(id.clone(), row).is_some() {
                return Err(PpaError::Column(format!("duplicate sample id '{}'", id)));
            }
        }
        Ok(Self {
            ids,
            row_index,
            columns: Vec::new(),
        })
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn row_of(&self, id: &str) -> Option<usize> {
        self.row_index.get(id).copied()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(name, col)| (name.as_str(), col))
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, col)| col)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_kind(&self, name: &str) -> Option<ColumnKind> {
        self.column(name).map(Column::kind)
    }

    pub fn names_of_kind(&self, kind: ColumnKind) -> Vec<String> {
        self.columns
            .iter()
            .filter(|(_, col)| col.kind() == kind)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Appends a column aligned with the existing rows.
    pub fn append_column(&mut self, name: impl Into<String>, column: Column) -> Result<(), PpaError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(PpaError::Column("column name must not be empty".to_string()));
        }
        if self.has_column(&name) {
            return Err(PpaError::Column(format!("column '{}' already exists", name)));
        }
        if column.len() != self.len() {
            return Err(PpaError::Column(format!(
                "column '{}' has {} entries for {} rows",
                name,
                column.len(),
                self.len()
            )));
        }
        self.columns.push((name, column));
        Ok(())
    }

    /// Orders values keyed by sample ID into row order.
    pub fn align_by_id<T>(&self, keyed: Vec<(String, T)>) -> Result<Vec<T>, PpaError> {
        if keyed.len() != self.len() {
            return Err(PpaError::Column(format!(
                "{} keyed values for {} rows",
                keyed.len(),
                self.len()
            )));
        }
        let mut slots: Vec<Option<T>> = (0..self.len()).map(|_| None).collect();
        let mut seen = HashSet::with_capacity(keyed.len());
        for (id, value) in keyed {
            let row = self
                .row_of(&id)
                .ok_or_else(|| PpaError::Column(format!("unknown sample id '{}'", id)))?;
            if !seen.insert(row) {
                return Err(PpaError::Column(format!("sample id '{}' given twice", id)));
            }
            slots[row] = Some(value);
        }
        Ok(slots.into_iter().flatten().collect())
    }

    pub fn patterns(&self, name: &str) -> Result<&[PointPattern], PpaError> {
        match self.require(name)? {
            Column::Pattern(v) => Ok(v),
            other => Err(kind_mismatch(name, ColumnKind::Pattern, other.kind())),
        }
    }

    pub fn scalars(&self, name: &str) -> Result<&[Option<f64>], PpaError> {
        match self.require(name)? {
            Column::Scalar(v) => Ok(v),
            other => Err(kind_mismatch(name, ColumnKind::Scalar, other.kind())),
        }
    }

    pub fn factors(&self, name: &str) -> Result<&[Option<String>], PpaError> {
        match self.require(name)? {
            Column::Factor(v) => Ok(v),
            other => Err(kind_mismatch(name, ColumnKind::Factor, other.kind())),
        }
    }

    pub fn fields(&self, name: &str) -> Result<&[DensityField], PpaError> {
        match self.require(name)? {
            Column::Field(v) => Ok(v),
            other => Err(kind_mismatch(name, ColumnKind::Field, other.kind())),
        }
    }

    pub fn model_refs(&self, name: &str) -> Result<&[ModelRef], PpaError> {
        match self.require(name)? {
            Column::ModelRef(v) => Ok(v),
            other => Err(kind_mismatch(name, ColumnKind::ModelRef, other.kind())),
        }
    }

    fn require(&self, name: &str) -> Result<&Column, PpaError> {
        self.column(name)
            .ok_or_else(|| PpaError::Column(format!("unknown column '{}'", name)))
    }
}

fn kind_mismatch(name: &str, expected: ColumnKind, got: ColumnKind) -> PpaError {
    PpaError::Column(format!(
        "column '{}' is a {} column, expected {}",
        name, got, expected
    ))
}
