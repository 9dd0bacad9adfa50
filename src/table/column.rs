use std::fmt;

use serde::{Deserialize, Serialize};

use crate::spatial::{DensityField, PointPattern};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRef {
    pub model_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Pattern,
    Scalar,
    Factor,
    Field,
    ModelRef,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pattern => "pattern",
            Self::Scalar => "scalar",
            Self::Factor => "factor",
            Self::Field => "field",
            Self::ModelRef => "model_ref",
        };
        f.write_str(name)
    }
}

/// One column of a sample collection; every variant holds one entry per row.
#[derive(Debug, Clone)]
pub enum Column {
    Pattern(Vec<PointPattern>),
    Scalar(Vec<Option<f64>>),
    Factor(Vec<Option<String>>),
    Field(Vec<DensityField>),
    ModelRef(Vec<ModelRef>),
}

impl Column {
    pub fn kind(&self) -> ColumnKind {
        match self {
            Self::Pattern(_) => ColumnKind::Pattern,
            Self::Scalar(_) => ColumnKind::Scalar,
            Self::Factor(_) => ColumnKind::Factor,
            Self::Field(_) => ColumnKind::Field,
            Self::ModelRef(_) => ColumnKind::ModelRef,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Pattern(v) => v.len(),
            Self::Scalar(v) => v.len(),
            Self::Factor(v) => v.len(),
            Self::Field(v) => v.len(),
            Self::ModelRef(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
