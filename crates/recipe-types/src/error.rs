use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("object id is not hex: {0}")]
    InvalidHex(String),

    #[error("object id has {actual} bytes, expected {expected}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid column id: {0:?}")]
    InvalidColumnId(String),

    #[error("column id {id} shifted by {delta} leaves the valid range")]
    ColumnIdOutOfRange { id: u32, delta: i64 },
}
