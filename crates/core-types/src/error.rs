use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),

    #[error("Series '{symbol}' is not strictly ascending at row {row}")]
    UnorderedTimestamps { symbol: String, row: usize },
}
