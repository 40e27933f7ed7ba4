use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum VisualizeError {
    #[error("Nothing drawn: the input has no pixel above the ink threshold")]
    EmptyInput,
}
