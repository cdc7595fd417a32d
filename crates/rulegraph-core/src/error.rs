use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuleGraphError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Project root not readable: {0}")]
    ProjectRoot(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown rule: {0}")]
    UnknownRule(String),
}

pub type Result<T> = std::result::Result<T, RuleGraphError>;
