use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemloadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Deserialization error: {0}")]
    Deserialize(String),

    #[error("Config error: {0}")]
    Config(String),
}
