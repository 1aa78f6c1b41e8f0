use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] bincode::Error),

    #[error("Compression error: {0}")]
    CompressionError(#[from] weir_core::CompressionError),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("No such partition: {partition} (topic has {partitions})")]
    NoSuchPartition { partition: u32, partitions: u32 },

    #[error("Invalid response")]
    InvalidResponse,

    #[error("Frame too large: {0} bytes (max: {1})")]
    FrameTooLarge(usize, usize),

    #[error("All brokers unavailable: {0}")]
    AllBrokersFailed(String),

    #[error("Pipeline closed")]
    PipelineClosed,

    #[error("Timeout: {0}")]
    Timeout(String),
}

pub type Result<T> = std::result::Result<T, Error>;
