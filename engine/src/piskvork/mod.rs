pub mod encoder;
pub mod parser;

pub use encoder::encode_command;
pub use parser::parse_engine_message;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
    #[error("Unknown message: {0}")]
    UnknownMessage(String),
    #[error("Invalid cell: {0}")]
    InvalidCell(String),
}
