use std::fmt::{Display, Formatter};

#[derive(Debug, PartialEq)]
pub enum DfsUtilError {
    IOError(String),
    RPCError(String),
    ConfigError(String),
    FSError(String),
    NotFound(String),
    AlreadyExists(String),
    InvalidPath(String),
    InvalidPermission(String),
    Unsupported(String),
    ArgMissingError(String),
    ProtoEncodeError(prost::EncodeError),
    ProtoDecodeError(prost::DecodeError),
}

impl DfsUtilError {
    pub(crate) fn not_found(path: impl Display) -> Self {
        DfsUtilError::NotFound(format!("'{}': No such file or directory", path))
    }

    pub(crate) fn already_exists(path: impl Display) -> Self {
        DfsUtilError::AlreadyExists(format!("'{}': File or directory already exists", path))
    }
}

impl Display for DfsUtilError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for DfsUtilError {}

impl From<std::io::Error> for DfsUtilError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => DfsUtilError::NotFound(error.to_string()),
            std::io::ErrorKind::AlreadyExists => DfsUtilError::AlreadyExists(error.to_string()),
            _ => DfsUtilError::IOError(error.to_string()),
        }
    }
}

impl From<tonic::transport::Error> for DfsUtilError {
    fn from(error: tonic::transport::Error) -> Self {
        DfsUtilError::RPCError(error.to_string())
    }
}

impl From<toml::de::Error> for DfsUtilError {
    fn from(error: toml::de::Error) -> Self {
        DfsUtilError::ConfigError(error.to_string())
    }
}

impl From<tonic::Status> for DfsUtilError {
    fn from(status: tonic::Status) -> Self {
        let message = status.message().to_owned();
        match status.code() {
            tonic::Code::NotFound => DfsUtilError::NotFound(message),
            tonic::Code::AlreadyExists => DfsUtilError::AlreadyExists(message),
            tonic::Code::Unimplemented => DfsUtilError::Unsupported(message),
            tonic::Code::InvalidArgument | tonic::Code::FailedPrecondition => {
                DfsUtilError::FSError(message)
            }
            _ => DfsUtilError::RPCError(status.to_string()),
        }
    }
}

impl From<prost::EncodeError> for DfsUtilError {
    fn from(error: prost::EncodeError) -> Self {
        DfsUtilError::ProtoEncodeError(error)
    }
}

impl From<prost::DecodeError> for DfsUtilError {
    fn from(error: prost::DecodeError) -> Self {
        DfsUtilError::ProtoDecodeError(error)
    }
}

pub type Result<T> = std::result::Result<T, DfsUtilError>;
