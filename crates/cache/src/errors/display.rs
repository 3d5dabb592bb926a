use super::types::{CacheError, SerializationOp, StoreType};
use std::fmt;

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::FileSystem => f.write_str("filesystem"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io {
                path,
                operation,
                source,
                ..
            } => write!(f, "{operation} failed for {}: {source}", path.display()),
            Self::Serialization {
                key,
                operation,
                source,
                ..
            } => {
                let verb = match operation {
                    SerializationOp::Encode => "encode",
                    SerializationOp::Decode => "decode",
                };
                write!(f, "could not {verb} entry '{key}': {source}")
            }
            Self::Corruption { key, reason, .. } => write!(f, "entry '{key}' is corrupt: {reason}"),
            Self::Compression {
                operation, source, ..
            } => write!(f, "{operation} failed: {source}"),
            Self::InvalidKey { key, reason, .. } => write!(f, "invalid key '{key}': {reason}"),
            Self::StoreUnavailable {
                store_type, reason, ..
            } => write!(f, "{store_type} store unavailable: {reason}"),
            Self::Configuration { message, .. } => write!(f, "cache configuration: {message}"),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Serialization { source, .. } | Self::Compression { source, .. } => {
                Some(source.as_ref())
            }
            _ => None,
        }
    }
}
