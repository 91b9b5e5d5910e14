use crate::datatype::BaseType;

/// Malformed field tree. These indicate a corrupt or incompatible dictionary rather than
/// corrupt telemetry and are fatal to a decode pass.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum DefinitionError {
    #[error("unsupported bit length {bits} for {base} field {field:?}")]
    UnsupportedType {
        field: String,
        base: BaseType,
        bits: usize,
    },
    #[error("array {0:?} declares more than one length strategy")]
    AmbiguousArrayLength(String),
    #[error("array {0:?} does not declare a length strategy")]
    MissingArrayLength(String),
    #[error("array {0:?} has no elements")]
    EmptyArray(String),
    #[error("bit array {field:?} children sum to {actual} bits, expected {expected}")]
    BitArrayWidth {
        field: String,
        expected: usize,
        actual: usize,
    },
    #[error("bit field {0:?} is only valid as a child of a bit array")]
    OrphanBit(String),
    #[error("bit field {field:?} has unsupported length {bits}")]
    BitLength { field: String, bits: usize },
    #[error("array {array:?} references unknown length field {name:?}")]
    UnknownLengthField { array: String, name: String },
    #[error("field {field:?} references unknown enumeration {name:?}")]
    UnknownEnumeration { field: String, name: String },
    #[error("array {0:?} has a byte count prefix but variable size elements")]
    VariableElementSize(String),
    #[error("invalid print format {format:?}: {reason}")]
    PrintFormat { format: String, reason: String },
    #[error("bit array {parent:?} contains non-bit field {child:?}")]
    NotABit { parent: String, child: String },
    #[error("field {parent:?} references child {index} which was not added before it")]
    UnknownChild { parent: String, index: usize },
}

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Not enough bytes")]
    NotEnoughData { actual: usize, minimum: usize },

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid product definition: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to start stream handler pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Publishing finished channel samples failed.
    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, Error>;
