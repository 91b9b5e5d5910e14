#![doc = include_str!("../README.md")]

mod cursor;
mod datatype;
mod decom;
mod error;
mod eu;
mod output;
mod printf;
mod value;

pub mod channel;
pub mod field;
pub mod prelude;
pub mod time;

pub use cursor::{extract_bits, ByteCursor};
pub use datatype::{BaseType, DataType};
pub use decom::{CommandStreamHandler, Decom, DecomOptions, Decoded, StreamHandler};
pub use error::{DefinitionError, Error, Result};
pub use eu::{EuCalculator, EuDefinition, EuError, EuResolver, PolynomialEu};
pub use field::{
    ArrayField, ArrayLength, BitArrayField, BitField, EnumTable, Field, FieldAttrs, FieldId,
    FieldTree, ProductDefinition, SimpleField, StreamDisplay, StreamField, StructureField,
};
pub use output::{hex_dump, EventRecorder, OutputEvent, OutputFormatter, TextFormatter};
pub use printf::PrintFormat;
pub use time::{LocalSolarTime, Sclk, SclkFormat, TimeCorrelation, TimeUnit};
pub use value::Value;

/// Spacecraft identifier.
pub type Scid = u16;
/// Virtual channel identifier.
pub type Vcid = u16;
