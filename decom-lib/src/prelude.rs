pub use crate::error::{DefinitionError, Error, Result};
