//! JSON product definitions.
//!
//! A definition names its enumerations once and refers to them by name from fields:
//!
//! ```json
//! {
//!   "enumerations": { "power": { "0": "OFF", "1": "ON" } },
//!   "root": {
//!     "kind": "structure",
//!     "name": "hk",
//!     "fields": [
//!       { "kind": "simple", "name": "count", "type": "unsigned_int", "bits": 16 },
//!       { "kind": "array", "name": "temps", "length_field": "count", "elements": [
//!         { "kind": "simple", "name": "temp", "type": "float", "bits": 32, "unit": "C" }
//!       ]}
//!     ]
//!   }
//! }
//! ```
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::sync::Arc;

use serde::Deserialize;

use super::{
    ArrayField, ArrayLength, BitArrayField, BitField, EnumTable, FieldAttrs, FieldId, FieldTree,
    FieldTreeBuilder, SimpleField, StreamDisplay, StreamField, StructureField,
};
use crate::channel::TimeTagKind;
use crate::datatype::{BaseType, DataType};
use crate::error::DefinitionError;
use crate::eu::EuDefinition;
use crate::prelude::*;
use crate::printf::PrintFormat;

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldDefinition {
    Simple {
        name: String,
        #[serde(rename = "type")]
        base: BaseType,
        /// Bit width. Omitted means the value occupies the rest of the data or the length
        /// given by its prefix.
        bits: Option<usize>,
        unit: Option<String>,
        enumeration: Option<String>,
        eu: Option<EuDefinition>,
        format: Option<String>,
        prefix_bytes: Option<usize>,
        channel: Option<String>,
        time_tag: Option<TimeTagKind>,
    },
    Bit {
        name: String,
        bits: usize,
        unit: Option<String>,
        enumeration: Option<String>,
        eu: Option<EuDefinition>,
        format: Option<String>,
    },
    Structure {
        name: String,
        type_name: Option<String>,
        format: Option<String>,
        fields: Vec<FieldDefinition>,
    },
    Array {
        name: String,
        elements: Vec<FieldDefinition>,
        count: Option<usize>,
        prefix_bytes: Option<usize>,
        #[serde(default)]
        length_in_bytes: bool,
        length_field: Option<String>,
        #[serde(default)]
        until_exhausted: bool,
        #[serde(default)]
        index_labels: Vec<String>,
        index_enumeration: Option<String>,
        format: Option<String>,
    },
    BitArray {
        name: String,
        bits: usize,
        fields: Vec<FieldDefinition>,
    },
    Stream {
        name: String,
        max_bytes: Option<usize>,
        #[serde(default)]
        display: StreamDisplay,
        handler: Option<String>,
    },
}

/// Complete description of a product layout.
#[derive(Deserialize, Debug, Clone)]
pub struct ProductDefinition {
    #[serde(default)]
    pub enumerations: BTreeMap<String, BTreeMap<i64, String>>,
    pub root: FieldDefinition,
}

impl ProductDefinition {
    /// Parse a JSON definition.
    ///
    /// # Errors
    /// [Error::Json] if the text is not a valid definition.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read a JSON definition.
    ///
    /// # Errors
    /// [Error::Json] if the data is not a valid definition, or [Error::Io].
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Build a validated [FieldTree].
    ///
    /// # Errors
    /// A [DefinitionError] if the definition is malformed.
    pub fn build(&self) -> std::result::Result<FieldTree, DefinitionError> {
        let enums = self
            .enumerations
            .iter()
            .map(|(name, values)| {
                let table = EnumTable::new(name, values.iter().map(|(k, v)| (*k, v.clone())));
                (name.clone(), Arc::new(table))
            })
            .collect();
        let mut ctx = Context {
            builder: FieldTree::builder(),
            enums,
            scalars: HashMap::default(),
        };
        let root = ctx.add(&self.root)?;
        ctx.builder.build(root)
    }
}

struct Context {
    builder: FieldTreeBuilder,
    enums: HashMap<String, Arc<EnumTable>>,
    /// Most recently added scalar field for each name, for `length_field` references.
    scalars: HashMap<String, FieldId>,
}

impl Context {
    fn table(&self, field: &str, name: &str) -> std::result::Result<Arc<EnumTable>, DefinitionError> {
        self.enums
            .get(name)
            .cloned()
            .ok_or_else(|| DefinitionError::UnknownEnumeration {
                field: field.to_string(),
                name: name.to_string(),
            })
    }

    fn attrs(
        &self,
        field: &str,
        unit: Option<&String>,
        enumeration: Option<&String>,
        eu: Option<&EuDefinition>,
        format: Option<&String>,
    ) -> std::result::Result<FieldAttrs, DefinitionError> {
        Ok(FieldAttrs {
            unit: unit.cloned(),
            lookup: enumeration.map(|e| self.table(field, e)).transpose()?,
            eu: eu.cloned(),
            print_format: format.map(|f| PrintFormat::parse(f)).transpose()?,
        })
    }

    fn add(&mut self, def: &FieldDefinition) -> std::result::Result<FieldId, DefinitionError> {
        let id = match def {
            FieldDefinition::Simple {
                name,
                base,
                bits,
                unit,
                enumeration,
                eu,
                format,
                prefix_bytes,
                channel,
                time_tag,
            } => {
                let data_type = match bits {
                    Some(bits) => DataType::new(*base, *bits),
                    None => DataType::rest(*base),
                };
                let mut field = SimpleField::new(name, data_type).with_attrs(self.attrs(
                    name,
                    unit.as_ref(),
                    enumeration.as_ref(),
                    eu.as_ref(),
                    format.as_ref(),
                )?);
                field.prefix_len = *prefix_bytes;
                field.channel_id = channel.clone();
                field.time_tag = *time_tag;
                let id = self.builder.add(field);
                self.scalars.insert(name.clone(), id);
                id
            }
            FieldDefinition::Bit {
                name,
                bits,
                unit,
                enumeration,
                eu,
                format,
            } => {
                let attrs = self.attrs(
                    name,
                    unit.as_ref(),
                    enumeration.as_ref(),
                    eu.as_ref(),
                    format.as_ref(),
                )?;
                self.builder.add(BitField::new(name, *bits).with_attrs(attrs))
            }
            FieldDefinition::Structure {
                name,
                type_name,
                format,
                fields,
            } => {
                let children = self.add_all(fields)?;
                let mut field = StructureField::new(name, children);
                field.type_name = type_name.clone();
                field.print_format = format.as_deref().map(PrintFormat::parse).transpose()?;
                self.builder.add(field)
            }
            FieldDefinition::Array {
                name,
                elements,
                count,
                prefix_bytes,
                length_in_bytes,
                length_field,
                until_exhausted,
                index_labels,
                index_enumeration,
                format,
            } => {
                let declared = [
                    count.is_some(),
                    prefix_bytes.is_some(),
                    length_field.is_some(),
                    *until_exhausted,
                ];
                match declared.iter().filter(|d| **d).count() {
                    0 => return Err(DefinitionError::MissingArrayLength(name.clone())),
                    1 => (),
                    _ => return Err(DefinitionError::AmbiguousArrayLength(name.clone())),
                }
                // resolve before the elements so an element can't shadow the length field
                let in_field = length_field
                    .as_ref()
                    .map(|other| {
                        self.scalars.get(other).copied().ok_or_else(|| {
                            DefinitionError::UnknownLengthField {
                                array: name.clone(),
                                name: other.clone(),
                            }
                        })
                    })
                    .transpose()?;
                let length = if let Some(n) = count {
                    ArrayLength::Fixed(*n)
                } else if let Some(prefix_bytes) = prefix_bytes {
                    ArrayLength::InData {
                        prefix_bytes: *prefix_bytes,
                        in_bytes: *length_in_bytes,
                    }
                } else if let Some(id) = in_field {
                    ArrayLength::InField(id)
                } else {
                    ArrayLength::UntilExhausted
                };

                let children = self.add_all(elements)?;
                let mut field = ArrayField::new(name, children, length);
                field.index_labels = index_labels.clone();
                field.index_enum = index_enumeration
                    .as_ref()
                    .map(|e| self.table(name, e))
                    .transpose()?;
                field.print_format = format.as_deref().map(PrintFormat::parse).transpose()?;
                self.builder.add(field)
            }
            FieldDefinition::BitArray { name, bits, fields } => {
                let children = self.add_all(fields)?;
                self.builder.add(BitArrayField::new(name, *bits, children))
            }
            FieldDefinition::Stream {
                name,
                max_bytes,
                display,
                handler,
            } => {
                let mut field = StreamField::new(name, *max_bytes).with_display(*display);
                field.handler = handler.clone();
                self.builder.add(field)
            }
        };
        Ok(id)
    }

    fn add_all(
        &mut self,
        defs: &[FieldDefinition],
    ) -> std::result::Result<Vec<FieldId>, DefinitionError> {
        defs.iter().map(|d| self.add(d)).collect()
    }
}
