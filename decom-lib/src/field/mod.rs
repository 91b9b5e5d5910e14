//! Product layout as a tree of typed fields.
//!
//! Fields are stored in an arena owned by a [FieldTree] and referenced by [FieldId]. Trees
//! are assembled bottom-up with a [FieldTreeBuilder]: children are added first and their ids
//! passed to the containing field. [FieldTreeBuilder::build] validates the whole tree so the
//! decoder only ever sees well formed layouts.
//!
//! # Example
//! ```
//! use decom::{ArrayField, ArrayLength, DataType, FieldTree, SimpleField, StructureField};
//!
//! let mut builder = FieldTree::builder();
//! let count = builder.add(SimpleField::new("count", DataType::UINT16));
//! let temp = builder.add(SimpleField::new("temp", DataType::FLOAT32));
//! let temps = builder.add(ArrayField::new("temps", vec![temp], ArrayLength::InField(count)));
//! let root = builder.add(StructureField::new("hk", vec![count, temps]));
//! let tree = builder.build(root).unwrap();
//!
//! assert_eq!(tree.static_size(count), Some(2));
//! assert_eq!(tree.static_size(root), None);
//! ```
mod definition;
mod lookup;

use std::fmt::Display;
use std::io::Write;
use std::sync::{Arc, OnceLock};

use derive_more::From;
use serde::{Deserialize, Serialize};

pub use definition::{FieldDefinition, ProductDefinition};
pub use lookup::EnumTable;

use crate::channel::TimeTagKind;
use crate::datatype::{BaseType, DataType};
use crate::error::DefinitionError;
use crate::eu::EuDefinition;
use crate::printf::PrintFormat;

/// Name of the synthetic field meaning "skip without interpretation".
pub const FILL: &str = "fill";

/// Index of a field within its [FieldTree].
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId(usize);

impl FieldId {
    #[must_use]
    pub fn index(&self) -> usize {
        self.0
    }
}

impl Display for FieldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Display attributes shared by scalar fields.
#[derive(Debug, Clone, Default)]
pub struct FieldAttrs {
    pub unit: Option<String>,
    pub lookup: Option<Arc<EnumTable>>,
    pub eu: Option<EuDefinition>,
    pub print_format: Option<PrintFormat>,
}

impl FieldAttrs {
    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    pub fn with_lookup(mut self, table: Arc<EnumTable>) -> Self {
        self.lookup = Some(table);
        self
    }

    pub fn with_eu(mut self, eu: EuDefinition) -> Self {
        self.eu = Some(eu);
        self
    }

    pub fn with_print_format(mut self, fmt: PrintFormat) -> Self {
        self.print_format = Some(fmt);
        self
    }
}

/// One byte-aligned scalar value.
#[derive(Debug, Clone)]
pub struct SimpleField {
    pub name: String,
    pub data_type: DataType,
    pub attrs: FieldAttrs,
    /// Width in bytes of a length prefix preceding the value.
    pub prefix_len: Option<usize>,
    pub channel_id: Option<String>,
    pub time_tag: Option<TimeTagKind>,
}

impl SimpleField {
    pub fn new(name: &str, data_type: DataType) -> Self {
        SimpleField {
            name: name.to_string(),
            data_type,
            attrs: FieldAttrs::default(),
            prefix_len: None,
            channel_id: None,
            time_tag: None,
        }
    }

    /// Unnamed padding of `len` bytes.
    pub fn fill(len: usize) -> Self {
        Self::new(FILL, DataType::new(BaseType::Fill, len * 8))
    }

    pub fn with_attrs(mut self, attrs: FieldAttrs) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn with_prefix(mut self, len: usize) -> Self {
        self.prefix_len = Some(len);
        self
    }

    pub fn with_channel(mut self, id: &str) -> Self {
        self.channel_id = Some(id.to_string());
        self
    }

    pub fn with_time_tag(mut self, kind: TimeTagKind) -> Self {
        self.time_tag = Some(kind);
        self
    }

    #[must_use]
    pub fn is_fill(&self) -> bool {
        self.name == FILL || self.data_type.base() == BaseType::Fill
    }
}

/// A scalar packed at a bit offset within a [BitArrayField].
#[derive(Debug, Clone)]
pub struct BitField {
    pub name: String,
    pub bit_len: usize,
    pub attrs: FieldAttrs,
}

impl BitField {
    pub fn new(name: &str, bit_len: usize) -> Self {
        BitField {
            name: name.to_string(),
            bit_len,
            attrs: FieldAttrs::default(),
        }
    }

    pub fn with_attrs(mut self, attrs: FieldAttrs) -> Self {
        self.attrs = attrs;
        self
    }
}

/// Ordered, non-repeating sequence of fields.
#[derive(Debug, Clone)]
pub struct StructureField {
    pub name: String,
    pub type_name: Option<String>,
    pub children: Vec<FieldId>,
    /// When set, child values are rendered together through this format.
    pub print_format: Option<PrintFormat>,
}

impl StructureField {
    pub fn new(name: &str, children: Vec<FieldId>) -> Self {
        StructureField {
            name: name.to_string(),
            type_name: None,
            children,
            print_format: None,
        }
    }

    pub fn with_type_name(mut self, type_name: &str) -> Self {
        self.type_name = Some(type_name.to_string());
        self
    }

    pub fn with_print_format(mut self, fmt: PrintFormat) -> Self {
        self.print_format = Some(fmt);
        self
    }
}

/// How the number of repetitions of an [ArrayField] is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayLength {
    /// Exactly this many repetitions.
    Fixed(usize),
    /// An unsigned prefix of `prefix_bytes` bytes precedes the elements. It is a byte count
    /// when `in_bytes` is set, otherwise an element count.
    InData { prefix_bytes: usize, in_bytes: bool },
    /// The most recently decoded value of another field.
    InField(FieldId),
    /// Repeat until the data is exhausted.
    UntilExhausted,
}

/// A repeated sequence of one or more element fields.
#[derive(Debug, Clone)]
pub struct ArrayField {
    pub name: String,
    pub elements: Vec<FieldId>,
    pub length: ArrayLength,
    pub index_labels: Vec<String>,
    /// Enumeration providing index labels where `index_labels` has none.
    pub index_enum: Option<Arc<EnumTable>>,
    pub print_format: Option<PrintFormat>,
}

impl ArrayField {
    pub fn new(name: &str, elements: Vec<FieldId>, length: ArrayLength) -> Self {
        ArrayField {
            name: name.to_string(),
            elements,
            length,
            index_labels: Vec::default(),
            index_enum: None,
            print_format: None,
        }
    }

    pub fn with_index_labels<S: Into<String>>(mut self, labels: impl IntoIterator<Item = S>) -> Self {
        self.index_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_index_enum(mut self, table: Arc<EnumTable>) -> Self {
        self.index_enum = Some(table);
        self
    }

    pub fn with_print_format(mut self, fmt: PrintFormat) -> Self {
        self.print_format = Some(fmt);
        self
    }

    /// Label for repetition `index`.
    #[must_use]
    pub fn index_label(&self, index: usize) -> String {
        if let Some(label) = self.index_labels.get(index) {
            return label.clone();
        }
        self.index_enum
            .as_ref()
            .and_then(|t| t.lookup(index as i64))
            .map_or_else(|| index.to_string(), str::to_string)
    }
}

/// Byte-aligned window divided into consecutive [BitField]s.
#[derive(Debug, Clone)]
pub struct BitArrayField {
    pub name: String,
    pub bit_len: usize,
    pub children: Vec<FieldId>,
}

impl BitArrayField {
    pub fn new(name: &str, bit_len: usize, children: Vec<FieldId>) -> Self {
        BitArrayField {
            name: name.to_string(),
            bit_len,
            children,
        }
    }

    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.bit_len.div_ceil(8)
    }
}

/// How stream bytes are written to output.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StreamDisplay {
    #[default]
    None,
    Text,
    HexDump,
}

/// Opaque run of bytes.
#[derive(Debug, Clone)]
pub struct StreamField {
    pub name: String,
    /// Maximum bytes to consume, or all remaining when `None`.
    pub max_len: Option<usize>,
    pub display: StreamDisplay,
    /// Name of an external handler to receive the bytes.
    pub handler: Option<String>,
}

impl StreamField {
    pub fn new(name: &str, max_len: Option<usize>) -> Self {
        StreamField {
            name: name.to_string(),
            max_len,
            display: StreamDisplay::None,
            handler: None,
        }
    }

    pub fn with_display(mut self, display: StreamDisplay) -> Self {
        self.display = display;
        self
    }

    pub fn with_handler(mut self, handler: &str) -> Self {
        self.handler = Some(handler.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Simple,
    Bit,
    Structure,
    Array,
    BitArray,
    Stream,
}

#[derive(Debug, Clone, From)]
pub enum Field {
    Simple(SimpleField),
    Bit(BitField),
    Structure(StructureField),
    Array(ArrayField),
    BitArray(BitArrayField),
    Stream(StreamField),
}

impl Field {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Field::Simple(f) => &f.name,
            Field::Bit(f) => &f.name,
            Field::Structure(f) => &f.name,
            Field::Array(f) => &f.name,
            Field::BitArray(f) => &f.name,
            Field::Stream(f) => &f.name,
        }
    }

    #[must_use]
    pub fn kind(&self) -> FieldKind {
        match self {
            Field::Simple(_) => FieldKind::Simple,
            Field::Bit(_) => FieldKind::Bit,
            Field::Structure(_) => FieldKind::Structure,
            Field::Array(_) => FieldKind::Array,
            Field::BitArray(_) => FieldKind::BitArray,
            Field::Stream(_) => FieldKind::Stream,
        }
    }

    /// Ids of directly contained fields, in order.
    #[must_use]
    pub fn children(&self) -> &[FieldId] {
        match self {
            Field::Structure(f) => &f.children,
            Field::Array(f) => &f.elements,
            Field::BitArray(f) => &f.children,
            Field::Simple(_) | Field::Bit(_) | Field::Stream(_) => &[],
        }
    }
}

/// Accumulates fields for a [FieldTree].
#[derive(Debug, Default)]
pub struct FieldTreeBuilder {
    fields: Vec<Field>,
}

impl FieldTreeBuilder {
    /// Add a field, returning its id. Any fields it references must already be added.
    pub fn add<F: Into<Field>>(&mut self, field: F) -> FieldId {
        self.fields.push(field.into());
        FieldId(self.fields.len() - 1)
    }

    #[must_use]
    pub fn get(&self, id: FieldId) -> Option<&Field> {
        self.fields.get(id.0)
    }

    /// Validate and finish the tree rooted at `root`.
    ///
    /// # Errors
    /// A [DefinitionError] for the first malformed field found.
    pub fn build(self, root: FieldId) -> Result<FieldTree, DefinitionError> {
        if root.0 >= self.fields.len() {
            return Err(DefinitionError::UnknownChild {
                parent: String::new(),
                index: root.0,
            });
        }
        let sizes = (0..self.fields.len()).map(|_| OnceLock::new()).collect();
        let tree = FieldTree {
            fields: self.fields,
            root,
            sizes,
        };
        tree.validate(root, None)?;
        Ok(tree)
    }
}

/// A validated product layout.
///
/// Static sizes are computed on first use and memoized per field. Computation is a pure
/// function of the tree so redundant computation from multiple threads is harmless.
#[derive(Debug)]
pub struct FieldTree {
    fields: Vec<Field>,
    root: FieldId,
    sizes: Vec<OnceLock<Option<usize>>>,
}

impl FieldTree {
    #[must_use]
    pub fn builder() -> FieldTreeBuilder {
        FieldTreeBuilder::default()
    }

    #[must_use]
    pub fn root(&self) -> FieldId {
        self.root
    }

    /// Get a field by id.
    ///
    /// # Panics
    /// If `id` did not come from this tree's builder.
    #[must_use]
    pub fn get(&self, id: FieldId) -> &Field {
        &self.fields[id.0]
    }

    /// Id of the first field named `name`, in the order fields were added.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<FieldId> {
        self.fields
            .iter()
            .position(|f| f.name() == name)
            .map(FieldId)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of bytes the field always occupies, or `None` if that depends on the data.
    #[must_use]
    pub fn static_size(&self, id: FieldId) -> Option<usize> {
        *self.sizes[id.0].get_or_init(|| self.compute_size(id))
    }

    fn compute_size(&self, id: FieldId) -> Option<usize> {
        match self.get(id) {
            Field::Simple(f) if f.prefix_len.is_some() => None,
            Field::Simple(f) => f.data_type.byte_len(),
            Field::Bit(_) => None,
            Field::BitArray(f) => Some(f.byte_len()),
            Field::Structure(f) => self.sum_sizes(&f.children),
            Field::Array(f) => match f.length {
                ArrayLength::Fixed(n) => self.sum_sizes(&f.elements).map(|s| s * n),
                _ => None,
            },
            Field::Stream(_) => None,
        }
    }

    /// Combined static size of `ids`, if they all have one.
    pub(crate) fn sum_sizes(&self, ids: &[FieldId]) -> Option<usize> {
        ids.iter()
            .map(|id| self.static_size(*id))
            .sum::<Option<usize>>()
    }

    fn validate(&self, id: FieldId, parent: Option<FieldKind>) -> Result<(), DefinitionError> {
        let field = self.get(id);
        for child in field.children() {
            if child.0 >= id.0 {
                return Err(DefinitionError::UnknownChild {
                    parent: field.name().to_string(),
                    index: child.0,
                });
            }
        }

        match field {
            Field::Simple(f) => {
                if !f.is_fill() {
                    f.data_type.check(&f.name)?;
                }
                if let Some(len) = f.prefix_len {
                    DataType::unsigned_bytes(len).check(&f.name)?;
                    // only variable length types take their length from a prefix
                    if !matches!(
                        f.data_type.base(),
                        BaseType::String | BaseType::Unknown | BaseType::Fill
                    ) {
                        return Err(DefinitionError::UnsupportedType {
                            field: f.name.clone(),
                            base: f.data_type.base(),
                            bits: f.data_type.bit_len(),
                        });
                    }
                }
            }
            Field::Bit(f) => {
                if parent != Some(FieldKind::BitArray) {
                    return Err(DefinitionError::OrphanBit(f.name.clone()));
                }
                if f.bit_len == 0 || f.bit_len > 64 {
                    return Err(DefinitionError::BitLength {
                        field: f.name.clone(),
                        bits: f.bit_len,
                    });
                }
            }
            Field::BitArray(f) => {
                let mut actual = 0;
                for child in &f.children {
                    match self.get(*child) {
                        Field::Bit(b) => actual += b.bit_len,
                        other => {
                            return Err(DefinitionError::NotABit {
                                parent: f.name.clone(),
                                child: other.name().to_string(),
                            })
                        }
                    }
                }
                if actual != f.bit_len {
                    return Err(DefinitionError::BitArrayWidth {
                        field: f.name.clone(),
                        expected: f.bit_len,
                        actual,
                    });
                }
            }
            Field::Array(f) => self.validate_array(f)?,
            Field::Structure(_) | Field::Stream(_) => (),
        }

        for child in field.children() {
            self.validate(*child, Some(field.kind()))?;
        }
        Ok(())
    }

    fn validate_array(&self, f: &ArrayField) -> Result<(), DefinitionError> {
        if f.elements.is_empty() {
            return Err(DefinitionError::EmptyArray(f.name.clone()));
        }
        match f.length {
            ArrayLength::InField(other) => {
                let usable = match self.fields.get(other.0) {
                    Some(Field::Simple(s)) => matches!(
                        s.data_type.base(),
                        BaseType::UnsignedInt | BaseType::SignedInt | BaseType::Enum
                    ),
                    _ => false,
                };
                if !usable {
                    return Err(DefinitionError::UnknownLengthField {
                        array: f.name.clone(),
                        name: self
                            .fields
                            .get(other.0)
                            .map_or_else(|| other.to_string(), |o| o.name().to_string()),
                    });
                }
            }
            ArrayLength::InData {
                prefix_bytes,
                in_bytes,
            } => {
                DataType::unsigned_bytes(prefix_bytes).check(&f.name)?;
                if in_bytes && !matches!(self.sum_sizes(&f.elements), Some(n) if n > 0) {
                    return Err(DefinitionError::VariableElementSize(f.name.clone()));
                }
            }
            ArrayLength::Fixed(_) | ArrayLength::UntilExhausted => (),
        }
        Ok(())
    }

    /// Write a human readable outline of the layout.
    ///
    /// # Errors
    /// Any error writing to `out`.
    pub fn describe<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        self.describe_field(out, self.root, 0)
    }

    fn describe_field<W: Write>(&self, out: &mut W, id: FieldId, depth: usize) -> std::io::Result<()> {
        let indent = "  ".repeat(depth);
        match self.get(id) {
            Field::Simple(f) => {
                let mut line = format!("{indent}({}) {}", f.data_type, f.name);
                if let Some(unit) = &f.attrs.unit {
                    line.push_str(&format!(" ({unit})"));
                }
                if f.data_type.may_exceed_signed_range() {
                    line.push_str(" [may exceed signed 64-bit range]");
                }
                if let Some(kind) = f.time_tag {
                    line.push_str(&format!(" [this is a {kind} channel timestamp]"));
                }
                if let Some(chan) = &f.channel_id {
                    line.push_str(&format!(" [this is a channel ({chan})]"));
                }
                writeln!(out, "{line}")?;
            }
            Field::Bit(f) => match &f.attrs.unit {
                Some(unit) => writeln!(out, "{indent}(BIT {}) {} ({unit})", f.bit_len, f.name)?,
                None => writeln!(out, "{indent}(BIT {}) {}", f.bit_len, f.name)?,
            },
            Field::Structure(f) => match &f.type_name {
                Some(t) => writeln!(out, "{indent}(Structure {t}): {}", f.name)?,
                None => writeln!(out, "{indent}(Structure): {}", f.name)?,
            },
            Field::Array(f) => {
                let what = match f.length {
                    ArrayLength::Fixed(n) => n.to_string(),
                    ArrayLength::InField(other) => format!("[{}]", self.get(other).name()),
                    ArrayLength::InData { in_bytes, .. } => format!(
                        "[{} found in data prefix]",
                        if in_bytes { "byte length" } else { "element count" }
                    ),
                    ArrayLength::UntilExhausted => "variable length".to_string(),
                };
                writeln!(out, "{indent}(Array of {what}): {}", f.name)?;
            }
            Field::BitArray(f) => {
                writeln!(out, "{indent}(Bit array of {} bits): {}", f.bit_len, f.name)?;
            }
            Field::Stream(f) => match f.max_len {
                Some(n) => writeln!(out, "{indent}(Stream of {n} bytes): {}", f.name)?,
                None => writeln!(out, "{indent}(Stream of variable length): {}", f.name)?,
            },
        }
        for child in self.get(id).children() {
            self.describe_field(out, *child, depth + 1)?;
        }
        Ok(())
    }
}
