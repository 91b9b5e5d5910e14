//! The decode engine.
//!
//! [Decom] walks a [FieldTree] over the bytes of one product, writing structured output to an
//! [OutputFormatter] and emitting channel and time tag [Candidate]s to a [CandidateSink].
//!
//! Errors come in two severities. A malformed tree is a [DefinitionError] and fails the
//! decode. Problems with the data itself, such as running out of bytes, are logged and
//! decoding continues with whatever remains.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use decom::{BitArrayField, BitField, Decom, FieldTree, Value};
//!
//! let mut builder = FieldTree::builder();
//! let mode = builder.add(BitField::new("mode", 3));
//! let count = builder.add(BitField::new("count", 5));
//! let root = builder.add(BitArrayField::new("status", 8, vec![mode, count]));
//! let decom = Decom::new(Arc::new(builder.build(root).unwrap()));
//!
//! let decoded = decom.decode_collect(&[0b101_01101]).unwrap();
//! assert_eq!(decoded.output.value("mode"), Some(&Value::Unsigned(5)));
//! assert_eq!(decoded.output.value("count"), Some(&Value::Unsigned(13)));
//! assert_eq!(decoded.consumed, 1);
//! ```
mod batch;
mod stream;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, trace, warn};

pub use stream::{CommandStreamHandler, StreamHandler};

use batch::Batch;
use stream::StreamDispatch;

use crate::channel::{
    Candidate, CandidateSink, ChannelCandidate, TagValue, TimeTagCandidate,
};
use crate::cursor::{be_uint, extract_bits, ByteCursor};
use crate::datatype::{BaseType, DataType};
use crate::error::DefinitionError;
use crate::eu::EuResolver;
use crate::field::{
    ArrayField, ArrayLength, BitArrayField, BitField, Field, FieldId, FieldTree, SimpleField,
    StreamDisplay, StreamField, StructureField, FILL,
};
use crate::output::{hex_dump, EventRecorder, OutputFormatter};
use crate::prelude::*;
use crate::time::{Sclk, TimeUnit};
use crate::value::Value;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct DecomOptions {
    /// Emit channel and time tag candidates.
    pub channels: bool,
    /// Number of threads used to run stream handlers. By default the value will be chosen
    /// automatically.
    pub stream_threads: usize,
}

impl Default for DecomOptions {
    fn default() -> Self {
        DecomOptions {
            channels: true,
            stream_threads: 0,
        }
    }
}

impl DecomOptions {
    pub fn with_channels(mut self, enabled: bool) -> Self {
        self.channels = enabled;
        self
    }

    pub fn with_stream_threads(mut self, num_threads: usize) -> Self {
        self.stream_threads = num_threads;
        self
    }
}

/// Everything produced by decoding one product.
#[derive(Debug, Clone, Default)]
pub struct Decoded {
    pub output: EventRecorder,
    pub candidates: Vec<Candidate>,
    /// Number of product bytes consumed.
    pub consumed: usize,
}

/// Decodes products described by a [FieldTree].
///
/// The tree is only read, so a single `Decom` can decode many products, including from
/// multiple threads.
#[derive(Debug)]
pub struct Decom {
    tree: Arc<FieldTree>,
    resolver: EuResolver,
    options: DecomOptions,
    streams: Option<StreamDispatch>,
}

impl Decom {
    pub fn new(tree: Arc<FieldTree>) -> Self {
        Decom {
            tree,
            resolver: EuResolver::default(),
            options: DecomOptions::default(),
            streams: None,
        }
    }

    pub fn with_resolver(mut self, resolver: EuResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_options(mut self, options: DecomOptions) -> Self {
        self.options = options;
        self
    }

    /// Hand stream fields configured with a handler to `handler`.
    ///
    /// # Errors
    /// [Error::ThreadPool] if the background pool cannot be created.
    pub fn with_stream_handler(mut self, handler: Arc<dyn StreamHandler>) -> Result<Self> {
        self.streams = Some(StreamDispatch::new(handler, self.options.stream_threads)?);
        Ok(self)
    }

    /// Block until all stream handler jobs started by previous decodes have finished.
    /// Returns immediately if no stream handler is configured.
    pub fn wait_for_streams(&self) {
        if let Some(streams) = &self.streams {
            debug!("waiting for stream handlers");
            streams.wait();
        }
    }

    #[must_use]
    pub fn tree(&self) -> &FieldTree {
        &self.tree
    }

    /// Decode one product, returning the number of bytes consumed.
    ///
    /// # Errors
    /// [Error::Definition] if the layout cannot be decoded. Output written before the error
    /// is left in `out`.
    pub fn decode(
        &self,
        data: &[u8],
        out: &mut dyn OutputFormatter,
        sink: &mut dyn CandidateSink,
    ) -> Result<usize> {
        let mut pass = Pass {
            decom: self,
            tree: &self.tree,
            cursor: ByteCursor::new(data),
            out,
            sink,
            last: HashMap::default(),
        };
        pass.field(self.tree.root())?;

        let consumed = pass.cursor.offset();
        if pass.cursor.has_more() {
            debug!(
                consumed,
                remaining = pass.cursor.remaining(),
                "product has bytes beyond its layout"
            );
        }
        Ok(consumed)
    }

    /// Decode one product, collecting output and candidates.
    ///
    /// # Errors
    /// See [Decom::decode].
    pub fn decode_collect(&self, data: &[u8]) -> Result<Decoded> {
        let mut output = EventRecorder::default();
        let mut candidates = Vec::new();
        let consumed = self.decode(data, &mut output, &mut candidates)?;
        Ok(Decoded {
            output,
            candidates,
            consumed,
        })
    }
}

/// State for decoding a single product.
struct Pass<'a> {
    decom: &'a Decom,
    tree: &'a FieldTree,
    cursor: ByteCursor<'a>,
    out: &'a mut dyn OutputFormatter,
    sink: &'a mut dyn CandidateSink,
    /// Most recent unsigned value of each scalar field, for array lengths.
    last: HashMap<FieldId, u64>,
}

impl<'a> Pass<'a> {
    fn field(&mut self, id: FieldId) -> Result<()> {
        let tree = self.tree;
        match tree.get(id) {
            Field::Simple(f) => {
                if let Some(dn) = self.scalar(id, f)? {
                    let value = self.decom.resolver.resolve(&f.name, &dn, &f.attrs);
                    self.out
                        .name_value(&f.name, &value, f.attrs.unit.as_deref());
                }
            }
            Field::Bit(f) => return Err(DefinitionError::OrphanBit(f.name.clone()).into()),
            Field::BitArray(f) => {
                for (bit, dn) in self.bits(f) {
                    let value = self.decom.resolver.resolve(&bit.name, &dn, &bit.attrs);
                    self.out
                        .name_value(&bit.name, &value, bit.attrs.unit.as_deref());
                }
            }
            Field::Structure(f) => self.structure(f)?,
            Field::Array(f) => self.array(id, f)?,
            Field::Stream(f) => self.stream(f),
        }
        Ok(())
    }

    /// Read and decode a scalar, emitting any candidates. Produces no value for fill or
    /// when the data runs out.
    fn scalar(&mut self, id: FieldId, f: &'a SimpleField) -> Result<Option<Value>> {
        let remaining = self.cursor.remaining();
        let len = match f.prefix_len {
            Some(width) => match self.cursor.read_uint(width) {
                Ok(len) => {
                    let len = usize::try_from(len).unwrap_or(usize::MAX);
                    let remaining = self.cursor.remaining();
                    if len > remaining {
                        warn!(field = %f.name, len, remaining, "length prefix exceeds data, truncating");
                        remaining
                    } else {
                        len
                    }
                }
                Err(_) => {
                    warn!(field = %f.name, remaining, "no data for length prefix, skipping remaining bytes");
                    self.cursor.skip(remaining);
                    return Ok(None);
                }
            },
            None => f.data_type.byte_len().unwrap_or(remaining),
        };

        if f.is_fill() {
            if self.cursor.skip(len) < len {
                warn!(field = %f.name, len, remaining, "fill extends past end of data");
            }
            return Ok(None);
        }

        let Ok(buf) = self.cursor.read(len) else {
            warn!(field = %f.name, len, remaining, "field extends past end of data, skipping remaining bytes");
            self.cursor.skip(len);
            return Ok(None);
        };

        let data_type = match (f.prefix_len, f.data_type.byte_len()) {
            (None, Some(_)) => f.data_type,
            _ => f.data_type.with_byte_len(len),
        };
        let Some(dn) = decode_scalar(&f.name, &data_type, f.attrs.unit.as_deref(), buf)? else {
            return Ok(None);
        };

        if let Some(v) = dn.as_u64() {
            self.last.insert(id, v);
        }
        if self.decom.options.channels {
            self.candidates(f, &dn);
        }
        Ok(Some(dn))
    }

    fn candidates(&mut self, f: &SimpleField, dn: &Value) {
        if let Some(kind) = f.time_tag {
            let base = f.data_type.base();
            let unit = TimeUnit::for_field(f.attrs.unit.as_deref());
            let (value, unit) = match (base, dn) {
                (BaseType::Time, Value::Sclk(sclk)) => (TagValue::Sclk(*sclk), unit),
                (BaseType::Time, Value::Unsigned(count)) => (TagValue::Count(*count), unit),
                (BaseType::Float, Value::Float(secs)) if f.data_type.bit_len() == 64 => {
                    (TagValue::Seconds(*secs), TimeUnit::Sclk)
                }
                _ => {
                    warn!(field = %f.name, %base, "time tag on a field that is not a time, ignoring");
                    return;
                }
            };
            let tag = TimeTagCandidate {
                kind,
                value,
                unit,
                bit_size: f.data_type.bit_len(),
            };
            trace!(field = %f.name, ?tag, "time tag");
            self.sink.candidate(tag.into());
        } else if let Some(channel_id) = &f.channel_id {
            self.sink
                .candidate(ChannelCandidate::new(channel_id, dn.clone()).into());
        }
    }

    /// Read a bit array window and extract its bit fields.
    fn bits(&mut self, f: &'a BitArrayField) -> Vec<(&'a BitField, Value)> {
        let len = f.byte_len();
        let Ok(buf) = self.cursor.read(len) else {
            warn!(
                field = %f.name,
                len,
                remaining = self.cursor.remaining(),
                "bit array extends past end of data, skipping remaining bytes"
            );
            self.cursor.skip(len);
            return Vec::default();
        };

        let mut offset = 0;
        let mut values = Vec::with_capacity(f.children.len());
        for child in &f.children {
            let Field::Bit(bit) = self.tree.get(*child) else {
                continue;
            };
            match extract_bits(buf, offset, bit.bit_len) {
                Ok(v) => values.push((bit, Value::Unsigned(v))),
                Err(err) => {
                    warn!(field = %bit.name, offset, "failed to extract bits: {err}");
                    break;
                }
            }
            offset += bit.bit_len;
        }
        values
    }

    fn structure(&mut self, f: &'a StructureField) -> Result<()> {
        if let Some(format) = &f.print_format {
            let mut batch = Batch::new(format);
            for (idx, child) in f.children.iter().enumerate() {
                if !self.cursor.has_more() {
                    warn!(structure = %f.name, skipped = f.children.len() - idx, "data exhausted before end of structure");
                    break;
                }
                self.batch_values(*child, false, &mut batch)?;
            }
            batch.finish(self.out);
            return Ok(());
        }

        self.out.structure_start(&f.name);
        for (idx, child) in f.children.iter().enumerate() {
            if !self.cursor.has_more() {
                warn!(structure = %f.name, skipped = f.children.len() - idx, "data exhausted before end of structure");
                break;
            }
            self.field(*child)?;
        }
        self.out.structure_end(&f.name);
        Ok(())
    }

    /// Decode `id` into `batch`. Scalars become batch values, resolved through lookups and EU
    /// conversion when `resolved` is set; other fields are output as usual.
    fn batch_values(&mut self, id: FieldId, resolved: bool, batch: &mut Batch<'_>) -> Result<()> {
        let offset = self.cursor.offset();
        let tree = self.tree;
        match tree.get(id) {
            Field::Simple(f) => {
                if let Some(dn) = self.scalar(id, f)? {
                    let value = if resolved {
                        self.decom.resolver.resolve_unformatted(&f.name, &dn, &f.attrs)
                    } else {
                        dn
                    };
                    batch.push(self.out, offset, value);
                }
            }
            Field::BitArray(f) => {
                for (bit, dn) in self.bits(f) {
                    let value = if resolved {
                        self.decom.resolver.resolve_unformatted(&bit.name, &dn, &bit.attrs)
                    } else {
                        dn
                    };
                    batch.push(self.out, offset, value);
                }
            }
            _ => self.field(id)?,
        }
        Ok(())
    }

    /// Number of repetitions for an array, reading its prefix if it has one. `None` means
    /// repeat until the data is exhausted.
    fn array_count(&mut self, f: &ArrayField) -> std::result::Result<Option<usize>, ()> {
        let count = match f.length {
            ArrayLength::Fixed(n) => Some(n),
            ArrayLength::InField(other) => match self.last.get(&other) {
                Some(v) => Some(usize::try_from(*v).unwrap_or(usize::MAX)),
                None => {
                    warn!(array = %f.name, "length field has not been decoded, array is empty");
                    Some(0)
                }
            },
            ArrayLength::InData {
                prefix_bytes,
                in_bytes,
            } => {
                let Ok(v) = self.cursor.read_uint(prefix_bytes) else {
                    let remaining = self.cursor.remaining();
                    warn!(array = %f.name, remaining, "no data for array length prefix, skipping remaining bytes");
                    self.cursor.skip(remaining);
                    return Err(());
                };
                let v = usize::try_from(v).unwrap_or(usize::MAX);
                if in_bytes {
                    // element size is static and non-zero for byte counts
                    let size = self.tree.sum_sizes(&f.elements).unwrap_or(1).max(1);
                    Some(v / size)
                } else {
                    Some(v)
                }
            }
            ArrayLength::UntilExhausted => None,
        };
        Ok(count)
    }

    fn array(&mut self, id: FieldId, f: &'a ArrayField) -> Result<()> {
        let start = self.cursor.offset();
        let Ok(count) = self.array_count(f) else {
            return Ok(());
        };

        // trailing pad arrays
        if let [element] = f.elements.as_slice() {
            if self.tree.get(*element).name() == FILL {
                let len = match (count, self.tree.static_size(*element)) {
                    (Some(n), Some(size)) => n.saturating_mul(size),
                    _ => self.cursor.remaining(),
                };
                let skipped = self.cursor.skip(len);
                trace!(array = %f.name, skipped, "skipped fill");
                return Ok(());
            }
        }

        let uniform = matches!(
            f.elements.as_slice(),
            [e] if matches!(self.tree.get(*e), Field::Simple(_))
        );
        let mut batch = f.print_format.as_ref().map(Batch::new);

        self.out.array_start(&f.name, count);
        let mut index = 0;
        loop {
            match count {
                Some(n) if index >= n => break,
                Some(n) if !self.cursor.has_more() => {
                    warn!(array = %f.name, index, expected = n, "data exhausted before end of array");
                    break;
                }
                None if !self.cursor.has_more() => {
                    debug!(array = %f.name, count = index, "array consumed remaining data");
                    break;
                }
                _ => (),
            }

            let before = self.cursor.offset();
            match batch.as_mut() {
                Some(batch) => {
                    for element in &f.elements {
                        self.batch_values(*element, uniform, batch)?;
                    }
                }
                None => {
                    let label = f.index_label(index);
                    self.out.array_index_start(&label);
                    for element in &f.elements {
                        self.field(*element)?;
                    }
                    self.out.array_index_end(&label);
                }
            }
            index += 1;

            if count.is_none() && self.cursor.offset() == before {
                warn!(array = %f.name, index, "array element consumed no data, stopping");
                break;
            }
        }
        if let Some(batch) = batch {
            batch.finish(self.out);
        }
        self.out.array_end(&f.name);

        if let Some(expected) = self.tree.static_size(id) {
            let consumed = self.cursor.offset() - start;
            if consumed < expected {
                warn!(array = %f.name, remaining = expected - consumed, "array read less than its declared size");
            }
        }
        Ok(())
    }

    fn stream(&mut self, f: &'a StreamField) {
        let remaining = self.cursor.remaining();
        let len = f.max_len.map_or(remaining, |max| max.min(remaining));
        let offset = self.cursor.offset();
        let Ok(data) = self.cursor.read(len) else {
            return;
        };
        trace!(stream = %f.name, len, "stream");

        match f.display {
            StreamDisplay::None => (),
            StreamDisplay::Text => {
                self.out
                    .name_value(&f.name, &Value::Text(trim_text(data)), None);
            }
            StreamDisplay::HexDump => hex_dump(self.out, offset, data),
        }

        if let Some(handler) = &f.handler {
            match &self.decom.streams {
                Some(streams) => streams.dispatch(handler, &f.name, data),
                None => debug!(stream = %f.name, handler = %handler, "no stream handler configured"),
            }
        }
    }
}

/// Text with surrounding NUL and space padding removed.
fn trim_text(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf)
        .trim_matches(|c: char| c == '\0' || c == ' ')
        .to_string()
}

/// Decode a value of `data_type` from exactly its bytes. Fill and unknown types produce no
/// value.
fn decode_scalar(
    name: &str,
    data_type: &DataType,
    unit: Option<&str>,
    buf: &[u8],
) -> Result<Option<Value>> {
    let bits = data_type.bit_len();
    let value = match (data_type.base(), bits) {
        (BaseType::UnsignedInt | BaseType::Enum, 8 | 16 | 24 | 32 | 64) => {
            Value::Unsigned(be_uint(buf))
        }
        (BaseType::Boolean, 8 | 16 | 24 | 32 | 64) => Value::Bool(be_uint(buf) != 0),
        (BaseType::SignedInt, 8 | 16 | 24 | 32 | 64) => {
            // sign extend from the encoded width
            let shift = 64 - bits;
            Value::Signed(((be_uint(buf) << shift) as i64) >> shift)
        }
        (BaseType::Float, 32) => Value::Float(f64::from(f32::from_bits(be_uint(buf) as u32))),
        (BaseType::Float, 64) => Value::Float(f64::from_bits(be_uint(buf))),
        (BaseType::String, _) => Value::Text(trim_text(buf)),
        (BaseType::Time, 32 | 64) => decode_time(bits, unit, buf),
        (BaseType::Fill | BaseType::Unknown, _) => return Ok(None),
        (base, bits) => {
            return Err(DefinitionError::UnsupportedType {
                field: name.to_string(),
                base,
                bits,
            }
            .into())
        }
    };
    Ok(Some(value))
}

/// Time fields in clock units are spacecraft clocks; 32 bits is coarse only and 64 bits is
/// coarse followed by a word holding fine ticks in its upper half. Other units are plain
/// counts.
fn decode_time(bits: usize, unit: Option<&str>, buf: &[u8]) -> Value {
    if !TimeUnit::for_field(unit).is_sclk_based() {
        return Value::Unsigned(be_uint(buf));
    }
    if bits == 32 {
        return Value::Sclk(Sclk::new(be_uint(buf), 0));
    }
    let (coarse, fine) = buf.split_at(4);
    Value::Sclk(Sclk::from_u64_encoding(
        be_uint(coarse) as u32,
        be_uint(fine) as u32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldAttrs;
    use test_case::test_case;

    #[test_case(BaseType::UnsignedInt, 8, &[0xfe], Value::Unsigned(0xfe))]
    #[test_case(BaseType::UnsignedInt, 24, &[0x01, 0x02, 0x03], Value::Unsigned(0x01_0203))]
    #[test_case(BaseType::UnsignedInt, 64, &[0xff; 8], Value::Unsigned(u64::MAX))]
    #[test_case(BaseType::Enum, 16, &[0x00, 0x02], Value::Unsigned(2))]
    #[test_case(BaseType::Boolean, 8, &[0x00], Value::Bool(false))]
    #[test_case(BaseType::Boolean, 32, &[0, 0, 1, 0], Value::Bool(true))]
    #[test_case(BaseType::SignedInt, 8, &[0xff], Value::Signed(-1))]
    #[test_case(BaseType::SignedInt, 16, &[0x80, 0x00], Value::Signed(-32768))]
    #[test_case(BaseType::SignedInt, 24, &[0xff, 0xff, 0xfe], Value::Signed(-2))]
    #[test_case(BaseType::SignedInt, 32, &[0x7f, 0xff, 0xff, 0xff], Value::Signed(i32::MAX as i64))]
    #[test_case(BaseType::SignedInt, 64, &[0x80, 0, 0, 0, 0, 0, 0, 0], Value::Signed(i64::MIN))]
    #[test_case(BaseType::Float, 32, &1.5f32.to_be_bytes(), Value::Float(1.5))]
    #[test_case(BaseType::Float, 64, &(-2.25f64).to_be_bytes(), Value::Float(-2.25))]
    #[test_case(BaseType::Time, 32, &[0, 0, 1, 0], Value::Sclk(Sclk::new(256, 0)))]
    #[test_case(BaseType::Time, 64, &[0, 0, 0, 9, 0x12, 0x34, 0x56, 0x78], Value::Sclk(Sclk::new(9, 0x1234)))]
    fn scalars(base: BaseType, bits: usize, buf: &[u8], expected: Value) {
        let data_type = DataType::new(base, bits);
        assert_eq!(
            decode_scalar("f", &data_type, None, buf).unwrap(),
            Some(expected)
        );
    }

    #[test]
    fn millisecond_time_is_count() {
        let data_type = DataType::new(BaseType::Time, 64);
        let buf = 5_000u64.to_be_bytes();
        assert_eq!(
            decode_scalar("t", &data_type, Some("ms"), &buf).unwrap(),
            Some(Value::Unsigned(5_000))
        );
    }

    #[test]
    fn unsupported_combination() {
        let data_type = DataType::new(BaseType::Float, 16);
        assert!(matches!(
            decode_scalar("f", &data_type, None, &[0, 0]),
            Err(Error::Definition(DefinitionError::UnsupportedType { .. }))
        ));
    }

    #[test]
    fn text_is_trimmed() {
        assert_eq!(trim_text(b"  abc\0\0"), "abc");
        assert_eq!(trim_text(b"a b "), "a b");
    }

    fn single(field: SimpleField) -> Decom {
        let mut builder = FieldTree::builder();
        let root = builder.add(field);
        Decom::new(Arc::new(builder.build(root).unwrap()))
    }

    #[test]
    fn prefix_longer_than_data_is_truncated() {
        let decom = single(SimpleField::new("s", DataType::rest(BaseType::String)).with_prefix(1));
        let decoded = decom.decode_collect(&[10, b'h', b'i']).unwrap();
        assert_eq!(decoded.output.value("s"), Some(&Value::from("hi")));
        assert_eq!(decoded.consumed, 3);
    }

    #[test]
    fn field_past_end_skips_remaining() {
        let decom = single(SimpleField::new("v", DataType::UINT32));
        let decoded = decom.decode_collect(&[1, 2]).unwrap();
        assert_eq!(decoded.output.values().count(), 0);
        assert_eq!(decoded.consumed, 2);
    }

    #[test]
    fn time_tag_replaces_channel_candidate() {
        let decom = single(
            SimpleField::new("t", DataType::new(BaseType::Time, 32))
                .with_channel("T-1")
                .with_time_tag(crate::channel::TimeTagKind::Absolute),
        );
        let decoded = decom.decode_collect(&[0, 0, 0, 5]).unwrap();
        assert_eq!(decoded.candidates.len(), 1);
        let Candidate::TimeTag(tag) = &decoded.candidates[0] else {
            panic!("expected time tag, got {:?}", decoded.candidates[0]);
        };
        assert_eq!(tag.value, TagValue::Sclk(Sclk::new(5, 0)));
        assert_eq!(tag.bit_size, 32);
    }

    #[test]
    fn time_tag_on_non_time_is_ignored() {
        let decom = single(
            SimpleField::new("n", DataType::UINT8)
                .with_channel("N-1")
                .with_time_tag(crate::channel::TimeTagKind::Absolute),
        );
        let decoded = decom.decode_collect(&[5]).unwrap();
        assert!(decoded.candidates.is_empty());
        assert_eq!(decoded.output.value("n"), Some(&Value::Unsigned(5)));
    }

    #[test]
    fn float_time_tag_is_seconds() {
        let decom = single(
            SimpleField::new("t", DataType::FLOAT64)
                .with_time_tag(crate::channel::TimeTagKind::Absolute),
        );
        let decoded = decom.decode_collect(&12.5f64.to_be_bytes()).unwrap();
        assert!(matches!(
            decoded.candidates.as_slice(),
            [Candidate::TimeTag(TimeTagCandidate {
                value: TagValue::Seconds(s),
                ..
            })] if *s == 12.5
        ));
    }

    #[test]
    fn channels_can_be_disabled() {
        let decom = single(SimpleField::new("v", DataType::UINT8).with_channel("V-1"))
            .with_options(DecomOptions::default().with_channels(false));
        let decoded = decom.decode_collect(&[1]).unwrap();
        assert!(decoded.candidates.is_empty());
        assert_eq!(decoded.output.value("v"), Some(&Value::Unsigned(1)));
    }

    #[test]
    fn unit_is_output() {
        let decom = single(
            SimpleField::new("v", DataType::UINT8).with_attrs(FieldAttrs::default().with_unit("V")),
        );
        let decoded = decom.decode_collect(&[1]).unwrap();
        assert_eq!(
            decoded.output.events()[0],
            crate::output::OutputEvent::NameValue {
                name: "v".to_string(),
                value: Value::Unsigned(1),
                unit: Some("V".to_string())
            }
        );
    }
}
