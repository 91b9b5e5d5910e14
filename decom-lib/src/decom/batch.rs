use crate::output::OutputFormatter;
use crate::printf::PrintFormat;
use crate::value::Value;

/// Collects values into groups sized to a print format's placeholders, emitting one
/// formatted line per full group.
pub(crate) struct Batch<'a> {
    format: &'a PrintFormat,
    size: usize,
    values: Vec<Value>,
    offset: usize,
}

impl<'a> Batch<'a> {
    pub fn new(format: &'a PrintFormat) -> Self {
        // a format without placeholders renders its literal text once per value
        let size = format.placeholders().max(1);
        Batch {
            format,
            size,
            values: Vec::with_capacity(size),
            offset: 0,
        }
    }

    /// Add a value decoded at byte `offset`.
    pub fn push(&mut self, out: &mut dyn OutputFormatter, offset: usize, value: Value) {
        if self.values.is_empty() {
            self.offset = offset;
        }
        self.values.push(value);
        if self.values.len() == self.size {
            out.formatted_line(self.offset, &self.format.render(&self.values));
            self.values.clear();
        }
    }

    /// Emit any partial group using only as many placeholders as there are values.
    pub fn finish(self, out: &mut dyn OutputFormatter) {
        if self.values.is_empty() {
            return;
        }
        let format = self.format.truncated(self.values.len());
        out.formatted_line(self.offset, &format.render(&self.values));
    }
}
