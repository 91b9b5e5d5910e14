//! Sinks for structured decode output.
use std::io::Write;

use serde::Serialize;

use crate::value::Value;

/// Receives structured output as a product is decoded.
pub trait OutputFormatter {
    fn structure_start(&mut self, name: &str);
    fn structure_end(&mut self, name: &str);
    /// Start of an array; `len` is `None` when the count is only known once the data runs out.
    fn array_start(&mut self, name: &str, len: Option<usize>);
    fn array_index_start(&mut self, label: &str);
    fn array_index_end(&mut self, label: &str);
    fn array_end(&mut self, name: &str);
    fn name_value(&mut self, name: &str, value: &Value, unit: Option<&str>);
    /// A line rendered from a print format, tagged with the byte offset of its first value.
    fn formatted_line(&mut self, offset: usize, line: &str);
    /// A line of raw data display, e.g., a hex dump, tagged with its byte offset.
    fn address_value(&mut self, offset: usize, line: &str);
}

/// Bytes per [hex_dump] line.
pub const HEX_DUMP_WIDTH: usize = 16;

/// Write `data` as hex dump lines, `offset` being the product offset of `data[0]`.
pub fn hex_dump(out: &mut dyn OutputFormatter, offset: usize, data: &[u8]) {
    for (i, chunk) in data.chunks(HEX_DUMP_WIDTH).enumerate() {
        let hex = chunk
            .chunks(2)
            .map(hex::encode)
            .collect::<Vec<_>>()
            .join(" ");
        let ascii: String = chunk
            .iter()
            .map(|b| {
                if b.is_ascii_graphic() || *b == b' ' {
                    char::from(*b)
                } else {
                    '.'
                }
            })
            .collect();
        // 2 hex chars per byte plus a space per pair
        let width = HEX_DUMP_WIDTH * 2 + HEX_DUMP_WIDTH / 2 - 1;
        out.address_value(offset + i * HEX_DUMP_WIDTH, &format!("{hex:<width$}  {ascii}"));
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OutputEvent {
    StructureStart {
        name: String,
    },
    StructureEnd {
        name: String,
    },
    ArrayStart {
        name: String,
        len: Option<usize>,
    },
    ArrayIndexStart {
        label: String,
    },
    ArrayIndexEnd {
        label: String,
    },
    ArrayEnd {
        name: String,
    },
    NameValue {
        name: String,
        value: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
    },
    FormattedLine {
        offset: usize,
        line: String,
    },
    AddressValue {
        offset: usize,
        line: String,
    },
}

/// Records every output event in order.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Vec<OutputEvent>,
}

impl EventRecorder {
    #[must_use]
    pub fn events(&self) -> &[OutputEvent] {
        &self.events
    }

    #[must_use]
    pub fn into_events(self) -> Vec<OutputEvent> {
        self.events
    }

    /// All name/value pairs, in order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.events.iter().filter_map(|e| match e {
            OutputEvent::NameValue { name, value, .. } => Some((name.as_str(), value)),
            _ => None,
        })
    }

    /// The first value output for `name`.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    /// All formatted lines, in order.
    pub fn formatted_lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.events.iter().filter_map(|e| match e {
            OutputEvent::FormattedLine { offset, line } => Some((*offset, line.as_str())),
            _ => None,
        })
    }
}

impl OutputFormatter for EventRecorder {
    fn structure_start(&mut self, name: &str) {
        self.events.push(OutputEvent::StructureStart {
            name: name.to_string(),
        });
    }

    fn structure_end(&mut self, name: &str) {
        self.events.push(OutputEvent::StructureEnd {
            name: name.to_string(),
        });
    }

    fn array_start(&mut self, name: &str, len: Option<usize>) {
        self.events.push(OutputEvent::ArrayStart {
            name: name.to_string(),
            len,
        });
    }

    fn array_index_start(&mut self, label: &str) {
        self.events.push(OutputEvent::ArrayIndexStart {
            label: label.to_string(),
        });
    }

    fn array_index_end(&mut self, label: &str) {
        self.events.push(OutputEvent::ArrayIndexEnd {
            label: label.to_string(),
        });
    }

    fn array_end(&mut self, name: &str) {
        self.events.push(OutputEvent::ArrayEnd {
            name: name.to_string(),
        });
    }

    fn name_value(&mut self, name: &str, value: &Value, unit: Option<&str>) {
        self.events.push(OutputEvent::NameValue {
            name: name.to_string(),
            value: value.clone(),
            unit: unit.map(str::to_string),
        });
    }

    fn formatted_line(&mut self, offset: usize, line: &str) {
        self.events.push(OutputEvent::FormattedLine {
            offset,
            line: line.to_string(),
        });
    }

    fn address_value(&mut self, offset: usize, line: &str) {
        self.events.push(OutputEvent::AddressValue {
            offset,
            line: line.to_string(),
        });
    }
}

/// Indented, human readable output.
///
/// Write errors are held until [TextFormatter::finish] so decoding is never interrupted by
/// the output.
#[derive(Debug)]
pub struct TextFormatter<W: Write> {
    out: W,
    depth: usize,
    error: Option<std::io::Error>,
}

impl<W: Write> TextFormatter<W> {
    pub fn new(out: W) -> Self {
        TextFormatter {
            out,
            depth: 0,
            error: None,
        }
    }

    /// Flush and return the writer.
    ///
    /// # Errors
    /// The first error that occurred writing output.
    pub fn finish(mut self) -> std::io::Result<W> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.out.flush()?;
        Ok(self.out)
    }

    fn line(&mut self, text: &str) {
        if self.error.is_some() {
            return;
        }
        let indent = "  ".repeat(self.depth);
        if let Err(err) = writeln!(self.out, "{indent}{text}") {
            self.error = Some(err);
        }
    }

    fn close(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

impl<W: Write> OutputFormatter for TextFormatter<W> {
    fn structure_start(&mut self, name: &str) {
        self.line(&format!("{name}:"));
        self.depth += 1;
    }

    fn structure_end(&mut self, _name: &str) {
        self.close();
    }

    fn array_start(&mut self, name: &str, len: Option<usize>) {
        match len {
            Some(n) => self.line(&format!("{name}[{n}]:")),
            None => self.line(&format!("{name}[]:")),
        }
        self.depth += 1;
    }

    fn array_index_start(&mut self, label: &str) {
        self.line(&format!("[{label}]"));
        self.depth += 1;
    }

    fn array_index_end(&mut self, _label: &str) {
        self.close();
    }

    fn array_end(&mut self, _name: &str) {
        self.close();
    }

    fn name_value(&mut self, name: &str, value: &Value, unit: Option<&str>) {
        match unit {
            Some(unit) => self.line(&format!("{name} = {value} {unit}")),
            None => self.line(&format!("{name} = {value}")),
        }
    }

    fn formatted_line(&mut self, offset: usize, line: &str) {
        self.line(&format!("{offset:08X}  {}", line.trim_end()));
    }

    fn address_value(&mut self, offset: usize, line: &str) {
        self.line(&format!("{offset:08X}  {line}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_output() {
        let mut fmt = TextFormatter::new(Vec::new());
        fmt.structure_start("hk");
        fmt.name_value("volts", &Value::Float(3.5), Some("V"));
        fmt.array_start("temps", Some(1));
        fmt.array_index_start("0");
        fmt.name_value("temp", &Value::Signed(-4), None);
        fmt.array_index_end("0");
        fmt.array_end("temps");
        fmt.formatted_line(10, "a, b\n");
        fmt.structure_end("hk");

        let text = String::from_utf8(fmt.finish().unwrap()).unwrap();
        let expected = "hk:
  volts = 3.5 V
  temps[1]:
    [0]
      temp = -4
  0000000A  a, b
";
        assert_eq!(text, expected);
    }

    #[test]
    fn hex_dump_lines() {
        let mut rec = EventRecorder::default();
        let data: Vec<u8> = (0x41..0x41 + 18).collect();
        hex_dump(&mut rec, 4, &data);

        let events = rec.events();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            OutputEvent::AddressValue {
                offset: 4,
                line: "4142 4344 4546 4748 494a 4b4c 4d4e 4f50  ABCDEFGHIJKLMNOP".to_string()
            }
        );
        let OutputEvent::AddressValue { offset, line } = &events[1] else {
            panic!("expected address value");
        };
        assert_eq!(*offset, 20);
        assert!(line.starts_with("5152 "), "got {line}");
        assert!(line.ends_with("  QR"), "got {line}");
    }

    #[test]
    fn recorder_lookups() {
        let mut rec = EventRecorder::default();
        rec.name_value("a", &Value::Unsigned(1), None);
        rec.name_value("a", &Value::Unsigned(2), None);
        rec.formatted_line(3, "x");
        assert_eq!(rec.value("a"), Some(&Value::Unsigned(1)));
        assert_eq!(rec.values().count(), 2);
        assert_eq!(rec.formatted_lines().collect::<Vec<_>>(), vec![(3, "x")]);
    }
}
