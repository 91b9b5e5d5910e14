use hifitime::{Duration, Epoch};

use super::{TagValue, TimeTagCandidate, TimeTagKind};
use crate::time::{Sclk, SclkFormat, TimeUnit};

/// Time established for a whole product.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProductTime {
    Sclk(Sclk),
    Ert(Epoch),
}

/// A base time and delta time that cannot be added together.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot add {delta} delta to {anchor} base time")]
pub struct TimeTagMismatch {
    pub anchor: String,
    pub delta: String,
}

fn describe(tag: &TimeTagCandidate) -> String {
    match tag.value {
        TagValue::Sclk(_) | TagValue::Seconds(_) => "SCLK".to_string(),
        TagValue::Count(_) => format!("{} count", tag.unit),
    }
}

/// Clock value of a tag, with fine ticks reduced to fit `format` when the tag was decoded
/// from a wider encoding.
fn tag_sclk(tag: &TimeTagCandidate, sclk: Sclk, format: &SclkFormat) -> Sclk {
    if tag.bit_size > format.total_bits() {
        sclk.round_fine(format)
    } else {
        sclk
    }
}

fn anchor_time(tag: &TimeTagCandidate, format: &SclkFormat) -> Option<ProductTime> {
    match tag.value {
        TagValue::Sclk(sclk) => Some(ProductTime::Sclk(tag_sclk(tag, sclk, format))),
        TagValue::Seconds(secs) => Some(ProductTime::Sclk(Sclk::from_seconds(secs, format))),
        TagValue::Count(count) => tag.unit.to_epoch(count).map(ProductTime::Ert),
    }
}

/// Determine product time from the time tags of a product, in decode order.
///
/// The most recent absolute or base tag is the anchor. A base anchor is combined with the
/// most recent delta tag following it:
///
/// | base | delta | result |
/// |---|---|---|
/// | SCLK | SCLK | coarse and fine ticks added |
/// | SCLK | MS count | milliseconds converted to ticks and added |
/// | ERT | MS count | milliseconds added |
///
/// Clocks decoded from encodings wider than `format` have their fine ticks reduced to fit
/// before they are combined.
///
/// Returns `Ok(None)` if there is no anchor.
///
/// # Errors
/// [TimeTagMismatch] for any other base and delta combination.
pub fn resolve_time(
    tags: &[TimeTagCandidate],
    format: &SclkFormat,
) -> Result<Option<ProductTime>, TimeTagMismatch> {
    let Some(idx) = tags.iter().rposition(|t| t.kind != TimeTagKind::Delta) else {
        return Ok(None);
    };
    let anchor = &tags[idx];
    let delta = match anchor.kind {
        TimeTagKind::Base => tags[idx + 1..]
            .iter()
            .rev()
            .find(|t| t.kind == TimeTagKind::Delta),
        _ => None,
    };

    let Some(base) = anchor_time(anchor, format) else {
        return Ok(None);
    };
    let mismatch = |delta: &TimeTagCandidate| TimeTagMismatch {
        anchor: describe(anchor),
        delta: describe(delta),
    };

    let time = match (base, delta) {
        (time, None) => time,
        (ProductTime::Sclk(base), Some(d)) => match (d.value, d.unit) {
            (TagValue::Sclk(sclk), _) => {
                ProductTime::Sclk(base.add(&tag_sclk(d, sclk, format), format))
            }
            (TagValue::Seconds(secs), _) => {
                ProductTime::Sclk(base.add(&Sclk::from_seconds(secs, format), format))
            }
            (TagValue::Count(ms), TimeUnit::Ms) => ProductTime::Sclk(base.add_millis(ms, format)),
            _ => return Err(mismatch(d)),
        },
        (ProductTime::Ert(base), Some(d)) => match (d.value, d.unit) {
            (TagValue::Count(ms), TimeUnit::Ms) => {
                ProductTime::Ert(base + Duration::from_milliseconds(ms as f64))
            }
            _ => return Err(mismatch(d)),
        },
    };

    Ok(Some(time))
}
