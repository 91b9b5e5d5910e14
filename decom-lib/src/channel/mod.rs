//! Channel candidates and their conversion into time-correlated channel samples.
//!
//! The decoder emits a [Candidate] for every channel and time tag field it decodes. A
//! [Channelizer] buffers the candidates of one product and, when the product ends, resolves
//! the product time from its time tags and publishes the finished [ChannelSample]s as a
//! single [SampleBatch] through a [ChannelTransport].
mod channelizer;
mod resolve;

use std::fmt::Display;

use crossbeam::channel::Sender;
use derive_more::From;
use hifitime::Epoch;
use serde::{Deserialize, Serialize, Serializer};
use tracing::warn;
use typed_builder::TypedBuilder;

pub use channelizer::{Channelizer, ChannelizerConfig, MarkingPolicy};
pub use resolve::{resolve_time, ProductTime, TimeTagMismatch};

use crate::prelude::*;
use crate::time::{LocalSolarTime, Sclk, TimeUnit};
use crate::value::Value;
use crate::{Scid, Vcid};

/// Role of a time tag field in establishing product time.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimeTagKind {
    /// Complete time on its own.
    Absolute,
    /// Time to which a following delta is added.
    Base,
    /// Offset from the preceding base.
    Delta,
}

impl Display for TimeTagKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Absolute => "ABSOLUTE",
            Self::Base => "BASE",
            Self::Delta => "DELTA",
        };
        f.write_str(s)
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TagValue {
    Sclk(Sclk),
    /// Plain count in the tag's [TimeUnit].
    Count(u64),
    /// Spacecraft clock seconds from a floating point field.
    Seconds(f64),
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TimeTagCandidate {
    pub kind: TimeTagKind,
    pub value: TagValue,
    pub unit: TimeUnit,
    /// Width of the encoded value.
    pub bit_size: usize,
}

impl TimeTagCandidate {
    #[must_use]
    pub fn is_sclk_based(&self) -> bool {
        matches!(self.value, TagValue::Sclk(_) | TagValue::Seconds(_))
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ChannelCandidate {
    pub channel_id: String,
    pub dn: Value,
    /// Field specific clock that takes precedence over the product time. The decoder never
    /// sets this; it is for callers that feed candidates to a channelizer themselves.
    pub sclk: Option<Sclk>,
}

impl ChannelCandidate {
    pub fn new(channel_id: &str, dn: Value) -> Self {
        ChannelCandidate {
            channel_id: channel_id.to_string(),
            dn,
            sclk: None,
        }
    }

    /// Give this sample its own clock, overriding the product time when the product is
    /// channelized.
    pub fn with_sclk(mut self, sclk: Sclk) -> Self {
        self.sclk = Some(sclk);
        self
    }
}

#[derive(Debug, Clone, PartialEq, From)]
pub enum Candidate {
    Channel(ChannelCandidate),
    TimeTag(TimeTagCandidate),
}

/// Receives candidates from the decoder.
pub trait CandidateSink {
    fn candidate(&mut self, candidate: Candidate);
}

impl CandidateSink for Vec<Candidate> {
    fn candidate(&mut self, candidate: Candidate) {
        self.push(candidate);
    }
}

/// Messages driving a [Channelizer] running on its own thread. See [Channelizer::run].
#[derive(Debug, Clone)]
pub enum ChannelizerMessage {
    StartProduct(ProductIdentity),
    Candidate(Candidate),
    EndProduct,
}

impl CandidateSink for Sender<ChannelizerMessage> {
    fn candidate(&mut self, candidate: Candidate) {
        if let Err(err) = self.send(ChannelizerMessage::Candidate(candidate)) {
            warn!("channelizer has gone away, dropping candidate: {err}");
        }
    }
}

pub(crate) fn ser_epoch<S: Serializer>(epoch: &Option<Epoch>, s: S) -> std::result::Result<S::Ok, S::Error> {
    match epoch {
        Some(e) => s.serialize_some(&e.to_string()),
        None => s.serialize_none(),
    }
}

/// Identity of the product a batch of samples came from.
#[derive(Serialize, Debug, Clone, PartialEq, TypedBuilder)]
pub struct ProductIdentity {
    #[builder(setter(into))]
    pub product_id: String,
    pub scid: Scid,
    #[builder(default)]
    pub station_id: u16,
    #[builder(default)]
    pub vcid: Vcid,
    /// Earth receive time of the product.
    #[builder(default, setter(strip_option))]
    #[serde(serialize_with = "ser_epoch")]
    pub ert: Option<Epoch>,
    /// Product was not received completely.
    #[builder(default)]
    pub partial: bool,
}

/// A finished channel value.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ChannelSample {
    pub channel_id: String,
    pub dn: Value,
    pub sclk: Option<Sclk>,
    #[serde(serialize_with = "ser_epoch")]
    pub ert: Option<Epoch>,
    #[serde(serialize_with = "ser_epoch")]
    pub scet: Option<Epoch>,
    pub lst: Option<LocalSolarTime>,
    pub realtime: bool,
}

/// All samples from one product, with the product level times.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SampleBatch {
    pub samples: Vec<ChannelSample>,
    /// Record creation time.
    #[serde(serialize_with = "ser_epoch")]
    pub rct: Option<Epoch>,
    #[serde(serialize_with = "ser_epoch")]
    pub ert: Option<Epoch>,
    #[serde(serialize_with = "ser_epoch")]
    pub scet: Option<Epoch>,
    pub sclk: Option<Sclk>,
    pub lst: Option<LocalSolarTime>,
    pub product: ProductIdentity,
    /// Product time could not be determined or the product is partial.
    pub fault: bool,
}

/// Destination for finished samples.
pub trait ChannelTransport {
    /// Publish all samples of a product.
    ///
    /// # Errors
    /// [Error::Transport] if the batch could not be delivered.
    fn publish_batch(&self, batch: SampleBatch) -> Result<()>;
}

/// Publishes batches to a crossbeam channel.
#[derive(Debug, Clone)]
pub struct CrossbeamTransport {
    tx: Sender<SampleBatch>,
}

impl CrossbeamTransport {
    pub fn new(tx: Sender<SampleBatch>) -> Self {
        CrossbeamTransport { tx }
    }
}

impl ChannelTransport for CrossbeamTransport {
    fn publish_batch(&self, batch: SampleBatch) -> Result<()> {
        self.tx
            .send(batch)
            .map_err(|err| Error::Transport(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_kind_display() {
        assert_eq!(TimeTagKind::Base.to_string(), "BASE");
        assert_eq!(
            serde_json::from_str::<TimeTagKind>("\"delta\"").unwrap(),
            TimeTagKind::Delta
        );
    }

    #[test]
    fn crossbeam_transport_disconnected() {
        let (tx, rx) = crossbeam::channel::unbounded();
        drop(rx);
        let transport = CrossbeamTransport::new(tx);
        let batch = SampleBatch {
            samples: vec![],
            rct: None,
            ert: None,
            scet: None,
            sclk: None,
            lst: None,
            product: ProductIdentity::builder().product_id("p").scid(1).build(),
            fault: false,
        };
        assert!(matches!(
            transport.publish_batch(batch),
            Err(Error::Transport(_))
        ));
    }

    #[test]
    fn sender_sink() {
        let (mut tx, rx) = crossbeam::channel::unbounded::<ChannelizerMessage>();
        tx.candidate(ChannelCandidate::new("A-1", Value::Unsigned(1)).into());
        assert!(matches!(
            rx.try_recv().unwrap(),
            ChannelizerMessage::Candidate(Candidate::Channel(_))
        ));
    }
}
