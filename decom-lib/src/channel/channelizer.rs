use std::sync::Arc;

use crossbeam::channel::Receiver;
use hifitime::Epoch;
use serde::Deserialize;
use tracing::{debug, error, trace, warn};

use super::{
    resolve_time, Candidate, CandidateSink, ChannelCandidate, ChannelSample, ChannelTransport,
    ChannelizerMessage, ProductIdentity, ProductTime, SampleBatch, TimeTagCandidate,
};
use crate::prelude::*;
use crate::time::{LocalSolarTime, Sclk, SclkFormat, TimeCorrelation};
use crate::Scid;

/// Whether samples are marked as realtime or recorded telemetry.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MarkingPolicy {
    Realtime,
    #[default]
    Recorded,
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ChannelizerConfig {
    /// Canonical spacecraft clock encoding for the mission.
    pub sclk_format: SclkFormat,
    /// Derive local solar time from SCET.
    pub lst_enabled: bool,
    pub marking: MarkingPolicy,
}

impl ChannelizerConfig {
    pub fn with_sclk_format(mut self, format: SclkFormat) -> Self {
        self.sclk_format = format;
        self
    }

    pub fn with_lst(mut self, enabled: bool) -> Self {
        self.lst_enabled = enabled;
        self
    }

    pub fn with_marking(mut self, marking: MarkingPolicy) -> Self {
        self.marking = marking;
        self
    }
}

/// Buffers the candidates of one product at a time and publishes them as samples.
///
/// A product is opened with [Channelizer::start_product], which discards anything left over
/// from a product that was never ended, and closed with [Channelizer::end_product]. Candidates
/// received while no product is open are dropped. Products decoded concurrently need their
/// own channelizers.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use decom::channel::{
///     ChannelCandidate, Channelizer, ChannelizerConfig, CrossbeamTransport, ProductIdentity,
/// };
/// use decom::{LocalSolarTime, Scid, Sclk, TimeCorrelation, Value};
/// use hifitime::Epoch;
///
/// struct NoCorrelation;
///
/// impl TimeCorrelation for NoCorrelation {
///     fn sclk_to_scet(&self, _: &Sclk, _: Option<Epoch>, _: Scid) -> Option<Epoch> {
///         None
///     }
///     fn scet_to_lst(&self, _: Epoch, _: Scid) -> Option<LocalSolarTime> {
///         None
///     }
/// }
///
/// let (tx, rx) = crossbeam::channel::unbounded();
/// let mut channelizer = Channelizer::new(
///     ChannelizerConfig::default(),
///     Arc::new(NoCorrelation),
///     CrossbeamTransport::new(tx),
/// );
///
/// channelizer.start_product(ProductIdentity::builder().product_id("p1").scid(42).build());
/// channelizer.add(ChannelCandidate::new("A-0001", Value::Unsigned(7)).into());
/// assert_eq!(channelizer.end_product().unwrap(), 1);
///
/// let batch = rx.recv().unwrap();
/// assert_eq!(batch.samples[0].channel_id, "A-0001");
/// assert_eq!(batch.product.scid, 42);
/// ```
pub struct Channelizer<T: ChannelTransport> {
    config: ChannelizerConfig,
    correlation: Arc<dyn TimeCorrelation>,
    transport: T,
    product: Option<ProductIdentity>,
    channels: Vec<ChannelCandidate>,
    time_tags: Vec<TimeTagCandidate>,
}

impl<T: ChannelTransport> Channelizer<T> {
    pub fn new(config: ChannelizerConfig, correlation: Arc<dyn TimeCorrelation>, transport: T) -> Self {
        Channelizer {
            config,
            correlation,
            transport,
            product: None,
            channels: Vec::default(),
            time_tags: Vec::default(),
        }
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Number of candidates buffered for the open product.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.channels.len() + self.time_tags.len()
    }

    /// Open a new product, clearing all buffered candidates.
    pub fn start_product(&mut self, product: ProductIdentity) {
        if let Some(prev) = &self.product {
            warn!(
                product = %prev.product_id,
                discarded = self.buffered(),
                "product was never ended"
            );
        }
        trace!(product = %product.product_id, "start product");
        self.clear();
        self.product = Some(product);
    }

    /// Buffer a candidate for the open product.
    pub fn add(&mut self, candidate: Candidate) {
        if self.product.is_none() {
            warn!(?candidate, "no open product, dropping candidate");
            return;
        }
        match candidate {
            Candidate::Channel(c) => self.channels.push(c),
            Candidate::TimeTag(t) => self.time_tags.push(t),
        }
    }

    fn clear(&mut self) {
        self.channels.clear();
        self.time_tags.clear();
    }

    fn correlate(&self, sclk: &Sclk, ert: Option<Epoch>, scid: Scid) -> (Option<Epoch>, Option<LocalSolarTime>) {
        let scet = self.correlation.sclk_to_scet(sclk, ert, scid);
        (scet, self.lst(scet, scid))
    }

    fn lst(&self, scet: Option<Epoch>, scid: Scid) -> Option<LocalSolarTime> {
        if !self.config.lst_enabled {
            return None;
        }
        scet.and_then(|scet| self.correlation.scet_to_lst(scet, scid))
    }

    /// Resolve product time, publish all buffered samples and close the product. Returns the
    /// number of samples published.
    ///
    /// # Errors
    /// [Error::Transport] if publishing fails. The product is closed regardless.
    pub fn end_product(&mut self) -> Result<usize> {
        let Some(product) = self.product.take() else {
            warn!("end of product without an open product");
            return Ok(0);
        };
        let channels = std::mem::take(&mut self.channels);
        let time_tags = std::mem::take(&mut self.time_tags);

        if channels.is_empty() {
            debug!(product = %product.product_id, "no channels in product");
            return Ok(0);
        }

        let format = self.config.sclk_format;
        let (time, mismatch) = match resolve_time(&time_tags, &format) {
            Ok(time) => (time, false),
            Err(err) => {
                warn!(product = %product.product_id, "abandoning time correlation: {err}");
                (None, true)
            }
        };

        let scid = product.scid;
        let (sclk, ert, scet) = match time {
            Some(ProductTime::Sclk(sclk)) => (
                Some(sclk),
                product.ert,
                self.correlation.sclk_to_scet(&sclk, product.ert, scid),
            ),
            Some(ProductTime::Ert(ert)) => {
                (None, Some(ert), self.correlation.ert_to_scet(ert, scid))
            }
            None => (None, product.ert, None),
        };
        let lst = self.lst(scet, scid);
        let realtime = self.config.marking == MarkingPolicy::Realtime;

        let samples: Vec<ChannelSample> = channels
            .into_iter()
            .map(|c| {
                let (sclk, scet, lst) = match c.sclk {
                    Some(own) => {
                        let (scet, lst) = self.correlate(&own, product.ert, scid);
                        (Some(own), scet, lst)
                    }
                    None => (sclk, scet, lst),
                };
                ChannelSample {
                    channel_id: c.channel_id,
                    dn: c.dn,
                    sclk,
                    ert,
                    scet,
                    lst,
                    realtime,
                }
            })
            .collect();

        let count = samples.len();
        let fault = mismatch || product.partial;
        debug!(product = %product.product_id, count, fault, "publishing samples");
        self.transport.publish_batch(SampleBatch {
            samples,
            rct: Epoch::now().ok(),
            ert,
            scet,
            sclk,
            lst,
            product,
            fault,
        })?;
        Ok(count)
    }

    /// Handle a single message.
    ///
    /// # Errors
    /// See [Channelizer::end_product].
    pub fn handle(&mut self, msg: ChannelizerMessage) -> Result<()> {
        match msg {
            ChannelizerMessage::StartProduct(product) => self.start_product(product),
            ChannelizerMessage::Candidate(candidate) => self.add(candidate),
            ChannelizerMessage::EndProduct => {
                self.end_product()?;
            }
        }
        Ok(())
    }

    /// Handle messages in order until all senders are gone. Publishing failures are logged
    /// and do not stop processing.
    pub fn run(mut self, rx: Receiver<ChannelizerMessage>) -> T {
        for msg in rx {
            if let Err(err) = self.handle(msg) {
                error!("failed to publish samples: {err}");
            }
        }
        debug!("channelizer input closed");
        self.transport
    }
}

impl<T: ChannelTransport> CandidateSink for Channelizer<T> {
    fn candidate(&mut self, candidate: Candidate) {
        self.add(candidate);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use hifitime::Duration;

    use super::*;
    use crate::channel::{TagValue, TimeTagKind};
    use crate::time::TimeUnit;
    use crate::value::Value;

    /// SCET is the clock seconds after the Unix epoch.
    struct Linear;

    impl TimeCorrelation for Linear {
        fn sclk_to_scet(&self, sclk: &Sclk, _ert: Option<Epoch>, _scid: Scid) -> Option<Epoch> {
            let secs = sclk.as_seconds(&SclkFormat::default());
            Some(Epoch::from_unix_seconds(secs))
        }

        fn scet_to_lst(&self, _scet: Epoch, _scid: Scid) -> Option<LocalSolarTime> {
            Some(LocalSolarTime {
                sol: 1,
                millis_of_sol: 2,
            })
        }
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<SampleBatch>>);

    impl ChannelTransport for Collect {
        fn publish_batch(&self, batch: SampleBatch) -> Result<()> {
            self.0.lock().unwrap().push(batch);
            Ok(())
        }
    }

    impl Collect {
        fn batches(&self) -> Vec<SampleBatch> {
            self.0.lock().unwrap().clone()
        }
    }

    fn channelizer(config: ChannelizerConfig) -> Channelizer<Collect> {
        Channelizer::new(config, Arc::new(Linear), Collect::default())
    }

    fn product(id: &str) -> ProductIdentity {
        ProductIdentity::builder()
            .product_id(id)
            .scid(77)
            .station_id(14)
            .vcid(3)
            .build()
    }

    fn sclk_tag(kind: TimeTagKind, coarse: u64, fine: u64) -> Candidate {
        TimeTagCandidate {
            kind,
            value: TagValue::Sclk(Sclk::new(coarse, fine)),
            unit: TimeUnit::Sclk,
            bit_size: 48,
        }
        .into()
    }

    fn chan(id: &str, v: u64) -> Candidate {
        ChannelCandidate::new(id, Value::Unsigned(v)).into()
    }

    #[test]
    fn publishes_in_capture_order_with_product_time() {
        let mut c = channelizer(ChannelizerConfig::default().with_lst(true));
        c.start_product(product("p1"));
        c.add(chan("A", 1));
        c.add(sclk_tag(TimeTagKind::Base, 100, 0));
        c.add(chan("B", 2));
        c.add(sclk_tag(TimeTagKind::Delta, 0, 32_768));
        c.add(chan("C", 3));
        assert_eq!(c.end_product().unwrap(), 3);

        let batches = c.transport().batches();
        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        let ids: Vec<&str> = batch.samples.iter().map(|s| s.channel_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);

        let expected = Sclk::new(100, 32_768);
        assert_eq!(batch.sclk, Some(expected));
        assert_eq!(batch.scet, Some(Epoch::from_unix_seconds(100.5)));
        assert!(batch.lst.is_some());
        assert!(!batch.fault);
        assert_eq!(batch.product.station_id, 14);
        assert_eq!(batch.product.vcid, 3);
        for sample in &batch.samples {
            assert_eq!(sample.sclk, Some(expected));
            assert_eq!(sample.scet, batch.scet);
            assert!(!sample.realtime);
        }
    }

    #[test]
    fn mismatch_publishes_without_time() {
        let mut c = channelizer(ChannelizerConfig::default());
        c.start_product(product("p1"));
        c.add(sclk_tag(TimeTagKind::Base, 100, 0));
        c.add(
            TimeTagCandidate {
                kind: TimeTagKind::Delta,
                value: TagValue::Count(5),
                unit: TimeUnit::Us,
                bit_size: 32,
            }
            .into(),
        );
        c.add(chan("A", 1));
        assert_eq!(c.end_product().unwrap(), 1);

        let batch = &c.transport().batches()[0];
        assert!(batch.fault);
        assert_eq!(batch.sclk, None);
        assert_eq!(batch.scet, None);
        assert_eq!(batch.samples[0].sclk, None);
    }

    #[test]
    fn ert_anchor_and_marking() {
        let mut c = channelizer(ChannelizerConfig::default().with_marking(MarkingPolicy::Realtime));
        c.start_product(product("p1"));
        c.add(
            TimeTagCandidate {
                kind: TimeTagKind::Base,
                value: TagValue::Count(10_000),
                unit: TimeUnit::Ms,
                bit_size: 32,
            }
            .into(),
        );
        c.add(
            TimeTagCandidate {
                kind: TimeTagKind::Delta,
                value: TagValue::Count(250),
                unit: TimeUnit::Ms,
                bit_size: 32,
            }
            .into(),
        );
        c.add(chan("A", 1));
        c.end_product().unwrap();

        let batch = &c.transport().batches()[0];
        let expected = Epoch::from_unix_milliseconds(10_000.0) + Duration::from_milliseconds(250.0);
        assert_eq!(batch.ert, Some(expected));
        assert_eq!(batch.samples[0].ert, Some(expected));
        // default correlation cannot convert ERT
        assert_eq!(batch.scet, None);
        assert!(batch.samples[0].realtime);
    }

    #[test]
    fn start_product_clears_previous() {
        let mut c = channelizer(ChannelizerConfig::default());
        c.start_product(product("p1"));
        c.add(chan("stale", 1));
        c.add(sclk_tag(TimeTagKind::Absolute, 5, 0));
        c.start_product(product("p2"));
        assert_eq!(c.buffered(), 0);
        c.add(chan("fresh", 2));
        c.end_product().unwrap();

        let batches = c.transport().batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].product.product_id, "p2");
        assert_eq!(batches[0].samples.len(), 1);
        assert_eq!(batches[0].samples[0].channel_id, "fresh");
        assert_eq!(batches[0].sclk, None);
    }

    #[test]
    fn candidates_without_product_are_dropped() {
        let mut c = channelizer(ChannelizerConfig::default());
        c.add(chan("A", 1));
        assert_eq!(c.buffered(), 0);
        assert_eq!(c.end_product().unwrap(), 0);
        assert!(c.transport().batches().is_empty());
    }

    #[test]
    fn field_clock_takes_precedence() {
        let mut c = channelizer(ChannelizerConfig::default());
        c.start_product(product("p1"));
        c.add(sclk_tag(TimeTagKind::Absolute, 100, 0));
        c.add(
            ChannelCandidate::new("A", Value::Unsigned(1))
                .with_sclk(Sclk::new(200, 0))
                .into(),
        );
        c.add(chan("B", 2));
        c.end_product().unwrap();

        let batch = &c.transport().batches()[0];
        assert_eq!(batch.samples[0].sclk, Some(Sclk::new(200, 0)));
        assert_eq!(batch.samples[0].scet, Some(Epoch::from_unix_seconds(200.0)));
        assert_eq!(batch.samples[1].sclk, Some(Sclk::new(100, 0)));
    }

    #[test]
    fn partial_product_is_faulted() {
        let mut c = channelizer(ChannelizerConfig::default());
        let mut p = product("p1");
        p.partial = true;
        c.start_product(p);
        c.add(chan("A", 1));
        c.end_product().unwrap();
        assert!(c.transport().batches()[0].fault);
    }

    #[test]
    fn run_over_channel() {
        let (tx, rx) = crossbeam::channel::unbounded();
        let c = channelizer(ChannelizerConfig::default());
        let handle = std::thread::spawn(move || c.run(rx));

        tx.send(ChannelizerMessage::StartProduct(product("p1"))).unwrap();
        tx.send(ChannelizerMessage::Candidate(chan("A", 1))).unwrap();
        tx.send(ChannelizerMessage::EndProduct).unwrap();
        drop(tx);

        let transport = handle.join().unwrap();
        assert_eq!(transport.batches().len(), 1);
    }
}
