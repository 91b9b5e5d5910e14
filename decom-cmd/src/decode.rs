use std::io::{stdout, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{anyhow, Context, Result};
use crossbeam::channel::{unbounded, Receiver, Sender};
use decom::channel::{
    Candidate, CandidateSink, Channelizer, ChannelizerConfig, ChannelizerMessage,
    CrossbeamTransport, MarkingPolicy, ProductIdentity, SampleBatch,
};
use decom::{
    CommandStreamHandler, Decom, DecomOptions, EuResolver, EventRecorder, FieldTree,
    LocalSolarTime, OutputEvent, PolynomialEu, Scid, Sclk, SclkFormat, TextFormatter,
    TimeCorrelation, Vcid,
};
use handlebars::handlebars_helper;
use hifitime::{Duration, Epoch};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub enum Format {
    Json,
    Text,
}

impl clap::ValueEnum for Format {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Json, Self::Text]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::Json => Some(clap::builder::PossibleValue::new("json")),
            Self::Text => Some(clap::builder::PossibleValue::new("text")),
        }
    }
}

/// Product identity and correlation settings for channel extraction.
#[derive(Debug, Clone)]
pub struct ChannelOpts {
    pub product_id: String,
    pub scid: Scid,
    pub station: u16,
    pub vcid: Vcid,
    pub sclk_epoch: Epoch,
    pub lst: bool,
    pub realtime: bool,
}

/// Seconds in a Mars solar day.
const MARS_SOL_SECONDS: f64 = 88_775.244;

/// SCLK seconds are seconds elapsed since a fixed epoch; sols are counted from the same
/// epoch.
struct FixedEpochCorrelation {
    epoch: Epoch,
    format: SclkFormat,
}

impl TimeCorrelation for FixedEpochCorrelation {
    fn sclk_to_scet(&self, sclk: &Sclk, _ert: Option<Epoch>, _scid: Scid) -> Option<Epoch> {
        Some(self.epoch + Duration::from_seconds(sclk.as_seconds(&self.format)))
    }

    fn scet_to_lst(&self, scet: Epoch, _scid: Scid) -> Option<LocalSolarTime> {
        let secs = (scet - self.epoch).to_seconds();
        if secs < 0.0 {
            return None;
        }
        let sols = secs / MARS_SOL_SECONDS;
        Some(LocalSolarTime {
            sol: sols.trunc() as u32,
            millis_of_sol: (sols.fract() * 86_400_000.0) as u64,
        })
    }
}

/// A channelizer running on its own thread for the duration of one product.
struct Pipeline {
    tx: Sender<ChannelizerMessage>,
    batches: Receiver<SampleBatch>,
    handle: JoinHandle<CrossbeamTransport>,
}

impl Pipeline {
    fn start(opts: &ChannelOpts) -> Result<Self> {
        let config = ChannelizerConfig::default()
            .with_lst(opts.lst)
            .with_marking(if opts.realtime {
                MarkingPolicy::Realtime
            } else {
                MarkingPolicy::Recorded
            });
        let correlation = FixedEpochCorrelation {
            epoch: opts.sclk_epoch,
            format: config.sclk_format,
        };
        let (batch_tx, batches) = unbounded();
        let channelizer = Channelizer::new(
            config,
            Arc::new(correlation),
            CrossbeamTransport::new(batch_tx),
        );

        let (tx, rx) = unbounded();
        let handle = std::thread::Builder::new()
            .name("decom::channelizer".to_string())
            .spawn(move || channelizer.run(rx))
            .context("starting channelizer")?;

        let product = ProductIdentity::builder()
            .product_id(opts.product_id.clone())
            .scid(opts.scid)
            .station_id(opts.station)
            .vcid(opts.vcid)
            .build();
        tx.send(ChannelizerMessage::StartProduct(product))
            .context("starting product")?;

        Ok(Pipeline {
            tx,
            batches,
            handle,
        })
    }

    fn finish(self) -> Result<Vec<SampleBatch>> {
        self.tx
            .send(ChannelizerMessage::EndProduct)
            .context("ending product")?;
        drop(self.tx);
        let transport = self
            .handle
            .join()
            .map_err(|_| anyhow!("channelizer thread panicked"))?;
        // closes the batch channel
        drop(transport);
        Ok(self.batches.iter().collect())
    }
}

#[derive(Serialize)]
struct Report<'a> {
    consumed: usize,
    events: &'a [OutputEvent],
    batches: &'a [SampleBatch],
}

pub fn decode(
    tree: FieldTree,
    input: &Path,
    format: &Format,
    channels: Option<&ChannelOpts>,
    stream_handlers: bool,
) -> Result<()> {
    let data = std::fs::read(input).with_context(|| format!("reading {input:?}"))?;
    let mut decom = Decom::new(Arc::new(tree))
        .with_resolver(EuResolver::new(Arc::new(PolynomialEu)))
        .with_options(DecomOptions::default().with_channels(channels.is_some()));
    if stream_handlers {
        decom = decom
            .with_stream_handler(Arc::new(CommandStreamHandler))
            .context("configuring stream handlers")?;
    }

    let pipeline = channels.map(Pipeline::start).transpose()?;
    let result = write_product(&decom, &data, format, pipeline);

    // handlers may still be running after output is written
    decom.wait_for_streams();
    result
}

fn write_product(
    decom: &Decom,
    data: &[u8],
    format: &Format,
    mut pipeline: Option<Pipeline>,
) -> Result<()> {
    let mut unused: Vec<Candidate> = Vec::default();
    let sink: &mut dyn CandidateSink = match pipeline.as_mut() {
        Some(p) => &mut p.tx,
        None => &mut unused,
    };

    match format {
        Format::Text => {
            let mut fmt = TextFormatter::new(stdout().lock());
            let consumed = decom.decode(data, &mut fmt, sink)?;
            fmt.finish().context("writing output")?;
            info!(consumed, len = data.len(), "decoded product");

            let batches = match pipeline {
                Some(p) => p.finish()?,
                None => Vec::default(),
            };
            for batch in &batches {
                let text = render_batch(batch).context("rendering samples")?;
                stdout()
                    .write_all(text.as_bytes())
                    .context("writing to stdout")?;
            }
            Ok(())
        }
        Format::Json => {
            let mut rec = EventRecorder::default();
            let consumed = decom.decode(data, &mut rec, sink)?;
            let batches = match pipeline {
                Some(p) => p.finish()?,
                None => Vec::default(),
            };
            debug!(consumed, batches = batches.len(), "decoded product");
            let report = Report {
                consumed,
                events: rec.events(),
                batches: &batches,
            };
            serde_json::to_writer_pretty(stdout(), &report).context("serializing to json")
        }
    }
}

#[derive(Serialize)]
struct SampleRenderData {
    channel_id: String,
    dn: String,
    scet: Option<String>,
}

#[derive(Serialize)]
struct BatchRenderData {
    product_id: String,
    scid: Scid,
    vcid: Vcid,
    station: u16,
    sclk: Option<String>,
    scet: Option<String>,
    lst: Option<String>,
    fault: bool,
    realtime: bool,
    samples: Vec<SampleRenderData>,
}

impl From<&SampleBatch> for BatchRenderData {
    fn from(batch: &SampleBatch) -> Self {
        BatchRenderData {
            product_id: batch.product.product_id.clone(),
            scid: batch.product.scid,
            vcid: batch.product.vcid,
            station: batch.product.station_id,
            sclk: batch.sclk.map(|s| s.to_string()),
            scet: batch.scet.map(|e| e.to_string()),
            lst: batch.lst.map(|l| l.to_string()),
            fault: batch.fault,
            realtime: batch.samples.iter().any(|s| s.realtime),
            samples: batch
                .samples
                .iter()
                .map(|s| SampleRenderData {
                    channel_id: s.channel_id.clone(),
                    dn: s.dn.to_string(),
                    scet: s.scet.map(|e| e.to_string()),
                })
                .collect(),
        }
    }
}

fn render_batch(batch: &SampleBatch) -> Result<String> {
    handlebars_helper!(right_pad: |num: u64, v: Json| {
        let mut v = match v {
            serde_json::Value::String(s) => s.to_owned(),
            serde_json::Value::Null => String::new(),
            _ => v.to_string()
        };
        let width = usize::try_from(num).unwrap_or_default();
        while v.len() < width {
            v.push(' ');
        }
        v
    });
    let mut hb = handlebars::Handlebars::new();
    hb.register_escape_fn(handlebars::no_escape);
    hb.register_helper("rpad", Box::new(right_pad));
    hb.register_template_string("batch", BATCH_TEMPLATE)
        .context("registering template")?;

    hb.render("batch", &BatchRenderData::from(batch))
        .context("rendering text")
}

const BATCH_TEMPLATE: &str = r"
{{ product_id }} (SCID={{ scid }} VCID={{ vcid }} STATION={{ station }})
=========================================================================
SCLK:     {{ sclk }}
SCET:     {{ scet }}
LST:      {{ lst }}
Realtime: {{ realtime }}
Fault:    {{ fault }}
-------------------------------------------------------------------------
Channel         DN                    SCET
-------------------------------------------------------------------------
{{ #each samples }}{{ rpad 14 channel_id }}  {{ rpad 20 dn }}  {{ scet }}
{{/each }}";

#[cfg(test)]
mod tests {
    use super::*;
    use decom::channel::ChannelSample;
    use decom::Value;

    #[test]
    fn fixed_epoch_correlation() {
        let epoch = Epoch::from_unix_seconds(1000.0);
        let correlation = FixedEpochCorrelation {
            epoch,
            format: SclkFormat::default(),
        };

        let scet = correlation
            .sclk_to_scet(&Sclk::new(10, 0x8000), None, 0)
            .unwrap();
        assert_eq!(scet, Epoch::from_unix_seconds(1010.5));

        let lst = correlation
            .scet_to_lst(epoch + Duration::from_seconds(MARS_SOL_SECONDS * 2.5), 0)
            .unwrap();
        assert_eq!(lst.sol, 2);
        assert!((43_199..=43_200).contains(&(lst.millis_of_sol / 1000)), "{lst:?}");

        assert!(correlation
            .scet_to_lst(Epoch::from_unix_seconds(0.0), 0)
            .is_none());
    }

    #[test]
    fn render_batch_text() {
        let batch = SampleBatch {
            samples: vec![ChannelSample {
                channel_id: "HK-0001".to_string(),
                dn: Value::Unsigned(7),
                sclk: None,
                ert: None,
                scet: None,
                lst: None,
                realtime: true,
            }],
            rct: None,
            ert: None,
            scet: None,
            sclk: None,
            lst: None,
            product: ProductIdentity::builder().product_id("p1").scid(5).build(),
            fault: true,
        };
        let text = render_batch(&batch).unwrap();
        assert!(text.contains("p1 (SCID=5 VCID=0 STATION=0)"), "{text}");
        assert!(text.contains("Fault:    true"), "{text}");
        assert!(text.contains("HK-0001         7 "), "{text}");
    }
}
