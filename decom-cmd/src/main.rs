mod decode;
mod describe;

use std::fs::File;
use std::io::stderr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use decom::{FieldTree, ProductDefinition, Scid, Vcid};
use hifitime::Epoch;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the layout described by a product definition.
    Describe {
        /// JSON product definition.
        definition: PathBuf,
    },
    /// Decode a single product.
    ///
    /// Decoded values are written to stdout. Use --channels to also assemble channel
    /// samples, which are correlated using a linear clock model where SCLK seconds are
    /// seconds since --sclk-epoch.
    Decode {
        /// JSON product definition.
        definition: PathBuf,

        /// Product data file.
        input: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: decode::Format,

        /// Extract channel samples from the product.
        #[arg(short, long, action)]
        channels: bool,

        /// Spacecraft identifier reported with channel samples.
        #[arg(long, default_value = "0")]
        scid: Scid,

        /// Product identifier reported with channel samples. Defaults to the input file name.
        #[arg(long)]
        product_id: Option<String>,

        /// Ground station identifier reported with channel samples.
        #[arg(long, default_value = "0")]
        station: u16,

        /// Virtual channel identifier reported with channel samples.
        #[arg(long, default_value = "0")]
        vcid: Vcid,

        /// Time at which the spacecraft clock read zero (RFC3339).
        #[arg(long, value_parser = parse_timestamp, value_name = "timestamp", default_value = "1970-01-01T00:00:00 UTC")]
        sclk_epoch: Epoch,

        /// Derive local solar time, counting Mars sols from --sclk-epoch.
        #[arg(long, action)]
        lst: bool,

        /// Mark channel samples as realtime rather than recorded.
        #[arg(long, action)]
        realtime: bool,

        /// Run stream field handlers as programs, passing the path of a file containing
        /// the stream bytes.
        #[arg(long, action)]
        stream_handlers: bool,
    },
}

fn parse_timestamp(s: &str) -> Result<Epoch, String> {
    Epoch::from_str(s).map_err(|_| "Could not parse into an RFC3339 timestamp".to_string())
}

fn load_tree(path: &Path) -> Result<FieldTree> {
    let file = File::open(path).with_context(|| format!("opening definition {path:?}"))?;
    let definition = ProductDefinition::from_reader(file)
        .with_context(|| format!("reading definition {path:?}"))?;
    definition
        .build()
        .with_context(|| format!("invalid definition {path:?}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_ansi(false)
        .without_time()
        .with_env_filter(
            EnvFilter::try_from_env("DECOM_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Describe { definition } => describe::describe(&load_tree(definition)?),
        Commands::Decode {
            definition,
            input,
            format,
            channels,
            scid,
            product_id,
            station,
            vcid,
            sclk_epoch,
            lst,
            realtime,
            stream_handlers,
        } => {
            let tree = load_tree(definition)?;
            let channels = channels.then(|| decode::ChannelOpts {
                product_id: product_id.clone().unwrap_or_else(|| {
                    input
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default()
                }),
                scid: *scid,
                station: *station,
                vcid: *vcid,
                sclk_epoch: *sclk_epoch,
                lst: *lst,
                realtime: *realtime,
            });
            decode::decode(tree, input, format, channels.as_ref(), *stream_handlers)
        }
    }
}
