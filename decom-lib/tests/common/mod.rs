use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use decom::channel::{ChannelTransport, SampleBatch};
use decom::{
    Decom, EuResolver, LocalSolarTime, PolynomialEu, ProductDefinition, Scid, Sclk, SclkFormat,
    TimeCorrelation,
};
use hifitime::Epoch;

pub fn fixture_path(name: &str) -> PathBuf {
    let mut path =
        PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set"));
    path.push("tests/fixtures");
    path.push(name);
    path
}

/// Decoder for the housekeeping fixture with polynomial EU conversion.
pub fn hk_decom() -> Decom {
    let file = std::fs::File::open(fixture_path("hk_definition.json")).unwrap();
    let definition = ProductDefinition::from_reader(file).unwrap();
    Decom::new(Arc::new(definition.build().unwrap()))
        .with_resolver(EuResolver::new(Arc::new(PolynomialEu)))
}

/// A product matching the housekeeping fixture.
pub fn hk_product() -> Vec<u8> {
    let mut dat = vec![
        0x00, 0x00, 0x00, 0x64, 0x80, 0x00, 0x00, 0x00, // time, 100.5s
        0x01, // mode
        0x04, 0xb0, // voltage
        0b1000_0011, // flags
        0x02, // count
        0xff, 0xf6, 0x00, 0x19, // temps
        0xaa, 0xaa, // fill
    ];
    dat.extend_from_slice(b"ok\0\0");
    dat
}

/// SCLK seconds are seconds since the Unix epoch.
pub struct UnixCorrelation;

impl TimeCorrelation for UnixCorrelation {
    fn sclk_to_scet(&self, sclk: &Sclk, _ert: Option<Epoch>, _scid: Scid) -> Option<Epoch> {
        Some(Epoch::from_unix_seconds(sclk.as_seconds(&SclkFormat::default())))
    }

    fn scet_to_lst(&self, _scet: Epoch, _scid: Scid) -> Option<LocalSolarTime> {
        None
    }
}

#[derive(Default)]
pub struct Collect(pub Mutex<Vec<SampleBatch>>);

impl ChannelTransport for Collect {
    fn publish_batch(&self, batch: SampleBatch) -> decom::Result<()> {
        self.0.lock().unwrap().push(batch);
        Ok(())
    }
}
