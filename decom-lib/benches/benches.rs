use std::{path::PathBuf, sync::Arc};

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use decom::{
    ArrayField, ArrayLength, DataType, Decom, EventRecorder, FieldTree, PrintFormat,
    ProductDefinition, SimpleField,
};

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").unwrap());
    path.push(name);
    path
}

fn bench_hk(c: &mut Criterion) {
    let file = std::fs::File::open(fixture_path("tests/fixtures/hk_definition.json")).unwrap();
    let tree = ProductDefinition::from_reader(file).unwrap().build().unwrap();
    let decom = Decom::new(Arc::new(tree));
    let mut data = vec![
        0x00, 0x00, 0x00, 0x64, 0x80, 0x00, 0x00, 0x00, 0x01, 0x04, 0xb0, 0x83, 0x02, 0xff,
        0xf6, 0x00, 0x19, 0xaa, 0xaa,
    ];
    data.extend_from_slice(b"ok\0\0");

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("hk", |b| {
        b.iter(|| {
            let mut out = EventRecorder::default();
            let mut candidates = Vec::new();
            decom.decode(&data, &mut out, &mut candidates).unwrap();
        });
    });
}

fn bench_array(c: &mut Criterion) {
    let data = vec![0x5au8; 8192];
    let mut group = c.benchmark_group("array");
    group.throughput(Throughput::Bytes(data.len() as u64));

    for (name, format) in [("values", None), ("formatted", Some("%d %d %d %d"))] {
        let mut builder = FieldTree::builder();
        let v = builder.add(SimpleField::new("v", DataType::UINT16));
        let mut array = ArrayField::new("samples", vec![v], ArrayLength::UntilExhausted);
        if let Some(format) = format {
            array = array.with_print_format(PrintFormat::parse(format).unwrap());
        }
        let root = builder.add(array);
        let decom = Decom::new(Arc::new(builder.build(root).unwrap()));

        group.bench_function(name, |b| {
            b.iter(|| {
                let mut out = EventRecorder::default();
                let mut candidates = Vec::new();
                decom.decode(&data, &mut out, &mut candidates).unwrap();
            });
        });
    }
}

criterion_group!(benches, bench_hk, bench_array);
criterion_main!(benches);
