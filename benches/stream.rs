//! Benchmark for small sequential transfers through a cached stream.
//!
//!

use std::io::SeekFrom;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use object_store::memory::InMemory;
use rand::Rng;

use objio::{
    remote::{ObjectStoreSession, RemoteSession},
    Stdio,
};

const OBJECT_SIZE: usize = 16 * 1024 * 1024;

fn stream_bench(c: &mut Criterion) {
    let mut rng = rand::thread_rng();

    let session = Arc::new(ObjectStoreSession::new(Arc::new(InMemory::new())));
    session.connect().unwrap();
    {
        let id = session.create_object("bench/object").unwrap();
        let mut buf = vec![0_u8; 128 * 1024];
        for _ in 0..OBJECT_SIZE / (128 * 1024) {
            rng.fill(&mut buf[..]);
            session.write_object(id, &buf).unwrap();
        }
        session.close_object(id).unwrap();
    }

    for record_size in [16_usize, 512, 4096] {
        let mut stdio = Stdio::builder(session.clone())
            .remote_prefix("mem:")
            .build();
        let mut stream = stdio.open("mem:bench/object", "r").unwrap();
        let mut record = vec![0_u8; record_size];

        c.bench_function(
            format!("cached_read,record_size={}", record_size).as_str(),
            |b| {
                b.iter(|| {
                    if stdio.read(&mut stream, &mut record, record_size, 1).unwrap() == 0 {
                        stdio.seek(&mut stream, SeekFrom::Start(0)).unwrap();
                    }
                })
            },
        );
        stdio.close(stream).unwrap();

        let mut stream = stdio.open("mem:bench/scratch", "w").unwrap();
        c.bench_function(
            format!("cached_write,record_size={}", record_size).as_str(),
            |b| {
                b.iter(|| {
                    if stdio.tell(&mut stream).unwrap() >= OBJECT_SIZE as u64 {
                        stdio.seek(&mut stream, SeekFrom::Start(0)).unwrap();
                    }
                    stdio.write(&mut stream, &record, record_size, 1).unwrap();
                })
            },
        );
        stdio.close(stream).unwrap();
    }
}

criterion_group!(
    name=benches;
    config = Criterion::default().significance_level(0.1).sample_size(10);
    targets = stream_bench);

criterion_main!(benches);
