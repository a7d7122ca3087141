use bytes::Bytes;
use criterion::{Criterion, criterion_group, criterion_main};
use futures::executor::block_on;
use micro_dechunk::collector::BodyCollector;
use micro_dechunk::filter::{ClosedFilter, InputFilter, ReadBlock, ReadMode, ReplayFilter};
use micro_dechunk::segment::{Segment, SegmentStore};
use std::hint::black_box;

// 1 MiB body split like a typical chunked upload
fn kept_body(segments: usize, segment_size: usize) -> SegmentStore {
    let mut store = SegmentStore::new();
    for i in 0..segments {
        store.append(Segment::data(Bytes::from(vec![(i % 251) as u8; segment_size])));
    }
    store.append(Segment::Eos);
    store
}

struct Rounds {
    segments: std::vec::IntoIter<Segment>,
}

#[async_trait::async_trait]
impl InputFilter for Rounds {
    async fn read(&mut self, out: &mut Vec<Segment>, _mode: ReadMode, _block: ReadBlock, _max_bytes: u64) -> Result<(), micro_dechunk::error::FilterError> {
        out.extend(self.segments.next());
        Ok(())
    }
}

fn bench_replay(c: &mut Criterion) {
    let store = kept_body(256, 4096);

    for window in [512u64, 8192, 65536] {
        c.bench_function(&format!("replay_1mib_window_{window}"), |b| {
            b.iter(|| {
                let mut filter = ReplayFilter::new(store.clone(), Box::new(ClosedFilter));
                let mut out = Vec::new();
                while !filter.cursor().is_exhausted() {
                    out.clear();
                    block_on(filter.read(&mut out, ReadMode::ReadBytes, ReadBlock::Block, window)).unwrap();
                    black_box(&out);
                }
            });
        });
    }
}

fn bench_collect(c: &mut Criterion) {
    c.bench_function("collect_256_segments", |b| {
        b.iter(|| {
            let mut segments: Vec<Segment> = (0..256).map(|_| Segment::Transient(Bytes::from_static(&[7u8; 4096]))).collect();
            segments.push(Segment::Eos);
            let mut source = Rounds { segments: segments.into_iter() };
            black_box(block_on(BodyCollector::default().collect(&mut source)).unwrap());
        });
    });
}

criterion_group!(benches, bench_replay, bench_collect);
criterion_main!(benches);
