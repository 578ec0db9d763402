// ABOUTME: Benchmarks for RingBuffer push/range throughput at a handful of capacities

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use wirelink::ring_buffer::{RingBuffer, Revisioned};

#[derive(Clone)]
struct Op(u64);

impl Revisioned for Op {
    fn rev(&self) -> u64 {
        self.0
    }
}

fn bench_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_buffer_push");
    for capacity in [64usize, 1024, 8192] {
        group.bench_function(format!("capacity_{}", capacity), |b| {
            b.iter(|| {
                let mut buffer: RingBuffer<Op> = RingBuffer::new(capacity);
                for rev in 1..=(capacity as u64 * 4) {
                    buffer.push(black_box(Op(rev)));
                }
                buffer
            });
        });
    }
    group.finish();
}

fn bench_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_buffer_range");
    let capacity = 4096usize;
    let mut buffer: RingBuffer<Op> = RingBuffer::new(capacity);
    for rev in 1..=(capacity as u64 * 2) {
        buffer.push(Op(rev));
    }
    let from = buffer.first_rev();
    let to = buffer.last_rev();

    group.bench_function("in_window", |b| {
        b.iter(|| black_box(buffer.range(black_box(from.saturating_sub(1)), black_box(to))));
    });
    group.finish();
}

criterion_group!(benches, bench_push, bench_range);
criterion_main!(benches);
