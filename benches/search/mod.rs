use criterion::{measurement::Measurement, BenchmarkGroup, BenchmarkId, Criterion, Throughput};
use hrtree::{HilbertRTree, Point, Rect};

use crate::Lfsr;

#[derive(Debug, Clone, Copy)]
struct BenchName {
    n_values: usize,
}

impl From<BenchName> for BenchmarkId {
    fn from(v: BenchName) -> Self {
        Self::new("n_values", v.n_values)
    }
}

pub(super) fn bench(c: &mut Criterion) {
    let mut g = c.benchmark_group("search_intersect");

    for n_values in [100, 1_000, 10_000] {
        bench_param(&mut g, n_values)
    }
}

/// Measure the time needed to run an intersection query over a window of the
/// space against a tree holding `n_values` rectangles.
fn bench_param<M>(g: &mut BenchmarkGroup<'_, M>, n_values: usize)
where
    M: Measurement,
{
    let mut t = HilbertRTree::with_config(4, 16, 32).unwrap();
    let mut rand = Lfsr::default();
    for _i in 0..n_values {
        t.insert(rand.next_rect());
    }

    let q = Rect::new(Point([256, 256]), Point([512, 512]));

    let bench_name = BenchName { n_values };
    g.throughput(Throughput::Elements(n_values as _)); // Rectangles considered per second
    g.bench_function(BenchmarkId::from(bench_name), |b| {
        b.iter(|| t.search_intersect(&q));
    });
}
