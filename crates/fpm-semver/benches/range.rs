use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fpm_semver::{parse_version, Range, Version};

fn bench_parse_ranges(c: &mut Criterion) {
    let ranges = [
        "^4.17.21",
        "~1.2.3",
        ">=1.0.0 <2.0.0 || ^3.0.0",
        "1.2.x",
        "1.2.3 - 2.3.4",
        "^1.0.0-beta.2",
        "*",
    ];

    c.bench_function("parse_ranges", |b| {
        b.iter(|| {
            for range in ranges {
                black_box(Range::parse(black_box(range)).ok());
            }
        })
    });
}

fn bench_select_highest(c: &mut Criterion) {
    let published: Vec<Version> = (0..20)
        .flat_map(|minor| (0..25).map(move |patch| format!("4.{}.{}", minor, patch)))
        .chain(["5.0.0".to_string(), "5.0.1-rc.1".to_string()])
        .filter_map(|v| parse_version(&v).ok())
        .collect();
    let range = Range::parse("^4.0.0").unwrap();

    c.bench_function("max_satisfying_500", |b| {
        b.iter(|| black_box(range.max_satisfying(black_box(&published))))
    });
}

criterion_group!(benches, bench_parse_ranges, bench_select_highest);
criterion_main!(benches);
