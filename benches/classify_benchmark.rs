//! Benchmarks for outline extraction performance.
//!
//! Run with: cargo bench
//!
//! These benchmarks run the pipeline on synthetic page runs, so no PDF
//! decoding is involved.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pdf_outline::{HeadingClassifier, OutlineExtractor, PageRuns, TextProcessor, TextRun};

/// Creates a synthetic document with a header, headings and body text per page.
fn create_test_pages(page_count: usize) -> Vec<PageRuns> {
    (0..page_count)
        .map(|p| {
            let mut runs = vec![TextRun::at("Internal Report", 72.0, 30.0, 9.0, false)];
            let mut top = 70.0;
            for section in 0..4 {
                runs.push(TextRun::at(
                    format!("{}.{} Section heading", p + 1, section + 1),
                    72.0,
                    top,
                    16.0,
                    true,
                ));
                top += 28.0;
                for _ in 0..8 {
                    runs.push(TextRun::at("Benchmark body text for", 72.0, top, 11.0, false));
                    runs.push(TextRun::at("outline extraction timing.", 210.0, top, 11.0, false));
                    top += 13.0;
                }
                top += 12.0;
            }
            runs.push(TextRun::at((p + 1).to_string(), 300.0, 760.0, 9.0, false));
            PageRuns::new(p as u32, runs)
        })
        .collect()
}

/// Benchmark block assembly.
fn bench_text_processing(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_processing");
    let processor = TextProcessor::default();

    for page_count in [1, 10, 50].iter() {
        let pages = create_test_pages(*page_count);
        group.bench_function(format!("{}_pages", page_count), |b| {
            b.iter(|| processor.process(black_box(&pages)));
        });
    }

    group.finish();
}

/// Benchmark scoring and level assignment.
fn bench_classification(c: &mut Criterion) {
    let pages = create_test_pages(50);
    let blocks = TextProcessor::default().process(&pages);
    let classifier = HeadingClassifier::default();

    c.bench_function("classify_50_pages", |b| {
        b.iter(|| classifier.classify(black_box(&blocks)));
    });
}

/// Benchmark the whole in-memory pipeline.
fn bench_full_pipeline(c: &mut Criterion) {
    let pages = create_test_pages(20);
    let extractor = OutlineExtractor::new();

    c.bench_function("extract_pages_20", |b| {
        b.iter(|| extractor.extract_pages(black_box(&pages)));
    });
}

criterion_group!(
    benches,
    bench_text_processing,
    bench_classification,
    bench_full_pipeline,
);
criterion_main!(benches);
