use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mem_zip::ZipArchive;

fn generate_compressible_data(size: usize) -> Vec<u8> {
    // Pattern that compresses well
    let pattern = b"The quick brown fox jumps over the lazy dog. ";
    let mut data = Vec::with_capacity(size);
    while data.len() < size {
        data.extend_from_slice(pattern);
    }
    data.truncate(size);
    data
}

fn bench_serialize(c: &mut Criterion) {
    let sizes = vec![
        1024,        // 1KB
        100 * 1024,  // 100KB
        1024 * 1024, // 1MB
    ];

    for size in sizes {
        let mut group = c.benchmark_group("serialize");
        group.throughput(Throughput::Bytes(size as u64));
        let data = generate_compressible_data(size);

        group.bench_with_input(BenchmarkId::new("single_entry", size), &data, |b, data| {
            b.iter(|| {
                let mut archive = ZipArchive::new();
                archive
                    .add_file("bench.bin", black_box(data.clone()), "", None)
                    .unwrap();
                black_box(archive.to_buffer().unwrap());
            });
        });
        group.finish();
    }
}

fn bench_parse_and_read(c: &mut Criterion) {
    let mut archive = ZipArchive::new();
    for i in 0..100 {
        let content = generate_compressible_data(4 * 1024);
        archive
            .add_file(&format!("file_{:03}.bin", i), content, "", None)
            .unwrap();
    }
    let buffer = archive.to_buffer().unwrap();

    let mut group = c.benchmark_group("read");
    group.throughput(Throughput::Bytes(buffer.len() as u64));

    group.bench_function("parse_central_directory", |b| {
        b.iter(|| {
            let mut reopened = ZipArchive::from_buffer(black_box(buffer.clone())).unwrap();
            black_box(reopened.get_entries().unwrap().len());
        });
    });

    group.bench_function("read_one_entry", |b| {
        let mut reopened = ZipArchive::from_buffer(buffer.clone()).unwrap();
        b.iter(|| {
            black_box(reopened.read_file("file_050.bin").unwrap());
        });
    });
    group.finish();
}

criterion_group!(benches, bench_serialize, bench_parse_and_read);
criterion_main!(benches);
