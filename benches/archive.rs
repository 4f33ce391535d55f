use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pandora_box::{content_hash, BoxArchive, BoxBuilder};
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

fn bench_content_hash(c: &mut Criterion) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    let data: Vec<u8> = (0..1024 * 1024).map(|_| rng.gen()).collect();

    c.bench_function("content_hash_1mb", |b| {
        b.iter(|| content_hash(black_box(&data)))
    });
}

fn bench_build_and_read(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);

    // 32 binary entries of 64 KiB each; half compressible, half random.
    let mut builder = BoxBuilder::new();
    for i in 0..32 {
        let path = dir.path().join(format!("blob{i}.bin"));
        let data: Vec<u8> = if i % 2 == 0 {
            vec![0xAB; 64 * 1024]
        } else {
            (0..64 * 1024).map(|_| rng.gen()).collect()
        };
        std::fs::write(&path, &data).unwrap();
        builder.stage_binary(format!("blob{i}"), &path, true).unwrap();
    }

    let out = dir.path().join("bench.box");
    c.bench_function("build_32x64k", |b| {
        b.iter(|| builder.build(black_box(&out)).unwrap())
    });

    builder.build(&out).unwrap();
    let archive = BoxArchive::load(&out).unwrap();
    c.bench_function("read_entry_64k", |b| {
        b.iter(|| archive.resource_data(black_box("blob3")).unwrap())
    });
    c.bench_function("read_compressed_entry_64k", |b| {
        b.iter(|| archive.resource_data(black_box("blob2")).unwrap())
    });
}

criterion_group!(benches, bench_content_hash, bench_build_and_read);
criterion_main!(benches);
