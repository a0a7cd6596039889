use std::hint::black_box;
use std::thread;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use simse_namespace::{Namespace, NamespaceError};

const CONTENT: &[u8] = b"benchmark content";

fn write_file(c: &mut Criterion) {
    let ns = Namespace::new();
    ns.create_dir("/bench", 0o755).unwrap();
    let mut i = 0u64;
    c.bench_function("write_file", |b| {
        b.iter(|| {
            ns.write_file(&format!("/bench/file{}.txt", i), CONTENT).unwrap();
            i += 1;
        })
    });
}

fn read_file(c: &mut Criterion) {
    let ns = Namespace::new();
    ns.write_file("/bench.txt", CONTENT).unwrap();
    c.bench_function("read_file", |b| {
        b.iter(|| black_box(ns.read_file("/bench.txt").unwrap()))
    });
}

fn list_dir(c: &mut Criterion) {
    let ns = Namespace::new();
    for i in 0..100 {
        ns.write_file(&format!("/file{}.txt", i), "content").unwrap();
    }
    c.bench_function("list_dir/100", |b| {
        b.iter(|| black_box(ns.list_dir("/").unwrap()))
    });
}

fn concurrent_writes(c: &mut Criterion) {
    const THREADS: usize = 4;
    const FILES: usize = 64;

    c.bench_function("concurrent_writes/4x64", |b| {
        b.iter_batched(
            || {
                let ns = Namespace::new();
                ns.create_dir("/concurrent", 0o755).unwrap();
                ns
            },
            |ns| {
                thread::scope(|s| {
                    for t in 0..THREADS {
                        let ns = &ns;
                        s.spawn(move || {
                            for f in 0..FILES {
                                let path = format!("/concurrent/{}-{}.txt", t, f);
                                ns.write_file(&path, "concurrent content").unwrap();
                            }
                        });
                    }
                });
                ns
            },
            BatchSize::SmallInput,
        )
    });
}

fn walk(c: &mut Criterion) {
    let ns = Namespace::new();
    for i in 0..10 {
        let dir = format!("/dir{}", i);
        ns.create_dir(&dir, 0o755).unwrap();
        for j in 0..10 {
            ns.write_file(&format!("{}/file{}.txt", dir, j), "content").unwrap();
        }
    }
    c.bench_function("walk/10x10", |b| {
        b.iter(|| {
            let mut visited = 0usize;
            ns.walk("/", |_, _| {
                visited += 1;
                Ok::<(), NamespaceError>(())
            })
            .unwrap();
            black_box(visited)
        })
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(50);
    targets = write_file, read_file, list_dir, concurrent_writes, walk
);

criterion_main!(benches);
