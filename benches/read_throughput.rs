use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tokio::runtime::Runtime;
use uring_file::{
    is_io_uring_available, BackendPreference, File, OpenOptions, Ring, UringFileConfig,
};

const FILE_SIZE: usize = 1 << 20;

fn backends() -> Vec<BackendPreference> {
    let mut backends = vec![BackendPreference::Fallback];
    if is_io_uring_available() {
        backends.push(BackendPreference::IoUring);
    }
    backends
}

fn bench_sequential_reads(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bench.bin");
    std::fs::write(&path, vec![0x5a; FILE_SIZE]).unwrap();

    let mut group = c.benchmark_group("sequential_read");
    group.throughput(Throughput::Bytes(FILE_SIZE as u64));

    for backend in backends() {
        for chunk in [4096usize, 65536] {
            let ring =
                Ring::with_config(UringFileConfig::default().with_backend(backend)).unwrap();
            let id = BenchmarkId::new(format!("{backend:?}"), chunk);

            group.bench_with_input(id, &chunk, |b, &chunk| {
                b.to_async(&rt).iter(|| async {
                    let mut file = File::new(&ring, &path);
                    file.open(&OpenOptions::new()).await.unwrap();
                    loop {
                        let data = file.read(Some(chunk)).await.unwrap();
                        if data.is_empty() {
                            break;
                        }
                        black_box(data);
                    }
                    file.close().await.unwrap();
                })
            });
        }
    }

    group.finish();
}

fn bench_concurrent_reads(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bench.bin");
    std::fs::write(&path, vec![0xa5; FILE_SIZE]).unwrap();

    let mut group = c.benchmark_group("concurrent_read");
    group.throughput(Throughput::Bytes(FILE_SIZE as u64));

    for backend in backends() {
        let ring = Ring::with_config(
            UringFileConfig::default()
                .with_backend(backend)
                .with_queue_depth(256),
        )
        .unwrap();

        group.bench_function(format!("{backend:?}/256x4k"), |b| {
            b.to_async(&rt).iter(|| async {
                let file = uring_file::open(&ring, &path, &OpenOptions::new())
                    .await
                    .unwrap();
                let fd = file.fileno().unwrap();
                let tokens: Vec<_> = (0..256u64)
                    .map(|i| ring.submit_read(fd, 4096, i * 4096).unwrap())
                    .collect();
                for data in futures::future::join_all(tokens).await {
                    black_box(data.unwrap());
                }
                let mut file = file;
                file.close().await.unwrap();
            })
        });
    }

    group.finish();
}

fn bench_readline(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lines.txt");
    let text: String = (0..2000).map(|i| format!("line number {i}\n")).collect();
    std::fs::write(&path, &text).unwrap();
    let ring = Ring::with_config(UringFileConfig::testing()).unwrap();

    let mut group = c.benchmark_group("readline");
    for chunk in [32usize, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &chunk, |b, &chunk| {
            b.to_async(&rt).iter(|| async {
                let mut file = File::new(&ring, &path).with_readline_chunk_size(chunk);
                file.open(&OpenOptions::new()).await.unwrap();
                let mut count = 0;
                while !file.readline().await.unwrap().is_empty() {
                    count += 1;
                }
                file.close().await.unwrap();
                black_box(count)
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_sequential_reads,
    bench_concurrent_reads,
    bench_readline
);
criterion_main!(benches);
