use std::time::{Duration, Instant};

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use kyber::dkg::{get_nonce, Config, DistKeyGenerator, Index, Node, Progress};
use kyber::group::Ed25519;
use kyber::KeyPair;
use rand_chacha::{rand_core::SeedableRng, ChaCha20Rng};

/// Average time one node spends in a full fresh run without complaints.
fn bench_dkg(n: usize, t: usize) -> Duration {
    let rng = &mut ChaCha20Rng::seed_from_u64(n as u64 + 1);
    let keypairs = (0..n).map(|_| KeyPair::new(&Ed25519, rng)).collect::<Vec<_>>();
    let nodes = keypairs
        .iter()
        .enumerate()
        .map(|(i, k)| Node::new(i as Index, k.public().clone()))
        .collect::<Vec<_>>();
    let nonce = get_nonce();

    let now = Instant::now();
    let mut generators = keypairs
        .iter()
        .map(|k| {
            let config = Config::new_dkg(Ed25519, k.expose_secret().clone(), nodes.clone(), t, nonce.clone());
            DistKeyGenerator::new(config).unwrap()
        })
        .collect::<Vec<_>>();
    let deals = generators.iter_mut().map(|g| g.deals().unwrap()).collect::<Vec<_>>();
    let responses = generators.iter_mut().filter_map(|g| g.process_deals(&deals).unwrap()).collect::<Vec<_>>();
    for g in generators.iter_mut() {
        match g.process_responses(&responses).unwrap() {
            Progress::Finished(result) => assert!(result.is_some()),
            Progress::Justify(_) => unreachable!("honest nodes never complain"),
        }
    }
    now.elapsed() / n as u32
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("dkg");
    for n in [4usize, 7, 10, 13, 16] {
        let t = n / 2 + 1;
        group
            .throughput(Throughput::Elements(n as u64))
            .sampling_mode(criterion::SamplingMode::Flat)
            .sample_size(10)
            .bench_with_input(format!("{t}-of-{n}"), &(n, t), |b, &(n, t)| {
                b.iter_custom(|iters| (0..iters).map(|_| bench_dkg(n, t)).sum::<Duration>());
            });
    }

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
