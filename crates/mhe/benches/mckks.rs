use criterion::{criterion_group, criterion_main, Criterion};
use mhe::ckks::{CkksParametersBuilder, PublicKey, SecretKey};
use mhe::mckks::{Aggregate, CommonRandomPoly, PublicKeyShare, RelinKeyGenerator};
use rand::thread_rng;

fn mckks_benchmark(c: &mut Criterion) {
    let mut rng = thread_rng();
    let par = CkksParametersBuilder::new()
        .set_degree(1024)
        .set_moduli_sizes(&[60, 40, 40])
        .set_special_modulus_size(61)
        .build_arc()
        .unwrap();

    let mut group = c.benchmark_group("mckks");

    let crp = CommonRandomPoly::new(&par, &mut rng).unwrap();
    let sk = SecretKey::random(&par, &mut rng);
    group.bench_function("ckg/share", |b| {
        b.iter(|| PublicKeyShare::new(&sk, crp.clone(), &mut rng).unwrap());
    });

    let shares: Vec<PublicKeyShare> = (0..10)
        .map(|_| {
            let sk = SecretKey::random(&par, &mut rng);
            PublicKeyShare::new(&sk, crp.clone(), &mut rng).unwrap()
        })
        .collect();
    group.bench_function("ckg/aggregate-10", |b| {
        b.iter(|| PublicKey::from_shares(shares.clone()).unwrap());
    });

    let crps = CommonRandomPoly::new_vec(&par, &mut rng).unwrap();
    let generator = RelinKeyGenerator::new(&sk, &crps, &mut rng).unwrap();
    group.bench_function("rkg/round-one", |b| {
        b.iter(|| generator.round_one(&mut rng).unwrap());
    });

    group.finish();
}

criterion_group!(benches, mckks_benchmark);
criterion_main!(benches);
