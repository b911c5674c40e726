use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use purchase_ledger_primitives::{AccountId, Domain, TypedValue};
use sealed_client::{SealInput, prove_input};
use sealed_kms::check_input_proof;
use sealed_primitives::{G, point_from_bytes, point_to_bytes, random_scalar};
use std::hint::black_box;

fn bench_input_proof(c: &mut Criterion) {
    let mut g = c.benchmark_group("verify_input_proof");
    let domain = Domain::new([1; 32]);
    let owner = AccountId::new([2; 32]);
    let network_pk = point_to_bytes(&(random_scalar(&mut rand::rng()) * G));

    for n in [1usize, 3, 8] {
        let out = prove_input(&SealInput {
            domain,
            owner,
            network_pk,
            values: (0..n as u64).map(TypedValue::uint64).collect(),
            rng_seed: [7; 32],
        })
        .expect("prove");
        let entries: Vec<_> = out
            .bundle
            .entries
            .iter()
            .map(|e| (e.handle, point_from_bytes(&e.ciphertext.ephemeral).expect("R")))
            .collect();

        g.throughput(Throughput::Elements(n as u64));
        g.bench_function(BenchmarkId::from_parameter(n), |b| {
            b.iter(|| {
                check_input_proof(&domain, &owner, &entries, &out.proof).expect("verify");
                black_box(&entries);
            });
        });
    }

    g.finish();
}

criterion_group!(benches, bench_input_proof);
criterion_main!(benches);
