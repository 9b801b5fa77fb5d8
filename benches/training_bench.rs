use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lincls::train::{AdaGradLoss, DualLoss, Trainer, TrainingSpace};
use lincls::{SparseModel, SparseVector};

const NUM_LABELS: u32 = 5;
const NUM_FEATURES: u32 = 2000;
const NUM_INSTANCES: usize = 1000;

fn synthetic() -> (SparseModel, TrainingSpace) {
    let mut rng = StdRng::seed_from_u64(7);
    let mut model = SparseModel::new();
    for label in 0..NUM_LABELS {
        model.add_label(&format!("L{}", label));
    }
    model.add_features(&[NUM_FEATURES - 1]);

    let mut space = TrainingSpace::new();
    for _ in 0..NUM_INSTANCES {
        let y = rng.gen_range(0..NUM_LABELS);
        let mut ids: Vec<u32> = (0..20)
            .map(|_| rng.gen_range(1..NUM_FEATURES))
            .collect();
        // one id per label band makes the data learnable
        ids.push(1 + y * 10 + rng.gen_range(0..10));
        ids.sort_unstable();
        ids.dedup();
        space.push(y, SparseVector::from_parts(ids, None));
    }
    (model, space)
}

fn criterion_benchmark(c: &mut Criterion) {
    let (model, space) = synthetic();

    let mut group = c.benchmark_group("fit");
    group.sample_size(10);
    for loss in [DualLoss::L1Hinge, DualLoss::L2Hinge, DualLoss::Logistic] {
        let trainer = Trainer::dual().with_loss(loss);
        group.bench_function(format!("dual {}", loss.solver()), |b| {
            b.iter(|| trainer.fit(black_box(&space), &model).unwrap())
        });
    }
    for loss in [AdaGradLoss::MarginHinge, AdaGradLoss::Logistic] {
        let trainer = Trainer::adagrad().with_loss(loss).with_seed(1);
        group.bench_function(format!("{}", loss.solver()), |b| {
            b.iter(|| trainer.fit(black_box(&space), &model).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
