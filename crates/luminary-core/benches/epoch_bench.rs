use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use luminary_core::{Engine, EvolutionRule, FrameBuffer, LuminaryConfig};
use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

fn bench_epochs(c: &mut Criterion) {
    let mut group = c.benchmark_group("epoch");
    let samples: usize = env_or("LUMINARY_BENCH_SAMPLES", 20).max(10);
    let warm: u64 = env_or("LUMINARY_BENCH_WARMUP_SECS", 2);
    let measure: u64 = env_or("LUMINARY_BENCH_MEASURE_SECS", 8);
    group.sample_size(samples);
    group.warm_up_time(Duration::from_secs(warm));
    group.measurement_time(Duration::from_secs(measure));
    // Epochs per bench iteration (override via LUMINARY_BENCH_EPOCHS)
    let epochs: usize = env_or("LUMINARY_BENCH_EPOCHS", 40).max(1);

    for (label, evolution) in [
        ("cyclic", EvolutionRule::Cyclic),
        ("reaction_diffusion", EvolutionRule::ReactionDiffusion),
    ] {
        group.bench_function(format!("{label}_epochs{epochs}"), |b| {
            b.iter_batched(
                || {
                    let config = LuminaryConfig {
                        rng_seed: Some(0x5EED),
                        initialization_epochs: 0,
                        evolution,
                        ..LuminaryConfig::default()
                    };
                    let engine = Engine::new(config).expect("engine");
                    let frame = FrameBuffer::new(engine.topology().cell_count());
                    (engine, frame)
                },
                |(mut engine, mut frame)| {
                    for _ in 0..epochs {
                        engine.run_epoch(&mut frame);
                    }
                    frame.frames()
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_epochs);
criterion_main!(benches);
