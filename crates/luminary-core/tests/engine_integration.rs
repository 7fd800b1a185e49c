use luminary_core::decay::ORTHOGONAL_QUANTUM;
use luminary_core::{
    ControlCommand, DecayCell, DecayField, DecayMode, Engine, EnginePhase, FrameBuffer,
    GridGeometry, LuminaryConfig, PetalJoin, Scene, SparkField, Topology, apply_control_command,
};
use rand::{SeedableRng, rngs::SmallRng};
use std::time::Duration;

fn seeded(seed: u64) -> LuminaryConfig {
    LuminaryConfig {
        rng_seed: Some(seed),
        initialization_epochs: 8,
        ..LuminaryConfig::default()
    }
}

#[test]
fn default_display_renders_after_initialization() {
    let mut engine = Engine::new(seeded(1)).expect("engine");
    let mut frame = FrameBuffer::new(engine.topology().cell_count());
    let mut first_dirty = None;
    for _ in 0..40 {
        let report = engine.run_epoch(&mut frame);
        if report.rendered && first_dirty.is_none() {
            first_dirty = Some(report.dirty);
        }
    }
    assert_eq!(frame.frames(), 32);
    assert_eq!(frame.last_epoch(), Some(40));
    assert_eq!(first_dirty, Some(engine.topology().active_cells().len()));
    assert_eq!(engine.phase(), EnginePhase::Running);
}

#[test]
fn identical_command_schedules_stay_in_lockstep() {
    let schedule = |engine: &Engine, epoch: u64| match epoch {
        3 => Some(ControlCommand::CenteredRainbow { extended: true }),
        10 => Some(ControlCommand::SetScene(Scene::CirclingRainbows)),
        17 => Some(ControlCommand::Press {
            xy: engine.petal_source(1),
        }),
        25 => Some(ControlCommand::ChangeColor),
        31 => Some(ControlCommand::Spark {
            xy: engine.petal_source(3),
            color: 4,
        }),
        _ => None,
    };

    let mut runs = Vec::new();
    for _ in 0..2 {
        let mut engine = Engine::new(seeded(99)).expect("engine");
        let mut frame = FrameBuffer::new(engine.topology().cell_count());
        for epoch in 0..48 {
            if let Some(command) = schedule(&engine, epoch) {
                apply_control_command(&mut engine, command);
            }
            engine.run_epoch(&mut frame);
        }
        runs.push((engine, frame));
    }
    let (a, frame_a) = &runs[0];
    let (b, frame_b) = &runs[1];
    assert_eq!(a.control().current(), b.control().current());
    assert_eq!(a.waves().current(), b.waves().current());
    assert_eq!(a.pressure().current(), b.pressure().current());
    assert_eq!(a.rainbow().current(), b.rainbow().current());
    assert_eq!(a.sparks().current(), b.sparks().current());
    assert_eq!(frame_a.swatches(), frame_b.swatches());
}

#[test]
fn connected_band_runs_cleanly() {
    let config = LuminaryConfig {
        geometry: GridGeometry {
            petal_join: PetalJoin::Connected,
            ..GridGeometry::default()
        },
        ambient_press_odds: Some(500),
        ..seeded(5)
    };
    let mut engine = Engine::new(config).expect("engine");
    for _ in 0..64 {
        engine.step();
    }
    for &xy in engine.topology().active_cells() {
        assert!((0..12).contains(&engine.rainbow().current()[xy]));
        assert!(engine.control().current()[xy].orth >= 0);
    }
}

#[test]
fn config_accepts_partial_json() {
    let config: LuminaryConfig = serde_json::from_str(
        r#"{
            "geometry": { "floor_cols": 32, "petals": 2, "petal_join": "connected" },
            "scene": "q2",
            "wave_source": "radial",
            "rng_seed": 3
        }"#,
    )
    .expect("parse config");
    assert_eq!(config.geometry.floor_cols, 32);
    assert_eq!(config.geometry.petal_cols, 16);
    assert_eq!(config.scene, Scene::Q2);
    assert_eq!(config.base_hz, luminary_core::BASE_HZ);
    let engine = Engine::new(config.clone()).expect("engine");
    assert_eq!(engine.seed(), 3);

    let json = serde_json::to_string(&config).expect("serialize");
    let back: LuminaryConfig = serde_json::from_str(&json).expect("reparse");
    assert_eq!(back, config);
}

#[test]
fn budget_follows_rate_settings() {
    let budget = LuminaryConfig::default().budget();
    assert_eq!(budget.epoch(), Duration::from_micros(25_000));
    let fast = LuminaryConfig {
        base_hz: 25,
        ..LuminaryConfig::default()
    };
    assert_eq!(fast.budget().epoch(), Duration::from_micros(10_000));
}

#[test]
fn single_source_decays_one_quantum_per_hop() {
    let topology = Topology::new(GridGeometry::floor_only(5, 5)).expect("topology");
    let mut field = DecayField::new(25, DecayMode::Bounded, 0);
    field.current_mut()[12] = DecayCell::source(1000, 7, 8);
    field.step(&topology);
    let east = field.next()[13];
    assert_eq!(east.orth, 1000 - ORTHOGONAL_QUANTUM);
    assert_eq!((east.directive0, east.directive1), (7, 8));
}

#[test]
fn spark_rings_burn_out() {
    let topology = Topology::new(GridGeometry::floor_only(31, 31)).expect("topology");
    let mut sparks = SparkField::new(topology.cell_count());
    let mut rng = SmallRng::seed_from_u64(77);
    sparks.trigger(&topology, 15 * 31 + 15, 6, &mut rng);
    sparks.commit();
    assert!(sparks.current().iter().any(|c| c.is_lit()));
    for _ in 0..40 {
        sparks.step(&topology);
        sparks.commit();
    }
    assert!(sparks.current().iter().all(|c| !c.is_lit()));
    assert!(sparks.current().iter().all(|c| (0..12).contains(&c.color)));
}
