use criterion::*;
use std::hint::black_box;

use reactive_ecs::prelude::*;

const ENTITIES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}
impl Component for Position {}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Velocity {
    dx: f32,
    dy: f32,
}
impl Component for Velocity {}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Heat {
    degrees: f32,
}
impl Component for Heat {}

struct Integrate;

impl System for Integrate {
    fn update(&mut self, cx: &mut SystemContext<'_>) {
        let elapsed = cx.elapsed_ms() as f32 / 1000.0;
        let entities = cx.entities();
        for &entity in entities.iter() {
            let velocity = match cx.world().get_component::<Velocity>(entity) {
                Some(v) => *v,
                None => continue,
            };
            let _ = cx.world().modify::<Position>(entity, |p| {
                p.x += velocity.dx * elapsed;
                p.y += velocity.dy * elapsed;
            });
        }
    }
}

struct CoolDown;

impl System for CoolDown {
    fn update(&mut self, cx: &mut SystemContext<'_>) {
        let entities = cx.entities();
        for &entity in entities.iter() {
            let _ = cx.world().modify::<Heat>(entity, |h| h.degrees *= 0.999);
        }
    }
}

struct HeatWatcher;

impl System for HeatWatcher {
    fn react(&mut self, _cx: &mut SystemContext<'_>, kind: NotificationKind, entities: &[EntityId]) {
        black_box((kind, entities.len()));
    }
}

fn make_world() -> World {
    let integrate = SystemDescriptor::of::<Integrate>()
        .phase(Phase::Update)
        .filter(
            FilterSpec::all_of(Access::Write)
                .with::<Position>()
                .with::<Velocity>(),
        );
    let cool = SystemDescriptor::of::<CoolDown>()
        .phase(Phase::Update)
        .filter(FilterSpec::all_of(Access::Write).with::<Heat>());
    let watcher = SystemDescriptor::of::<HeatWatcher>()
        .filter(FilterSpec::all_of(Access::Read).with::<Heat>())
        .watch::<Heat>();

    let mut world = World::new(
        ComponentRegistry::new(),
        vec![
            SystemRegistration::new(integrate, Integrate),
            SystemRegistration::new(cool, CoolDown),
            SystemRegistration::new(watcher, HeatWatcher),
        ],
    )
    .unwrap();

    for index in 0..ENTITIES {
        let mut bundle = Bundle::new()
            .with(Position { x: 0.0, y: 0.0 })
            .with(Velocity { dx: 1.0, dy: 0.5 });
        if index % 4 == 0 {
            bundle = bundle.with(Heat { degrees: 100.0 });
        }
        world.add_entity(bundle).unwrap();
    }
    // Drain the spawn notifications so the measured frames start clean.
    world.update(0);
    world
}

fn frame_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");

    group.bench_function("update_10k_entities", |b| {
        b.iter_batched(
            make_world,
            |mut world| {
                world.update(16);
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("modify_churn_10k", |b| {
        b.iter_batched(
            make_world,
            |mut world| {
                for frame in 0..4 {
                    world.update(black_box(frame + 12));
                }
                black_box(world);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, frame_benchmark);
criterion_main!(benches);
