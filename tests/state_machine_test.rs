// State-machine runtime: wait resolution against the world clock and
// message bus, nested routines, and deferred commands.
//
// Run:
//   cargo test --test state_machine_test -- --nocapture

mod common;

use std::sync::{Arc, Mutex};

use common::*;
use reactive_ecs::prelude::*;
use reactive_ecs::STATE_MACHINE_COMPONENT_ID;

fn bare_world() -> World {
    World::new(ComponentRegistry::new(), Vec::new()).unwrap()
}

fn machine<'a>(world: &'a World, entity: EntityId) -> &'a StateMachine {
    world
        .get_entity(entity)
        .unwrap()
        .get_as::<StateMachine>(STATE_MACHINE_COMPONENT_ID)
        .unwrap()
}

/// Two timed states, then done.
struct TimedPatrol {
    stage: usize,
}

impl Routine for TimedPatrol {
    fn name(&self) -> &str {
        match self.stage {
            0 | 1 => "walk",
            _ => "rest",
        }
    }

    fn advance(&mut self, _cx: &mut RoutineContext<'_>) -> Wait {
        self.stage += 1;
        match self.stage {
            1 => Wait::Ms(50),
            2 => Wait::Ms(100),
            _ => Wait::Stop,
        }
    }
}

#[test]
fn ms_wait_resumes_on_prefix_sum_and_carries_remainder() {
    let mut world = bare_world();
    let e = world
        .add_entity(Bundle::new().with(StateMachine::new(TimedPatrol { stage: 0 })))
        .unwrap();

    world.update(0); // first advance; waiting on 50 ms
    world.update(30);
    assert_eq!(machine(&world, e).accumulated_ms(), 30);
    assert!(machine(&world, e).is_active());

    world.update(25); // 55 >= 50: resume, carry 5 into the 100 ms wait
    assert_eq!(machine(&world, e).accumulated_ms(), 5);
    assert_eq!(machine(&world, e).name(), "rest");

    world.update(94); // 99 < 100
    assert!(machine(&world, e).is_active());
    world.update(1); // exactly 100: resume, routine terminates
    assert!(!machine(&world, e).is_active());
}

/// Counts the frames on which it resumed.
struct FrameCounter {
    resumed: Arc<Mutex<Vec<u64>>>,
    remaining: usize,
}

impl Routine for FrameCounter {
    fn name(&self) -> &str {
        "counting"
    }

    fn advance(&mut self, cx: &mut RoutineContext<'_>) -> Wait {
        self.resumed.lock().unwrap().push(cx.frame());
        if self.remaining == 0 {
            return Wait::Stop;
        }
        self.remaining -= 1;
        Wait::NextFrame
    }
}

#[test]
fn next_frame_resumes_every_frame() {
    let resumed = Arc::new(Mutex::new(Vec::new()));
    let mut world = bare_world();
    world
        .add_entity(Bundle::new().with(StateMachine::new(FrameCounter {
            resumed: resumed.clone(),
            remaining: 3,
        })))
        .unwrap();

    for _ in 0..5 {
        world.update(0);
    }
    assert_eq!(resumed.lock().unwrap().clone(), vec![0, 1, 2, 3]);
}

/// Waits for a `Ping` on a specific entity, twice.
struct Sentry {
    target: EntityId,
    stage: usize,
}

impl Routine for Sentry {
    fn name(&self) -> &str {
        if self.stage < 3 { "listening" } else { "done" }
    }

    fn advance(&mut self, cx: &mut RoutineContext<'_>) -> Wait {
        self.stage += 1;
        if self.stage <= 2 {
            cx.wait_for_message_from::<Ping>(self.target)
        } else {
            Wait::Stop
        }
    }
}

#[test]
fn message_wait_honors_target_and_never_double_resumes() {
    let mut world = bare_world();
    let beacon = world.add_entity(Bundle::new()).unwrap();
    let sentry = world
        .add_entity(Bundle::new().with(StateMachine::new(Sentry { target: beacon, stage: 0 })))
        .unwrap();

    world.update(0); // advance; now listening on the beacon

    // A ping on the wrong entity does not resume.
    world.send_message(sentry, Ping).unwrap();
    world.update(0);
    assert_eq!(machine(&world, sentry).name(), "listening");

    // Two pings on the beacon in one frame resume exactly once.
    world.send_message(beacon, Ping).unwrap();
    world.send_message(beacon, Ping).unwrap();
    world.update(0);
    assert_eq!(machine(&world, sentry).name(), "listening");
    assert!(machine(&world, sentry).is_active());

    // The second wait needs its own ping.
    world.send_message(beacon, Ping).unwrap();
    world.update(0);
    assert!(!machine(&world, sentry).is_active());
}

/// Outer routine that runs an inner countdown before finishing.
struct Escort {
    stage: usize,
}

struct Countdown {
    frames: usize,
}

impl Routine for Countdown {
    fn name(&self) -> &str {
        "countdown"
    }

    fn advance(&mut self, _cx: &mut RoutineContext<'_>) -> Wait {
        if self.frames == 0 {
            return Wait::Stop;
        }
        self.frames -= 1;
        Wait::NextFrame
    }
}

impl Routine for Escort {
    fn name(&self) -> &str {
        match self.stage {
            0..=2 => "escorting",
            _ => "released",
        }
    }

    fn advance(&mut self, _cx: &mut RoutineContext<'_>) -> Wait {
        self.stage += 1;
        match self.stage {
            1 => Wait::Routine(Box::new(Countdown { frames: 2 })),
            2 => Wait::NextFrame,
            _ => Wait::Stop,
        }
    }
}

#[test]
fn outer_routine_resumes_only_after_inner_stops() {
    let mut world = bare_world();
    let e = world
        .add_entity(Bundle::new().with(StateMachine::new(Escort { stage: 0 })))
        .unwrap();

    world.update(0); // outer pushes inner; inner waits a frame
    assert_eq!(machine(&world, e).name(), "countdown");
    world.update(0); // inner waits again
    assert_eq!(machine(&world, e).name(), "countdown");
    world.update(0); // inner stops; outer resumes and waits a frame
    assert_eq!(machine(&world, e).name(), "escorting");
    assert!(machine(&world, e).is_active());
    world.update(0); // outer finishes
    assert!(!machine(&world, e).is_active());
}

#[test]
fn name_changes_notify_subscribers() {
    let mut world = bare_world();
    let names = Arc::new(Mutex::new(Vec::new()));
    let sink = names.clone();

    let mut sm = StateMachine::new(TimedPatrol { stage: 0 });
    sm.subscribe(move |name| sink.lock().unwrap().push(name.to_string()));
    let _e = world.add_entity(Bundle::new().with(sm)).unwrap();

    world.update(0); // "walk" (unchanged from construction), no notification yet
    world.update(50); // resume into stage 2: "rest"
    assert_eq!(names.lock().unwrap().clone(), vec!["rest".to_string()]);
}

/// Drops a marker on its owner through the command buffer, then stops.
struct Igniter;

impl Routine for Igniter {
    fn name(&self) -> &str {
        "igniting"
    }

    fn advance(&mut self, cx: &mut RoutineContext<'_>) -> Wait {
        let owner = cx.entity();
        cx.commands().add(owner, Burning);
        Wait::Stop
    }
}

#[test]
fn routines_mutate_the_world_through_commands() {
    let mut world = bare_world();
    let e = world
        .add_entity(Bundle::new().with(StateMachine::new(Igniter)))
        .unwrap();

    assert!(!world.has_component::<Burning>(e));
    world.update(0);
    assert!(world.has_component::<Burning>(e));
    assert!(!machine(&world, e).is_active());
}

#[test]
fn stopped_machines_keep_their_component_and_ignore_ticks() {
    let mut world = bare_world();
    let e = world
        .add_entity(Bundle::new().with(StateMachine::new(Igniter)))
        .unwrap();
    world.update(0);
    world.update(16);
    world.update(16);

    let sm = machine(&world, e);
    assert!(!sm.is_active());
    assert_eq!(sm.accumulated_ms(), 0);
}

#[test]
fn wait_equality_laws() {
    assert_eq!(Wait::Ms(50), Wait::Ms(50));
    assert_eq!(Wait::Frames(2), Wait::Frames(2));
    assert_ne!(Wait::Ms(50), Wait::Ms(51));
    assert_eq!(Wait::seconds(0.05), Wait::Ms(50));
    assert_ne!(
        Wait::Routine(Box::new(Igniter)),
        Wait::Routine(Box::new(Igniter))
    );
}
