//! Shared fixtures for the integration tests: a small component vocabulary
//! and a recording reactive system.
#![allow(dead_code)]

use std::any::Any;
use std::sync::{Arc, Mutex};

use reactive_ecs::prelude::*;
use reactive_ecs::ComponentId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Component for Position {
    fn value_eq(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<Self>() == Some(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Velocity {
    pub dx: f32,
    pub dy: f32,
}

impl Component for Velocity {
    fn value_eq(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<Self>() == Some(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Health {
    pub points: i32,
}

impl Component for Health {
    fn value_eq(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<Self>() == Some(self)
    }
}

/// Marker set while an entity burns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Burning;

impl Component for Burning {}

/// Survives bulk replacement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shield;

impl Component for Shield {
    const KEEP_ON_REPLACE: bool = true;
}

/// Transient damage notice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Damage {
    pub amount: i32,
}

impl Component for Damage {
    const KIND: ComponentKind = ComponentKind::Message;
    const PERSIST: bool = false;
}

/// Transient empty signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ping;

impl Component for Ping {
    const KIND: ComponentKind = ComponentKind::Message;
    const PERSIST: bool = false;
}

/// Shared log of reactive notifications.
pub type EventLog = Arc<Mutex<Vec<(NotificationKind, EntityId)>>>;

/// Reactive system that records every notification it receives.
pub struct WatchRecorder {
    pub log: EventLog,
}

impl System for WatchRecorder {
    fn react(&mut self, _cx: &mut SystemContext<'_>, kind: NotificationKind, entities: &[EntityId]) {
        let mut log = self.log.lock().unwrap();
        for &entity in entities {
            log.push((kind, entity));
        }
    }
}

/// Shared log of consumed messages.
pub type MessageLog = Arc<Mutex<Vec<(EntityId, ComponentId)>>>;

/// Reactive system that records every message it consumes.
pub struct MessageRecorder {
    pub log: MessageLog,
}

impl System for MessageRecorder {
    fn message(&mut self, _cx: &mut SystemContext<'_>, entity: EntityId, message: ComponentId) {
        self.log.lock().unwrap().push((entity, message));
    }
}

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn message_log() -> MessageLog {
    Arc::new(Mutex::new(Vec::new()))
}
