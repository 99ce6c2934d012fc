//! World events - explicit messages instead of engine callbacks
//!
//! Subsystems push events while the frame or tick runs; the owner of the
//! world drains them and hands each to whichever sink cares.

use glam::IVec2;

use super::particles::{OwnerTag, ParticleId};
use super::rigid_body::BodyId;
use crate::simulation::MaterialInstance;

#[derive(Clone, Debug, PartialEq)]
pub enum WorldEvent {
    /// A tile was written through the external `set_tile` entry point
    TileChanged { x: i32, y: i32 },
    BodyCreated { id: BodyId },
    BodyRemoved { id: BodyId },
    /// A particle merged into the grid at `(x, y)`
    ParticleSettled {
        id: ParticleId,
        x: i32,
        y: i32,
        tile: MaterialInstance,
    },
    /// A particle left the simulation (settled, expired or out of bounds).
    /// Owners use this to drop it from their in-flight lists.
    ParticleKilled {
        id: ParticleId,
        owner: Option<OwnerTag>,
    },
    ChunkMerged { chunk: IVec2 },
    ChunkUnloaded { chunk: IVec2 },
    Explosion { x: i32, y: i32, radius: i32 },
}

/// Narrow dispatch interface for event consumers
pub trait WorldEventSink {
    fn handle(&mut self, event: &WorldEvent);
}

impl<F: FnMut(&WorldEvent)> WorldEventSink for F {
    fn handle(&mut self, event: &WorldEvent) {
        self(event)
    }
}

/// FIFO of pending events
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<WorldEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: WorldEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorldEvent> {
        self.events.iter()
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, WorldEvent> {
        self.events.drain(..)
    }

    /// Hand every pending event to `sink` in order, leaving the queue empty
    pub fn dispatch(&mut self, sink: &mut dyn WorldEventSink) -> usize {
        let count = self.events.len();
        for event in self.events.drain(..) {
            sink.handle(&event);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_preserves_order_and_empties() {
        let mut queue = EventQueue::new();
        queue.push(WorldEvent::TileChanged { x: 1, y: 2 });
        queue.push(WorldEvent::Explosion {
            x: 0,
            y: 0,
            radius: 5,
        });

        let mut seen = Vec::new();
        let mut sink = |event: &WorldEvent| seen.push(event.clone());
        let count = queue.dispatch(&mut sink);

        assert_eq!(count, 2);
        assert!(queue.is_empty());
        assert_eq!(seen[0], WorldEvent::TileChanged { x: 1, y: 2 });
    }

    #[test]
    fn test_drain() {
        let mut queue = EventQueue::new();
        queue.push(WorldEvent::ChunkMerged {
            chunk: IVec2::new(0, 0),
        });
        let drained: Vec<_> = queue.drain().collect();
        assert_eq!(drained.len(), 1);
        assert!(queue.is_empty());
    }
}
