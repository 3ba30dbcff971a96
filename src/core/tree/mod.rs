pub mod format;
pub mod model;
pub mod visit;

pub use model::*;

use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NodeIdGen {
    next: u32,
}

impl NodeIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continues numbering after `start`, so ids from several files never collide.
    pub fn starting_at(start: u32) -> Self {
        Self { next: start }
    }

    pub fn new_id(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }

    pub fn peek(&self) -> u32 {
        self.next
    }
}
