// pdqueue Infrastructure - In-Memory Coordination Service
// Implements: CoordinationClient (hierarchical namespace, sequential nodes, one-shot child watches)

mod namespace;
mod session;

pub use namespace::InMemoryCoordination;
pub use session::{CoordinationSession, SessionState};
