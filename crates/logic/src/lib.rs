//! The head-logic state machine.
//!
//! [`HeadLogic`] is the deterministic core of the node: it consumes
//! [`hydra_core::Input`]s one at a time and returns the
//! [`hydra_core::Effect`]s the runtime must execute. It is:
//!
//! - **Synchronous**: no async, no blocking, no waiting
//! - **Deterministic**: same state + same input = same new state and effects
//! - **I/O free**: all side effects are described, never performed
//!
//! Two honest parties fed the same input sequence therefore end up with
//! identical head states and identical effect sequences, which is what the
//! snapshot protocol's unanimity rests on.

mod env;
mod logic;
mod state;

pub use env::Environment;
pub use logic::{HeadLogic, LogicConfig};
pub use state::{
    Checkpoint, ClosedState, CoordinatedState, HeadState, InitialState, OpenState, PersistedState,
    SeenSnapshot,
};
