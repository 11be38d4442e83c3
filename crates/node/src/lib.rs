//! The head protocol node runtime.
//!
//! Wires the deterministic [`hydra_logic::HeadLogic`] to the world:
//!
//! - [`InputQueue`]: the single linearization point for chain, network,
//!   client and timer inputs
//! - [`NodeRuntime`]: the one consumer thread driving
//!   `dequeue → handle → persist → dispatch`
//! - [`ChainObserver`]: accumulated chain-state view feeding observations
//!   into the queue
//! - [`TimerThread`]: wall-clock execution of delayed inputs
//! - [`sim`]: in-process chain and delay fakes for tests and standalone
//!   mode

mod delay;
mod env;
mod observer;
pub mod options;
mod queue;
mod runtime;
pub mod sim;

pub use delay::{DelayHandler, TimerThread};
pub use env::{build_environment, publish_scripts_tx_id, OptionsError};
pub use observer::ChainObserver;
pub use queue::{Enqueued, InputQueue};
pub use runtime::{load_or_initialize, NodeRuntime, RuntimeConfig, RuntimeError};
