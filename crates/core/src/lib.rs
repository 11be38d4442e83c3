//! Core vocabulary of the head protocol node.
//!
//! This crate defines the complete language spoken between the deterministic
//! head logic and its runtime:
//!
//! - [`Input`]: everything the logic can receive (network, client, chain,
//!   time)
//! - [`Effect`]: everything the logic can ask the runtime to do
//! - [`Message`]: the peer protocol
//! - [`ChainEvent`] / [`PostChainTx`]: the chain collaborator interface
//! - [`ClientCommand`] / [`ServerOutput`]: the client API payloads
//!
//! # Architecture
//!
//! The node is built on a simple event-driven model:
//!
//! ```text
//! Inputs → HeadLogic::handle() → Effects
//! ```
//!
//! The logic is synchronous, deterministic and performs no I/O. All I/O is
//! handled by the runtime, which delivers inputs in queue order, executes
//! the returned effects, and feeds results (chain observations, delayed
//! inputs) back in as new inputs.

mod chain;
mod client;
mod effect;
mod input;
mod message;

pub use chain::{Chain, ChainEvent, ChainSlot, ChainState, Observation, PostChainTx};
pub use client::{ClientCommand, ServerOutput};
pub use effect::Effect;
pub use input::Input;
pub use message::Message;
