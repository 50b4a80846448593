//! Change-event fabric for the Regulated Entity Ledger.
//!
//! Handlers build a [`ChangeEvent`] for every mutation and stage it inside
//! their unit of work. The ledger asks the [`EventFabric`] to admit the staged
//! events before the store commit and to deliver them after it, so a
//! subscriber only ever sees events whose state and history writes are
//! already durable.

pub mod error;
pub mod event;
pub mod fabric;

pub use error::FabricError;
pub use event::{decode_committed, ChangeEvent, CommittedEvent, EventName};
pub use fabric::{EventFabric, EventFilter, EventStream, FabricConfig};
