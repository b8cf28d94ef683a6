//! Local store for the offline patient cache: atomic patient batches,
//! localized chart rows, JSON persistence and change notification.

mod memory;
mod notify;
mod rows;
mod snapshot;

pub use memory::MemoryStore;
pub use notify::ChangeBus;
pub use snapshot::{ChartGroup, ChartLayout, ConceptDictionary, StoreSnapshot, StoredObservation};
