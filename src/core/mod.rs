/// Runtime support shared by the library and the binary
///
/// - In-memory configuration store serving register data to the engine
/// - Task spawning helpers
pub mod store;
pub mod task_manager;

pub use store::{MemoryStore, StoreError};
