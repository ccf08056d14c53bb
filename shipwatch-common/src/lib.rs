pub mod logging;
pub mod store;
pub mod types;
pub mod validate;

pub use store::SnapshotStore;
pub use types::{PartialRecord, Position, ShipSnapshot};
pub use validate::{validate, ValidationError};
