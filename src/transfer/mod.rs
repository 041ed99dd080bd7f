//! Transfer proxy abstraction and its two production backends.

pub mod grid;
pub mod object_store;
pub mod proxy;

pub use grid::GridBackend;
pub use object_store::ObjectStoreBackend;
pub use proxy::{DataTransferProxy, TransferSession};
