//! Session output storage and the open-location action

pub mod opener;
pub mod store;

pub use opener::{LocationOpener, SystemOpener};
pub use store::{FsOutputStore, OutputStore, StorageError};
