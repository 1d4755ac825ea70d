//! Configuration stores: the local file and the remote key.

mod fields;
mod format;
mod local;
mod remote;
mod store;

#[cfg(feature = "remote")]
pub mod providers;

pub(crate) use fields::deserialize_tree;
pub use format::FileFormat;
pub use local::LocalStore;
pub use remote::{RemoteProvider, RemoteStore};
pub use store::{ConfigStore, SourceKind};

#[cfg(feature = "remote")]
pub use providers::{EtcdProvider, HttpAuth, HttpProvider};
