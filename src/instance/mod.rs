pub mod locks;
pub mod model;
pub mod store;

pub use locks::{LockAction, LockMap};
pub use model::{ContentEntry, ContentType, Instance, InstancePatch, Loader, LoaderKind};
pub use store::{InstanceStore, SortBy, SortDir};
