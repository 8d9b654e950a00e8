pub mod manager;
pub mod resolver;
pub mod status;

pub use manager::{ContentManager, RemovalCheck, RemovedContent};
pub use resolver::{DependencyResolver, ResolvedContent};
pub use status::{ContentStatus, InstallStatus, InstalledIndex};

#[cfg(test)]
pub(crate) mod testutil;
