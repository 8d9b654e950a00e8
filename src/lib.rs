// ─── modkeep Core ───
// Content-management and download-orchestration engine for moddable game
// instances.
//
// Architecture:
//   error       — Central error enum + result alias
//   config      — Engine configuration handed in by the host
//   catalog     — Remote catalog client trait + catalog data types
//   instance/   — Instance records, on-disk store, per-action lock map
//   content/    — Dependency resolver, status classifier, content manager
//   downloader/ — Concurrent batch downloads with throttled telemetry
//
// The host application supplies the outer surfaces (transport, UI, auth,
// the concrete catalog backend); this crate owns the instance state on disk
// and every mutation of it.

pub mod catalog;
pub mod config;
pub mod content;
pub mod downloader;
pub mod error;
pub mod instance;

pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};
