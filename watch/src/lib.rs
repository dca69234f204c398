//! Filesystem watching and content-addressed file identity (§4.1).
//!
//! - [`filter`]: include/exclude glob matching and the file-size gate.
//! - [`identity`]: content-hash computation, media-type classification,
//!   and the insert/update/rename/restore resolution in
//!   [`identity::IdentityResolver`].
//! - [`event`]: raw [`event::FileEvent`]s and the
//!   [`event::ResolvedEvent`]s identity resolution produces.
//! - [`manager`]: [`manager::WatchManager`], which owns the debounced
//!   `notify` watches and forwards filtered events to one registered
//!   [`manager::EventSink`].

pub mod error;
pub mod event;
pub mod filter;
pub mod identity;
pub mod manager;

pub use error::{Result, WatchError};
pub use event::{FileEvent, FileEventKind, ResolvedAction, ResolvedEvent};
pub use filter::PathFilter;
pub use identity::IdentityResolver;
pub use manager::{EventSink, WatchManager, WatchStatus};
