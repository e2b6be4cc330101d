//! Session markers and expiry handling

pub mod guard;
pub mod markers;
pub mod memory;

pub use guard::{ExpiryAction, SessionExpirationGuard};
pub use markers::{RedirectFailurePolicy, SessionMarkers};
pub use memory::MemorySessionStore;
