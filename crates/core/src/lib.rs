//! parley-core – Gemeinsame Typen, Rollen und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Parley-Crates gemeinsam genutzt werden.

pub mod error;
pub mod role;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{ParleyError, Result};
pub use role::Role;
pub use types::{ConnectionId, RoomId, UserId};
