//! Request guards carrying the caller's authority.

mod admin_key;
mod session;
mod terminal;

pub use admin_key::AdminKey;
pub use session::SessionToken;
pub use terminal::Terminal;

pub const API_KEY_HEADER: &str = "X-Api-Key";
pub const TERMINAL_HEADER: &str = "X-Terminal-Id";
