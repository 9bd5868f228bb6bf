//! Cookie codec.

pub mod codec;
pub mod options;

pub use codec::{delete, delete_with, parse, parse_headers, serialize, serialize_at};
pub use options::{CookieOptions, SameSite, DEFAULT_MAX_AGE_SECS};
