pub mod cache;
pub mod set;

pub use cache::{PermissionCache, PermissionKey, PermissionView};
pub use set::PermissionSet;
