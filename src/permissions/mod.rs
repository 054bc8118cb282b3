//! Permission system for checking user roles.
//!
//! Roles come from two places: owners are listed in `OWNER_ID`, admins are
//! flagged in the database. Ban and role lookups run on every update, so
//! they are cached and invalidated whenever an admin changes them.
//!
//! ## Usage
//!
//! ```rust
//! if state.permissions.is_banned(user_id).await? {
//!     return Ok(());
//! }
//! if !state.permissions.is_authorized(user_id).await? {
//!     // refuse admin command
//! }
//! ```

mod checker;

pub use checker::{Permissions, Refusal};
