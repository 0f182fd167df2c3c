//! Route handlers organized by access level.

pub mod home;
pub mod public;
