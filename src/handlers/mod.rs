//! HTTP request handlers.

pub mod drivers;
pub mod health;
pub mod invitations;
