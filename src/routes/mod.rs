//! Route modules for the highlight anchor server

pub mod health;
pub mod highlights;
pub mod preferences;
