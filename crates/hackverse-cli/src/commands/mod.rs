//! Command handlers.

pub(crate) mod compare;
pub(crate) mod event;
pub(crate) mod health;
