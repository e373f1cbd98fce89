//! Core domain types, errors, events and the service facade

pub mod error;
pub mod events;
pub mod service;
pub mod types;
