//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository, controller and interpreter calls into
//!   use-case level APIs.
//! - Keep UI/FFI layers decoupled from storage details.

pub mod tracker_service;
