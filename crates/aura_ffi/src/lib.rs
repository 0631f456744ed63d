//! Flutter-facing bindings for the Aura habit tracker core.

pub mod api;
