//! Provider-facing descriptors (data) and strategies (behavior).
//!
//! `descriptor` exposes validated metadata (`ProviderDescriptor`) covering HTTPS-only
//! endpoints, client authentication preferences, and provider quirks (PKCE requirement).
//! `strategy` defines [`ProviderStrategy`], an HTTP-client-agnostic hook used by flows and the
//! Bungie adapter to map upstream failures into the crate error taxonomy.

pub mod descriptor;
pub mod strategy;

pub use descriptor::*;
pub use strategy::*;
