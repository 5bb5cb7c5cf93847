//! Auth-domain identifiers and issued token models.

pub mod id;
pub mod token;

pub use id::*;
pub use token::{issued::*, secret::*};
