//! Token secrets and the token set produced by a code exchange.

pub mod issued;
pub mod secret;
