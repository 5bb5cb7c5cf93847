//! Token set returned by an authorization-code exchange.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Tokens issued by the provider for a single login.
///
/// The crate never stores these; they are handed to the verification callback so the host can
/// decide whether (and where) to persist them.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedTokens {
	/// Bearer access token.
	pub access_token: TokenSecret,
	/// Refresh token, issued to confidential clients only.
	pub refresh_token: Option<TokenSecret>,
	/// Token type label reported by the provider (Bungie always reports `Bearer`).
	pub token_type: String,
	/// Instant the exchange completed.
	pub issued_at: OffsetDateTime,
	/// Access token expiry derived from `expires_in`.
	pub expires_at: Option<OffsetDateTime>,
	/// Refresh token expiry derived from `refresh_expires_in`, when the provider reports one.
	pub refresh_expires_at: Option<OffsetDateTime>,
}
impl IssuedTokens {
	/// Returns true when the access token has expired at `now`.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| now >= expires_at)
	}
}
impl Debug for IssuedTokens {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IssuedTokens")
			.field("access_token", &self.access_token)
			.field("refresh_token_set", &self.refresh_token.is_some())
			.field("token_type", &self.token_type)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.field("refresh_expires_at", &self.refresh_expires_at)
			.finish()
	}
}
