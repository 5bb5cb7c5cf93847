//! Provider strategy hooks that classify upstream failures.
//!
//! Implementations map token endpoint OAuth errors and provider-specific platform errors into
//! the crate taxonomy without tying flows to any particular HTTP client.

// self
use crate::{_prelude::*, provider::descriptor::Endpoint};

/// Strategy hook that allows providers to classify upstream errors.
///
/// Implementors are required to be `Send + Sync`, and the hook intentionally uses crate-owned
/// data types so downstream crates never depend on reqwest-specific structures.
pub trait ProviderStrategy: Send + Sync {
	/// Maps low-level HTTP/JSON errors into the crate taxonomy.
	fn classify_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind;
}

/// Canonical provider error categories used by strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
	/// Provider rejected the grant or the access token.
	InvalidGrant,
	/// Client authentication (credentials or API key) failed.
	InvalidClient,
	/// Failure is temporary and should be retried.
	Transient,
	/// Provider reported a failure outside the OAuth taxonomy.
	Upstream,
}

/// Context passed to provider strategies when classifying errors.
///
/// The struct keeps only primitive data (status codes, error fields, body preview) so
/// strategies stay decoupled from any HTTP client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// Endpoint associated with the failing request.
	pub endpoint: Endpoint,
	/// HTTP status code returned by the provider, when available.
	pub http_status: Option<u16>,
	/// Provider-supplied OAuth `error` field or platform `ErrorStatus`.
	pub oauth_error: Option<String>,
	/// Provider-supplied OAuth `error_description` field or platform `Message`.
	pub error_description: Option<String>,
	/// Preview of the response body for non-JSON payloads.
	pub body_preview: Option<String>,
	/// Indicates whether the failure originated from the network/transport layer.
	pub network_error: bool,
}
impl ProviderErrorContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Creates a new context scoped to the provided endpoint.
	pub fn new(endpoint: Endpoint) -> Self {
		Self {
			endpoint,
			http_status: None,
			oauth_error: None,
			error_description: None,
			body_preview: None,
			network_error: false,
		}
	}

	/// Convenience constructor for transport-level/network failures.
	pub fn network_failure(endpoint: Endpoint) -> Self {
		let mut ctx = Self::new(endpoint);

		ctx.network_error = true;

		ctx
	}

	/// Adds an HTTP status code (e.g., 400, 401, 500).
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the error code string returned by the provider.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the human-readable error description.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Adds a body preview for providers that return non-JSON payloads.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(truncate_preview(body.into()));

		self
	}
}

/// Default strategy that applies RFC-guided heuristics.
///
/// It prioritizes structured OAuth fields (`error`, `error_description`), then falls back to
/// body text hints, and finally the HTTP status code. Network failures are always transient.
#[derive(Debug, Default)]
pub struct DefaultProviderStrategy;
impl Display for DefaultProviderStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("default-provider-strategy")
	}
}
impl ProviderStrategy for DefaultProviderStrategy {
	fn classify_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		if ctx.network_error {
			return ProviderErrorKind::Transient;
		}

		if let Some(kind) =
			classify_oauth_error(ctx.oauth_error.as_deref(), ctx.error_description.as_deref())
		{
			return kind;
		}
		if let Some(kind) = classify_body(ctx.body_preview.as_deref()) {
			return kind;
		}

		classify_status(ctx.http_status)
	}
}

/// Bungie.net strategy.
///
/// Bungie reports most failures through the platform envelope (`ErrorCode`/`ErrorStatus`),
/// frequently alongside HTTP 200. Known statuses are matched first; anything else falls back to
/// [`DefaultProviderStrategy`], except that an unknown status on a successful HTTP response is
/// surfaced as [`ProviderErrorKind::Upstream`].
#[derive(Debug, Default)]
pub struct BungieProviderStrategy;
impl Display for BungieProviderStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("bungie-provider-strategy")
	}
}
impl ProviderStrategy for BungieProviderStrategy {
	fn classify_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		if ctx.network_error {
			return ProviderErrorKind::Transient;
		}
		if let Some(kind) = ctx.oauth_error.as_deref().and_then(classify_platform_status) {
			return kind;
		}
		if ctx.endpoint == Endpoint::Profile
			&& matches!(ctx.http_status, Some(200..=299) | None)
			&& ctx.oauth_error.is_some()
		{
			return ProviderErrorKind::Upstream;
		}

		DefaultProviderStrategy.classify_error(ctx)
	}
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= ProviderErrorContext::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = String::new();

	for (idx, ch) in body.chars().enumerate() {
		if idx >= ProviderErrorContext::BODY_PREVIEW_LIMIT {
			buf.push('…');

			break;
		}
		buf.push(ch);
	}

	buf
}

fn classify_platform_status(status: &str) -> Option<ProviderErrorKind> {
	match status {
		"WebAuthRequired"
		| "AccessTokenHasExpired"
		| "AuthorizationCodeInvalid"
		| "AuthorizationCodeStale"
		| "AuthorizationRecordExpired"
		| "AuthorizationRecordRevoked"
		| "AccessNotPermittedByApplicationScope" => Some(ProviderErrorKind::InvalidGrant),
		"ApiKeyMissingFromRequest"
		| "ApiInvalidOrExpiredKey"
		| "OriginHeaderDoesNotMatchKey"
		| "ApplicationDisabled"
		| "InvalidClientId" => Some(ProviderErrorKind::InvalidClient),
		"SystemDisabled"
		| "ThrottleLimitExceeded"
		| "ThrottleLimitExceededMinutes"
		| "ThrottleLimitExceededMomentarily"
		| "ThrottleLimitExceededSeconds"
		| "PerEndpointRequestThrottleExceeded"
		| "PerApplicationThrottleExceeded"
		| "DestinyThrottledByGameServer" => Some(ProviderErrorKind::Transient),
		_ => None,
	}
}

fn classify_oauth_error(
	oauth_error: Option<&str>,
	error_description: Option<&str>,
) -> Option<ProviderErrorKind> {
	oauth_error
		.and_then(match_exact_value)
		.or_else(|| error_description.and_then(match_exact_value))
		.or_else(|| classify_body(error_description))
}

fn match_exact_value(value: &str) -> Option<ProviderErrorKind> {
	if value.eq_ignore_ascii_case("invalid_grant") || value.eq_ignore_ascii_case("access_denied") {
		Some(ProviderErrorKind::InvalidGrant)
	} else if value.eq_ignore_ascii_case("invalid_client")
		|| value.eq_ignore_ascii_case("unauthorized_client")
	{
		Some(ProviderErrorKind::InvalidClient)
	} else if value.eq_ignore_ascii_case("temporarily_unavailable")
		|| value.eq_ignore_ascii_case("server_error")
	{
		Some(ProviderErrorKind::Transient)
	} else {
		None
	}
}

fn classify_body(body: Option<&str>) -> Option<ProviderErrorKind> {
	let body = body?;
	let lowered = body.to_ascii_lowercase();

	match lowered.as_str() {
		text if text.contains("invalid_grant") => Some(ProviderErrorKind::InvalidGrant),
		text if text.contains("invalid_client") => Some(ProviderErrorKind::InvalidClient),
		text if text.contains("temporarily_unavailable") || text.contains("retry") =>
			Some(ProviderErrorKind::Transient),
		_ => None,
	}
}

fn classify_status(status: Option<u16>) -> ProviderErrorKind {
	match status {
		Some(400 | 404 | 410) => ProviderErrorKind::InvalidGrant,
		Some(401 | 403) => ProviderErrorKind::InvalidClient,
		Some(429) => ProviderErrorKind::Transient,
		Some(code) if code >= 500 => ProviderErrorKind::Transient,
		_ => ProviderErrorKind::Transient,
	}
}
