//! Crate-level error types shared across flows, providers, and the Bungie adapter.

// self
use crate::{_prelude::*, provider::Endpoint};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Profile lookup failed after a successful token exchange.
	#[error(transparent)]
	Profile(#[from] ProfileError),

	/// Provider rejected the grant (bad code, expired or revoked access token).
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or crate-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials (including the API key) are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider- or crate-supplied reason string.
		reason: String,
	},
	/// Host verification callback refused the authenticated user.
	#[error("Verification callback rejected the login.")]
	Verification {
		/// Host-supplied failure.
		#[source]
		source: BoxError,
	},
}
impl Error {
	/// Wraps a host verification failure.
	pub fn verification(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Verification { source: Box::new(src) }
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Provider descriptor contains an invalid URL.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Identifier failed validation.
	#[error(transparent)]
	Identifier(#[from] crate::auth::IdentifierError),
	/// Provider descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] crate::provider::ProviderDescriptorError),
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Authorization parameter supplier tried to override a parameter owned by the flow.
	#[error("Authorization parameter `{name}` is managed by the login flow and cannot be overridden.")]
	ReservedAuthorizationParam {
		/// Offending parameter name.
		name: String,
	},
	/// Profile endpoint URL cannot be derived from the membership identifier.
	#[error("Profile endpoint URL is invalid.")]
	InvalidProfileUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// API key cannot be used as an HTTP header value.
	#[error("API key contains characters that are not valid in an HTTP header.")]
	InvalidApiKey,
	/// Token endpoint returned an excessively large duration.
	#[error("The {field} value exceeds the supported range.")]
	ExpiresInOutOfRange {
		/// Token response field that overflowed.
		field: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected but non-fatal response.
	#[error("The {endpoint} endpoint returned an unexpected response: {message}.")]
	Endpoint {
		/// Endpoint that failed.
		endpoint: Endpoint,
		/// Provider- or crate-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After or `ThrottleSeconds` hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the provider.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the provider.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Failures raised while locating or decoding the authenticated user's profile.
#[derive(Debug, ThisError)]
pub enum ProfileError {
	/// Token response did not carry a membership identifier.
	#[error("Token response is missing the membership_id field.")]
	MissingMembershipId,
	/// Token response carried a membership identifier that cannot be used in a URL path.
	#[error("Token response carries an invalid membership_id: {reason}.")]
	InvalidMembershipId {
		/// Validation failure.
		reason: String,
	},
	/// Profile endpoint returned JSON that does not match the expected schema.
	#[error("Profile endpoint returned a malformed response.")]
	MalformedResponse {
		/// Path-aware decoding failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Platform envelope reported an error the provider strategy could not classify.
	#[error("Bungie platform returned {status} ({code}): {message}.")]
	Platform {
		/// Platform `ErrorCode`.
		code: i32,
		/// Platform `ErrorStatus`.
		status: String,
		/// Platform `Message`.
		message: String,
	},
	/// Profile endpoint answered with a non-success status and no platform envelope.
	#[error("Profile endpoint returned HTTP {status}.")]
	UnexpectedStatus {
		/// HTTP status code.
		status: u16,
		/// Truncated response body.
		body_preview: Option<String>,
	},
}
