//! `oauth2` facade for the authorization-code exchange plus shared error mapping.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret, EndpointNotSet,
	EndpointSet, ExtraTokenFields, HttpClientError, PkceCodeVerifier, RedirectUrl,
	RequestTokenError, StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRequestTokenError, BasicRevocationErrorResponse,
		BasicTokenIntrospectionResponse, BasicTokenType,
	},
};
use serde_json::{Map, Value};
// self
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;
use crate::{
	_prelude::*,
	auth::{IssuedTokens, TokenSecret},
	error::{ConfigError, TransientError, TransportError},
	flows::{ClientRegistration, ExtraParams, TokenExchange},
	http::{ProviderHttpClient, ResponseMetadata, ResponseMetadataSlot},
	provider::{
		ClientAuthMethod, Endpoint, ProviderDescriptor, ProviderErrorContext, ProviderErrorKind,
		ProviderStrategy,
	},
};

type ExchangeTokenResponse = StandardTokenResponse<ProviderTokenFields, BasicTokenType>;
type ConfiguredClient = Client<
	BasicErrorResponse,
	ExchangeTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Provider-specific members of a token response (anything outside RFC 6749 §5.1).
///
/// Bungie places `membership_id` and `refresh_expires_in` here.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderTokenFields {
	/// Non-standard response members keyed by name.
	#[serde(flatten)]
	pub fields: Map<String, Value>,
}
impl ExtraTokenFields for ProviderTokenFields {}

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a crate error.
	fn map_transport_error(
		&self,
		strategy: &dyn ProviderStrategy,
		endpoint: Endpoint,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		strategy: &dyn ProviderStrategy,
		endpoint: Endpoint,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(strategy, endpoint, meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => map_generic_transport_error(endpoint, meta, message),
			_ => map_unknown_transport_error(endpoint, meta),
		}
	}
}

/// Performs the authorization-code exchange against a descriptor's token endpoint.
pub(crate) struct CodeExchangeFacade<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> CodeExchangeFacade<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn from_descriptor(
		descriptor: &ProviderDescriptor,
		registration: &ClientRegistration,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let auth_url = AuthUrl::new(descriptor.endpoints.authorization.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let token_url = TokenUrl::new(descriptor.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let redirect_url = RedirectUrl::new(registration.redirect_uri.to_string())
			.map_err(|source| ConfigError::InvalidRedirect { source })?;
		let secret =
			if matches!(descriptor.preferred_client_auth_method, ClientAuthMethod::NoneWithPkce) {
				None
			} else {
				registration.client_secret.as_ref().map(|value| ClientSecret::new(value.to_owned()))
			};
		let mut oauth_client: ConfiguredClient =
			Client::new(ClientId::new(registration.client_id.clone()))
				.set_auth_uri(auth_url)
				.set_token_uri(token_url)
				.set_redirect_uri(redirect_url);

		if let Some(secret) = secret {
			oauth_client = oauth_client.set_client_secret(secret);
		}
		if matches!(descriptor.preferred_client_auth_method, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self {
			oauth_client,
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
		})
	}

	pub(crate) fn exchange_authorization_code<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		code: &'a str,
		pkce_verifier: Option<&'a str>,
	) -> FacadeFuture<'a, TokenExchange> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let mut request = self.oauth_client.exchange_code(AuthorizationCode::new(code.to_owned()));

			if let Some(verifier) = pkce_verifier {
				request = request.set_pkce_verifier(PkceCodeVerifier::new(verifier.to_owned()));
			}

			let response = request.request_async(&instrumented).await.map_err(|err| {
				map_request_error(strategy, meta.take(), err, self.error_mapper.as_ref())
			})?;

			map_exchange_response(response)
		})
	}
}
#[cfg(feature = "reqwest")]
impl CodeExchangeFacade<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	#[cfg(test)]
	fn reqwest(descriptor: &ProviderDescriptor, registration: &ClientRegistration) -> Result<Self> {
		Self::from_descriptor(
			descriptor,
			registration,
			ReqwestHttpClient::default(),
			ReqwestTransportErrorMapper,
		)
	}
}

/// Converts a strategy classification into a crate error.
///
/// [`ProviderErrorKind::Upstream`] has no dedicated variant at this layer and is reported as
/// a transient endpoint failure; callers that can do better handle it before calling.
pub(crate) fn classified_error(
	kind: ProviderErrorKind,
	endpoint: Endpoint,
	message: String,
	meta: Option<&ResponseMetadata>,
) -> Error {
	match kind {
		ProviderErrorKind::InvalidGrant => Error::InvalidGrant { reason: message },
		ProviderErrorKind::InvalidClient => Error::InvalidClient { reason: message },
		ProviderErrorKind::Transient | ProviderErrorKind::Upstream => TransientError::Endpoint {
			endpoint,
			message,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn map_exchange_response(response: ExchangeTokenResponse) -> Result<TokenExchange> {
	let issued_at = OffsetDateTime::now_utc();
	let expires_in = response.expires_in().map(|value| value.as_secs());
	let expires_at =
		expires_in.map(|secs| offset_from(issued_at, secs, "expires_in")).transpose()?;
	let fields = response.extra_fields().fields.clone();
	let refresh_expires_at = fields
		.get("refresh_expires_in")
		.and_then(Value::as_u64)
		.map(|secs| offset_from(issued_at, secs, "refresh_expires_in"))
		.transpose()?;
	let token_type = token_type_label(response.token_type());
	let tokens = IssuedTokens {
		access_token: TokenSecret::new(response.access_token().secret().to_owned()),
		refresh_token: response.refresh_token().map(|token| TokenSecret::new(token.secret().to_owned())),
		token_type: token_type.clone(),
		issued_at,
		expires_at,
		refresh_expires_at,
	};

	Ok(TokenExchange { tokens, extra: ExtraParams { expires_in, token_type, fields } })
}

fn offset_from(issued_at: OffsetDateTime, secs: u64, field: &'static str) -> Result<OffsetDateTime> {
	let secs = i64::try_from(secs).map_err(|_| ConfigError::ExpiresInOutOfRange { field })?;

	issued_at
		.checked_add(Duration::seconds(secs))
		.ok_or_else(|| ConfigError::ExpiresInOutOfRange { field }.into())
}

fn token_type_label(token_type: &BasicTokenType) -> String {
	match token_type {
		BasicTokenType::Bearer => "Bearer".into(),
		BasicTokenType::Mac => "MAC".into(),
		BasicTokenType::Extension(value) => value.clone(),
	}
}

fn map_request_error<E, M>(
	strategy: &dyn ProviderStrategy,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(strategy, response, meta_ref),
		RequestTokenError::Request(error) =>
			mapper.map_transport_error(strategy, Endpoint::Token, meta_ref, error),
		RequestTokenError::Parse(error, _body) =>
			TransientError::TokenResponseParse { source: error, status: meta_status(meta_ref) }
				.into(),
		RequestTokenError::Other(message) => TransientError::Endpoint {
			endpoint: Endpoint::Token,
			message,
			status: meta_status(meta_ref),
			retry_after: meta_retry_after(meta_ref),
		}
		.into(),
	}
}

fn map_server_response_error(
	strategy: &dyn ProviderStrategy,
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let mut ctx = ProviderErrorContext::new(Endpoint::Token)
		.with_oauth_error(response.error().as_ref().to_string());

	if let Some(description) = response.error_description() {
		ctx = ctx.with_error_description(description.clone());
	}
	if let Some(status) = meta_status(meta) {
		ctx = ctx.with_http_status(status);
	}

	let message = if let Some(description) = response.error_description() {
		format!("token endpoint returned an OAuth error: {description}")
	} else {
		format!("token endpoint returned an OAuth error: {}", response.error().as_ref())
	};

	classified_error(strategy.classify_error(&ctx), Endpoint::Token, message, meta)
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(
	strategy: &dyn ProviderStrategy,
	endpoint: Endpoint,
	meta: Option<&ResponseMetadata>,
	err: ReqwestError,
) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		let status = meta_status(meta).or_else(|| err.status().map(|code| code.as_u16()));
		let mut ctx = ProviderErrorContext::network_failure(endpoint);

		if let Some(status) = status {
			ctx = ctx.with_http_status(status);
		}

		let message = format!("request timed out while calling the {endpoint} endpoint");

		return match strategy.classify_error(&ctx) {
			ProviderErrorKind::Transient => TransientError::Endpoint {
				endpoint,
				message,
				status,
				retry_after: meta_retry_after(meta),
			}
			.into(),
			kind => classified_error(kind, endpoint, message, meta),
		};
	}

	TransportError::from(err).into()
}

#[cfg(feature = "reqwest")]
fn map_generic_transport_error(
	endpoint: Endpoint,
	meta: Option<&ResponseMetadata>,
	message: impl Display,
) -> Error {
	TransientError::Endpoint {
		endpoint,
		message: format!("HTTP client error occurred: {message}"),
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
	}
	.into()
}

#[cfg(feature = "reqwest")]
fn map_unknown_transport_error(endpoint: Endpoint, meta: Option<&ResponseMetadata>) -> Error {
	TransientError::Endpoint {
		endpoint,
		message: "HTTP client error occurred".into(),
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
	}
	.into()
}

pub(crate) fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

pub(crate) fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}
