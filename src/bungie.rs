//! Bungie.net provider adapter.
//!
//! [`BungieAdapter`] supplies the two hooks the generic [`LoginFlow`] needs: extra authorization
//! parameters (never a `scope`, which Bungie rejects) and a profile fetcher that looks up
//! `User/GetBungieAccount` for the `membership_id` returned by the token endpoint.
//!
//! ```no_run
//! use oauth2_bungie::{
//! 	bungie::{self, BungieConfig, BungieProfile, Prompt},
//! 	flows::{VerifyParams, verify_with},
//! 	url::Url,
//! };
//!
//! # async fn run(code: &str, state: &str) -> oauth2_bungie::error::Result<()> {
//! let config = BungieConfig::new("12345", Url::parse("https://app.example.com/callback").unwrap())
//! 	.with_client_secret("secret")
//! 	.with_api_key("api-key")
//! 	.with_prompt(Prompt::Consent);
//! let flow = bungie::login_flow(
//! 	&config,
//! 	verify_with(|params: VerifyParams<BungieProfile>| async move { Ok(params.profile.display_name) }),
//! )?;
//! let session = flow.start_authorization()?;
//! // Redirect the user to `session.authorize_url`, then on callback:
//! let display_name = flow.complete(&session, state, code).await?;
//! # let _ = display_name;
//! # Ok(())
//! # }
//! ```

mod config;
mod profile;

pub use config::*;
pub use profile::*;

// crates.io
use oauth2::{
	AsyncHttpClient, HttpResponse,
	http::header::{AUTHORIZATION, HeaderName, HeaderValue},
};
// self
use crate::{
	_prelude::*,
	auth::{MembershipId, ProviderId, TokenSecret},
	error::{ConfigError, ProfileError, TransientError},
	flows::{
		AuthorizationParams, ClientRegistration, ExtraParams, FlowFuture, LoginFlow, ProviderHooks,
		VerifyFn,
	},
	http::{self, ProviderHttpClient, ResponseMetadata, ResponseMetadataSlot},
	oauth::{self, TransportErrorMapper},
	obs::{FlowKind, FlowSpan},
	provider::{
		BungieProviderStrategy, ClientAuthMethod, Endpoint, ProviderDescriptor, ProviderErrorContext,
		ProviderErrorKind, ProviderStrategy,
	},
};
#[cfg(feature = "reqwest")]
use crate::{flows::ReqwestLoginFlow, http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

/// Provider tag attached to every [`BungieProfile`].
pub const PROVIDER_NAME: &str = "bungie";
/// Bungie.net authorization endpoint.
pub const AUTHORIZATION_URL: &str = "https://www.bungie.net/en/OAuth/Authorize";
/// Bungie.net token endpoint.
pub const TOKEN_URL: &str = "https://www.bungie.net/platform/app/oauth/token/";
/// Base of the user-info endpoint; the membership id and membership type are appended.
pub const PROFILE_BASE_URL: &str = "https://www.bungie.net/platform/User/GetBungieAccount/";
/// `BungieMembershipType.All`, used as the membership type of the user-info lookup.
pub const MEMBERSHIP_TYPE_ALL: u16 = 254;
/// Header carrying the application API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Token response fields Bungie returns next to the access token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BungieExtraParams {
	/// Access token lifetime in seconds.
	pub expires_in: Option<u64>,
	/// Token type label (always `Bearer`).
	pub token_type: String,
	/// Refresh token lifetime in seconds (confidential clients only).
	pub refresh_expires_in: Option<u64>,
	/// Bungie.net membership of the user who authorized the application.
	pub membership_id: MembershipId,
}
impl TryFrom<&ExtraParams> for BungieExtraParams {
	type Error = ProfileError;

	fn try_from(extra: &ExtraParams) -> Result<Self, Self::Error> {
		let raw = extra.get_text("membership_id").ok_or(ProfileError::MissingMembershipId)?;
		let membership_id = MembershipId::new(&raw)
			.map_err(|e| ProfileError::InvalidMembershipId { reason: e.to_string() })?;

		Ok(Self {
			expires_in: extra.expires_in,
			token_type: extra.token_type.clone(),
			refresh_expires_in: extra.get_u64("refresh_expires_in"),
			membership_id,
		})
	}
}

/// Builds the Bungie.net provider descriptor (fixed endpoints, `client_secret_basic`).
pub fn descriptor() -> Result<ProviderDescriptor> {
	let id = ProviderId::new(PROVIDER_NAME).map_err(ConfigError::from)?;
	let authorization = Url::parse(AUTHORIZATION_URL)
		.map_err(|source| ConfigError::InvalidDescriptor { source })?;
	let token =
		Url::parse(TOKEN_URL).map_err(|source| ConfigError::InvalidDescriptor { source })?;

	ProviderDescriptor::builder(id)
		.authorization_endpoint(authorization)
		.token_endpoint(token)
		.preferred_client_auth_method(ClientAuthMethod::ClientSecretBasic)
		.build()
		.map_err(|e| ConfigError::from(e).into())
}

/// Bungie.net adapter holding provider options and the transport used for profile lookups.
pub struct BungieAdapter<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for profile requests.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Strategy classifying Bungie platform errors.
	pub strategy: Arc<dyn ProviderStrategy>,
	registration: ClientRegistration,
	api_key: Option<String>,
	access_type: AccessType,
	include_granted_scopes: bool,
	prompt: Option<Prompt>,
	profile_base: Option<Url>,
}
impl<C, M> BungieAdapter<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an adapter that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		config: &BungieConfig,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			strategy: Arc::new(BungieProviderStrategy),
			registration: ClientRegistration::from(config),
			api_key: config.api_key.clone(),
			access_type: config.access_type,
			include_granted_scopes: config.include_granted_scopes,
			prompt: config.prompt,
			profile_base: None,
		}
	}

	/// Points profile lookups at another base URL (the membership path is appended to it).
	pub fn with_profile_base(mut self, base: Url) -> Self {
		self.profile_base = Some(base);

		self
	}

	/// Access type stored for this adapter.
	pub fn access_type(&self) -> AccessType {
		self.access_type
	}

	/// Prompt mode stored for this adapter.
	pub fn prompt(&self) -> Option<Prompt> {
		self.prompt
	}

	/// Scope-grant flag stored for this adapter.
	pub fn include_granted_scopes(&self) -> bool {
		self.include_granted_scopes
	}

	/// API key sent with profile requests, if any.
	pub fn api_key(&self) -> Option<&str> {
		self.api_key.as_deref()
	}

	/// Client registration forwarded to the flow driver.
	pub fn registration(&self) -> &ClientRegistration {
		&self.registration
	}

	/// Extra query parameters for the authorization redirect.
	///
	/// Bungie rejects authorization requests that carry a `scope`, so none is emitted; `prompt`
	/// is forwarded verbatim when configured.
	pub fn authorization_params(&self) -> AuthorizationParams {
		let mut params = AuthorizationParams::new();

		if let Some(prompt) = self.prompt {
			params.set("prompt", prompt.as_str());
		}

		params
	}

	/// Builds the `User/GetBungieAccount/{membership_id}/254/` URL.
	pub fn user_info_url(&self, membership_id: &MembershipId) -> Result<Url> {
		let mut base = match &self.profile_base {
			Some(base) => base.clone(),
			None => Url::parse(PROFILE_BASE_URL)
				.map_err(|source| ConfigError::InvalidProfileUrl { source })?,
		};

		base.path_segments_mut()
			.map_err(|_| ConfigError::InvalidProfileUrl {
				source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
			})?
			.pop_if_empty()
			.push(membership_id)
			.push(&MEMBERSHIP_TYPE_ALL.to_string())
			.push("");

		Ok(base)
	}

	/// Fetches and normalizes the profile of the user the access token belongs to.
	///
	/// The membership is taken from the token response's `membership_id`; the request carries
	/// the bearer token and, when configured, the `X-API-Key` header.
	pub fn fetch_profile<'a>(
		&'a self,
		access_token: &'a TokenSecret,
		extra: &'a ExtraParams,
	) -> FlowFuture<'a, BungieProfile> {
		let meta = ResponseMetadataSlot::default();
		let span = FlowSpan::new(FlowKind::Profile, "profile_request").with_endpoint(Endpoint::Profile);

		Box::pin(span.instrument(async move {
			let extra = BungieExtraParams::try_from(extra)?;
			let url = self.user_info_url(&extra.membership_id)?;
			let request = http::json_get_request(&url, self.profile_headers(access_token)?)?;
			let handle = self.http_client.with_metadata(meta.clone());
			let response = handle.call(request).await.map_err(|err| {
				self.transport_mapper.map_transport_error(
					self.strategy.as_ref(),
					Endpoint::Profile,
					meta.take().as_ref(),
					err,
				)
			})?;
			let meta = meta.take().or_else(|| {
				Some(ResponseMetadata { status: Some(response.status().as_u16()), retry_after: None })
			});

			decode_profile(self.strategy.as_ref(), &response, meta.as_ref())
		}))
	}

	/// Packages [`Self::authorization_params`] and [`Self::fetch_profile`] as flow hooks.
	pub fn hooks(self: &Arc<Self>) -> ProviderHooks<BungieProfile> {
		let params_adapter = Arc::clone(self);
		let profile_adapter = Arc::clone(self);

		ProviderHooks {
			authorization_params: Arc::new(move || params_adapter.authorization_params()),
			fetch_profile: Arc::new(
				move |token: TokenSecret, extra: ExtraParams| -> FlowFuture<'static, BungieProfile> {
					let adapter = Arc::clone(&profile_adapter);

					Box::pin(async move { adapter.fetch_profile(&token, &extra).await })
				},
			),
		}
	}

	/// Builds a login flow that forwards this adapter's registration and hooks.
	pub fn login_flow<U>(
		self: &Arc<Self>,
		verify: VerifyFn<BungieProfile, U>,
	) -> Result<LoginFlow<BungieProfile, U, C, M>>
	where
		U: 'static + Send,
	{
		Ok(LoginFlow::<BungieProfile, U, C, M>::with_http_client(
			descriptor()?,
			self.registration.clone(),
			self.hooks(),
			verify,
			self.http_client.clone(),
			self.transport_mapper.clone(),
		)
		.with_strategy(self.strategy.clone()))
	}

	fn profile_headers(
		&self,
		access_token: &TokenSecret,
	) -> Result<Vec<(HeaderName, HeaderValue)>> {
		let bearer = HeaderValue::from_str(&access_token.bearer_header()).map_err(|_| {
			Error::InvalidGrant { reason: "access token is not a valid header value".into() }
		})?;
		let mut headers = vec![(AUTHORIZATION, bearer)];

		if let Some(api_key) = &self.api_key {
			let value = HeaderValue::from_str(api_key).map_err(|_| ConfigError::InvalidApiKey)?;

			headers.push((HeaderName::from_static(API_KEY_HEADER), value));
		}

		Ok(headers)
	}
}
#[cfg(feature = "reqwest")]
impl BungieAdapter<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates an adapter backed by a default reqwest transport.
	pub fn new(config: &BungieConfig) -> Self {
		Self::with_http_client(
			config,
			ReqwestHttpClient::default(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}
}
impl<C, M> Debug for BungieAdapter<C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BungieAdapter")
			.field("registration", &self.registration)
			.field("api_key_set", &self.api_key.is_some())
			.field("access_type", &self.access_type)
			.field("include_granted_scopes", &self.include_granted_scopes)
			.field("prompt", &self.prompt)
			.field("profile_base", &self.profile_base)
			.finish()
	}
}

/// Wires a reqwest-backed [`LoginFlow`] for `config`, with `verify` as the host callback.
#[cfg(feature = "reqwest")]
pub fn login_flow<U>(
	config: &BungieConfig,
	verify: VerifyFn<BungieProfile, U>,
) -> Result<ReqwestLoginFlow<BungieProfile, U>>
where
	U: 'static + Send,
{
	Arc::new(BungieAdapter::new(config)).login_flow(verify)
}

fn decode_profile(
	strategy: &dyn ProviderStrategy,
	response: &HttpResponse,
	meta: Option<&ResponseMetadata>,
) -> Result<BungieProfile> {
	let status = response.status().as_u16();
	let body = response.body();
	let platform = match decode_json::<PlatformStatus>(body) {
		Ok(platform) => platform,
		Err(source) if response.status().is_success() =>
			return Err(ProfileError::MalformedResponse { source, status: Some(status) }.into()),
		Err(_) => return Err(unexpected_status(strategy, status, body, meta)),
	};

	if !platform.is_success() {
		return Err(platform_error(strategy, status, platform, meta));
	}

	let envelope = decode_json::<AccountEnvelope>(body)
		.map_err(|source| ProfileError::MalformedResponse { source, status: Some(status) })?;

	Ok(BungieProfile::from_account(envelope.response))
}

fn decode_json<T>(body: &[u8]) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
where
	T: for<'de> Deserialize<'de>,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
}

fn platform_error(
	strategy: &dyn ProviderStrategy,
	status: u16,
	platform: PlatformStatus,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let ctx = ProviderErrorContext::new(Endpoint::Profile)
		.with_http_status(status)
		.with_oauth_error(platform.error_status.clone())
		.with_error_description(platform.message.clone());
	let retry_after = platform.throttle().or_else(|| oauth::meta_retry_after(meta));

	match strategy.classify_error(&ctx) {
		ProviderErrorKind::Upstream => ProfileError::Platform {
			code: platform.error_code,
			status: platform.error_status,
			message: platform.message,
		}
		.into(),
		ProviderErrorKind::Transient => TransientError::Endpoint {
			endpoint: Endpoint::Profile,
			message: format!("{}: {}", platform.error_status, platform.message),
			status: Some(status),
			retry_after,
		}
		.into(),
		kind => oauth::classified_error(
			kind,
			Endpoint::Profile,
			format!("{}: {}", platform.error_status, platform.message),
			meta,
		),
	}
}

fn unexpected_status(
	strategy: &dyn ProviderStrategy,
	status: u16,
	body: &[u8],
	meta: Option<&ResponseMetadata>,
) -> Error {
	let ctx = ProviderErrorContext::new(Endpoint::Profile)
		.with_http_status(status)
		.with_body_preview(String::from_utf8_lossy(body));

	match strategy.classify_error(&ctx) {
		ProviderErrorKind::Transient => TransientError::Endpoint {
			endpoint: Endpoint::Profile,
			message: format!("profile endpoint returned HTTP {status}"),
			status: Some(status),
			retry_after: oauth::meta_retry_after(meta),
		}
		.into(),
		_ => ProfileError::UnexpectedStatus { status, body_preview: ctx.body_preview }.into(),
	}
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// crates.io
	use serde_json::Value;
	// self
	use super::*;

	fn config() -> BungieConfig {
		BungieConfig::new(
			"12345",
			Url::parse("https://app.example.com/auth/bungie/callback")
				.expect("Callback URL fixture should parse successfully."),
		)
	}

	fn extra(fields: &[(&str, Value)]) -> ExtraParams {
		ExtraParams {
			expires_in: Some(3600),
			token_type: "Bearer".into(),
			fields: fields.iter().map(|(key, value)| ((*key).to_owned(), value.clone())).collect(),
		}
	}

	#[test]
	fn authorization_params_are_empty_without_prompt() {
		let adapter = BungieAdapter::new(&config());

		assert!(adapter.authorization_params().is_empty());
	}

	#[test]
	fn authorization_params_forward_prompt_only() {
		for prompt in [Prompt::None, Prompt::Consent, Prompt::SelectAccount] {
			let adapter = BungieAdapter::new(&config().with_prompt(prompt));
			let params = adapter.authorization_params();

			assert_eq!(params, AuthorizationParams::new().with("prompt", prompt.as_str()));
			assert!(!params.contains("scope"), "Bungie rejects a scope parameter.");
		}
	}

	#[test]
	fn options_are_stored_with_defaults() {
		let adapter = BungieAdapter::new(&config());

		assert_eq!(adapter.access_type(), AccessType::Online);
		assert!(!adapter.include_granted_scopes());
		assert_eq!(adapter.api_key(), None);
		assert_eq!(adapter.prompt(), None);

		let adapter = BungieAdapter::new(
			&config()
				.with_access_type(AccessType::Offline)
				.with_include_granted_scopes(true)
				.with_api_key("key"),
		);

		assert_eq!(adapter.access_type(), AccessType::Offline);
		assert!(adapter.include_granted_scopes());
		assert_eq!(adapter.api_key(), Some("key"));
	}

	#[test]
	fn user_info_url_uses_membership_id() {
		let adapter = BungieAdapter::new(&config());
		let membership = MembershipId::new("12345").expect("Membership fixture should be valid.");
		let url = adapter.user_info_url(&membership).expect("Profile URL should build.");

		assert_eq!(url.as_str(), "https://www.bungie.net/platform/User/GetBungieAccount/12345/254/");

		let adapter = adapter.with_profile_base(
			Url::parse("https://127.0.0.1:8443/mock").expect("Base URL fixture should parse."),
		);
		let url = adapter.user_info_url(&membership).expect("Profile URL should build.");

		assert_eq!(url.as_str(), "https://127.0.0.1:8443/mock/12345/254/");
	}

	#[test]
	fn hostile_membership_ids_never_reach_the_profile_url() {
		for raw in ["http:evil.example.com", "http:x", "..", ".", "abc"] {
			let err = BungieExtraParams::try_from(&extra(&[("membership_id", Value::from(raw))]))
				.expect_err("Non-numeric membership ids must be rejected.");

			assert!(matches!(err, ProfileError::InvalidMembershipId { .. }), "`{raw}` slipped through.");
		}

		let adapter = BungieAdapter::new(&config());
		let membership =
			MembershipId::new("4611686018467284386").expect("Membership fixture should be valid.");
		let url = adapter.user_info_url(&membership).expect("Profile URL should build.");

		assert_eq!(url.host_str(), Some("www.bungie.net"));
		assert_eq!(url.path(), "/platform/User/GetBungieAccount/4611686018467284386/254/");
	}

	#[test]
	fn extra_params_require_membership_id() {
		let err = BungieExtraParams::try_from(&extra(&[]))
			.expect_err("Missing membership_id must fail.");

		assert!(matches!(err, ProfileError::MissingMembershipId));

		let err = BungieExtraParams::try_from(&extra(&[("membership_id", Value::from("1/../2"))]))
			.expect_err("Path characters must be rejected.");

		assert!(matches!(err, ProfileError::InvalidMembershipId { .. }));

		let parsed = BungieExtraParams::try_from(&extra(&[
			("membership_id", Value::from("12345")),
			("refresh_expires_in", Value::from(7_776_000_u64)),
		]))
		.expect("Bungie extra params should decode.");

		assert_eq!(parsed.membership_id.as_ref(), "12345");
		assert_eq!(parsed.refresh_expires_in, Some(7_776_000));
		assert_eq!(parsed.expires_in, Some(3600));
		assert_eq!(parsed.token_type, "Bearer");
	}

	#[test]
	fn api_key_header_only_when_configured() {
		let token = TokenSecret::new("access");
		let headers = BungieAdapter::new(&config())
			.profile_headers(&token)
			.expect("Headers should build.");

		assert_eq!(headers.len(), 1);
		assert_eq!(headers[0].0, AUTHORIZATION);
		assert_eq!(headers[0].1, "Bearer access");

		let headers = BungieAdapter::new(&config().with_api_key("key-123"))
			.profile_headers(&token)
			.expect("Headers should build.");

		assert_eq!(headers.len(), 2);
		assert_eq!(headers[1].0.as_str(), "x-api-key");
		assert_eq!(headers[1].1, "key-123");

		let err = BungieAdapter::new(&config().with_api_key("bad\nkey"))
			.profile_headers(&token)
			.expect_err("Header-unsafe API keys must be rejected.");

		assert!(matches!(err, Error::Config(ConfigError::InvalidApiKey)));
	}

	#[test]
	fn descriptor_uses_fixed_endpoints() {
		let descriptor = descriptor().expect("Bungie descriptor should build.");

		assert_eq!(descriptor.endpoints.authorization.as_str(), AUTHORIZATION_URL);
		assert_eq!(descriptor.endpoints.token.as_str(), TOKEN_URL);
		assert_eq!(descriptor.preferred_client_auth_method, ClientAuthMethod::ClientSecretBasic);
		assert!(!descriptor.requires_pkce());
	}

	#[test]
	fn login_flow_forwards_registration() {
		let config = config().with_client_secret("secret").with_prompt(Prompt::Consent);
		let flow = login_flow(
			&config,
			crate::flows::verify_with(|params: crate::flows::VerifyParams<BungieProfile>| async move {
				Ok(params.profile.membership_id)
			}),
		)
		.expect("Login flow should build.");
		let session = flow.start_authorization().expect("Authorization should start.");
		let query = session.authorize_url.query_pairs().into_owned().collect::<BTreeMap<_, _>>();

		assert!(session.authorize_url.as_str().starts_with(AUTHORIZATION_URL));
		assert_eq!(query.get("client_id").map(String::as_str), Some("12345"));
		assert_eq!(query.get("prompt").map(String::as_str), Some("consent"));
		assert!(!query.contains_key("scope"));
		assert_eq!(flow.registration.client_secret.as_deref(), Some("secret"));
	}
}
