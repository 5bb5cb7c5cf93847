//! Generic authorization-code login driver composed from provider hooks.
//!
//! [`LoginFlow`] owns the redirect/exchange/profile sequence. Providers contribute a
//! [`ProviderDescriptor`] plus [`ProviderHooks`] (an authorization-parameter supplier and a
//! profile fetcher); hosts contribute a [`VerifyFn`] that turns the profile into their own user
//! value.

pub mod hooks;
pub mod session;

pub use hooks::*;
pub use session::*;

// self
use crate::{
	_prelude::*,
	auth::IssuedTokens,
	http::ProviderHttpClient,
	oauth::{CodeExchangeFacade, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::{DefaultProviderStrategy, Endpoint, ProviderDescriptor, ProviderStrategy},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Login flow specialized for the crate's default reqwest transport stack.
pub type ReqwestLoginFlow<P, U> = LoginFlow<P, U, ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// OAuth 2.0 client registration forwarded to the provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientRegistration {
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// Client secret for confidential authentication methods.
	pub client_secret: Option<String>,
	/// Callback URL registered with the provider.
	pub redirect_uri: Url,
}
impl Debug for ClientRegistration {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientRegistration")
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("redirect_uri", &self.redirect_uri)
			.finish()
	}
}

/// Drives one provider's authorization-code login.
///
/// The flow is immutable after construction and can be shared behind `Arc` across requests.
/// Each login runs [`LoginFlow::start_authorization`] when redirecting the user and
/// [`LoginFlow::complete`] when the provider redirects back.
pub struct LoginFlow<P, U, C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for the token exchange.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Provider descriptor that defines OAuth endpoints and quirks.
	pub descriptor: ProviderDescriptor,
	/// Strategy used to classify token endpoint failures.
	pub strategy: Arc<dyn ProviderStrategy>,
	/// Client credentials and callback URL.
	pub registration: ClientRegistration,
	/// Provider hooks invoked while building the redirect and after the exchange.
	pub hooks: ProviderHooks<P>,
	verify: VerifyFn<P, U>,
}
impl<P, U, C, M> LoginFlow<P, U, C, M>
where
	P: 'static + Send,
	U: 'static + Send,
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a flow that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		descriptor: ProviderDescriptor,
		registration: ClientRegistration,
		hooks: ProviderHooks<P>,
		verify: VerifyFn<P, U>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			descriptor,
			strategy: Arc::new(DefaultProviderStrategy),
			registration,
			hooks,
			verify,
		}
	}

	/// Replaces the error classification strategy.
	pub fn with_strategy(mut self, strategy: Arc<dyn ProviderStrategy>) -> Self {
		self.strategy = strategy;

		self
	}

	/// Builds the authorize URL, asking the provider hooks for extra query parameters.
	pub fn start_authorization(&self) -> Result<AuthorizationSession> {
		const KIND: FlowKind = FlowKind::AuthorizationCode;

		let _guard = FlowSpan::new(KIND, "start_authorization").entered();

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let params = (self.hooks.authorization_params)();
		let result = build_session(&self.descriptor, &self.registration, &params);

		record_result(KIND, &result);

		result
	}

	/// Exchanges an authorization code for tokens plus provider-specific extra parameters.
	pub async fn exchange_code(
		&self,
		session: &AuthorizationSession,
		code: &str,
	) -> Result<TokenExchange> {
		const KIND: FlowKind = FlowKind::AuthorizationCode;

		let span = FlowSpan::new(KIND, "exchange_code").with_endpoint(Endpoint::Token);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let facade = CodeExchangeFacade::<C, M>::from_descriptor(
					&self.descriptor,
					&self.registration,
					self.http_client.clone(),
					self.transport_mapper.clone(),
				)?;

				facade
					.exchange_authorization_code(
						self.strategy.as_ref(),
						code,
						session.pkce_verifier(),
					)
					.await
			})
			.await;

		record_result(KIND, &result);

		result
	}

	/// Invokes the provider's profile hook for already issued tokens.
	pub async fn fetch_profile(&self, tokens: &IssuedTokens, extra: &ExtraParams) -> Result<P> {
		const KIND: FlowKind = FlowKind::Profile;

		let span = FlowSpan::new(KIND, "fetch_profile");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument((self.hooks.fetch_profile)(tokens.access_token.clone(), extra.clone()))
			.await;

		record_result(KIND, &result);

		result
	}

	/// Finishes a login after the provider redirects back with `state` and `code`.
	///
	/// A `state` mismatch fails before the token endpoint is contacted.
	pub async fn complete(
		&self,
		session: &AuthorizationSession,
		returned_state: &str,
		code: &str,
	) -> Result<U> {
		const KIND: FlowKind = FlowKind::Login;

		let span = FlowSpan::new(KIND, "complete");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				session.validate_state(returned_state)?;

				let TokenExchange { tokens, extra } = self.exchange_code(session, code).await?;
				let profile = self.fetch_profile(&tokens, &extra).await?;

				(self.verify)(VerifyParams { profile, tokens, extra }).await
			})
			.await;

		record_result(KIND, &result);

		result
	}
}
#[cfg(feature = "reqwest")]
impl<P, U> LoginFlow<P, U, ReqwestHttpClient, ReqwestTransportErrorMapper>
where
	P: 'static + Send,
	U: 'static + Send,
{
	/// Creates a flow backed by a default reqwest transport.
	pub fn new(
		descriptor: ProviderDescriptor,
		registration: ClientRegistration,
		hooks: ProviderHooks<P>,
		verify: VerifyFn<P, U>,
	) -> Self {
		Self::with_http_client(
			descriptor,
			registration,
			hooks,
			verify,
			ReqwestHttpClient::default(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}
}
impl<P, U, C, M> Clone for LoginFlow<P, U, C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			descriptor: self.descriptor.clone(),
			strategy: self.strategy.clone(),
			registration: self.registration.clone(),
			hooks: self.hooks.clone(),
			verify: self.verify.clone(),
		}
	}
}
impl<P, U, C, M> Debug for LoginFlow<P, U, C, M>
where
	C: ?Sized + ProviderHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginFlow")
			.field("descriptor", &self.descriptor)
			.field("registration", &self.registration)
			.finish()
	}
}

fn record_result<T>(kind: FlowKind, result: &Result<T>) {
	let outcome = if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure };

	obs::record_flow_outcome(kind, outcome);
}
