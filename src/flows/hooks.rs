//! Function values a provider plugs into [`LoginFlow`](crate::flows::LoginFlow).
//!
//! A provider contributes two hooks: an authorization-parameter supplier invoked while the
//! authorize URL is built, and a profile fetcher invoked after the code exchange. The host
//! contributes the verification callback that turns a profile into its own user record.

// crates.io
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	auth::{IssuedTokens, TokenSecret},
};

/// Boxed, sendable future returned by hooks and callbacks.
pub type FlowFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;
/// Supplies extra query parameters for the authorization redirect.
pub type AuthorizationParamsFn = Arc<dyn Fn() -> AuthorizationParams + Send + Sync>;
/// Fetches the normalized profile for a freshly issued access token.
pub type ProfileFetchFn<P> =
	Arc<dyn Fn(TokenSecret, ExtraParams) -> FlowFuture<'static, P> + Send + Sync>;
/// Host callback that converts an authenticated profile into the application's user value.
pub type VerifyFn<P, U> = Arc<dyn Fn(VerifyParams<P>) -> FlowFuture<'static, U> + Send + Sync>;

/// Extra query parameters attached to the authorization redirect.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorizationParams(BTreeMap<String, String>);
impl AuthorizationParams {
	/// Creates an empty parameter set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts or replaces a parameter, returning the previous value.
	pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
		self.0.insert(key.into(), value.into())
	}

	/// Builder-style variant of [`AuthorizationParams::set`].
	pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.set(key, value);

		self
	}

	/// Returns the value for `key`, if present.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.get(key).map(String::as_str)
	}

	/// Returns true when `key` is present.
	pub fn contains(&self, key: &str) -> bool {
		self.0.contains_key(key)
	}

	/// Number of parameters.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true when no parameters are set.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Iterates parameters in key order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
	}
}
impl<K, V> FromIterator<(K, V)> for AuthorizationParams
where
	K: Into<String>,
	V: Into<String>,
{
	fn from_iter<I>(iter: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
	{
		Self(iter.into_iter().map(|(key, value)| (key.into(), value.into())).collect())
	}
}

/// Token response fields beyond the access and refresh tokens, handed to the profile fetcher.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraParams {
	/// `expires_in` seconds, when reported.
	pub expires_in: Option<u64>,
	/// Token type label (`Bearer` for Bungie).
	pub token_type: String,
	/// Provider-specific members such as `membership_id` and `refresh_expires_in`.
	pub fields: Map<String, Value>,
}
impl ExtraParams {
	/// Returns the raw JSON value stored under `key`.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.fields.get(key)
	}

	/// Returns the value under `key` when it is a JSON string.
	pub fn get_str(&self, key: &str) -> Option<&str> {
		self.fields.get(key).and_then(Value::as_str)
	}

	/// Returns the value under `key` when it is a non-negative integer.
	pub fn get_u64(&self, key: &str) -> Option<u64> {
		self.fields.get(key).and_then(Value::as_u64)
	}

	/// Returns the value under `key` as text, accepting JSON strings and numbers.
	///
	/// Providers disagree on whether 64-bit identifiers are encoded as strings or numbers.
	pub fn get_text(&self, key: &str) -> Option<String> {
		match self.fields.get(key)? {
			Value::String(value) => Some(value.clone()),
			Value::Number(value) => Some(value.to_string()),
			_ => None,
		}
	}
}

/// Result of a successful authorization-code exchange.
#[derive(Clone, Debug)]
pub struct TokenExchange {
	/// Issued access (and refresh) tokens.
	pub tokens: IssuedTokens,
	/// Remaining token response fields.
	pub extra: ExtraParams,
}

/// Input handed to the host verification callback.
#[derive(Clone, Debug)]
pub struct VerifyParams<P> {
	/// Normalized provider profile.
	pub profile: P,
	/// Tokens issued during the exchange.
	pub tokens: IssuedTokens,
	/// Provider-specific token response fields.
	pub extra: ExtraParams,
}

/// Provider hooks consumed by [`LoginFlow`](crate::flows::LoginFlow).
pub struct ProviderHooks<P> {
	/// Authorization-parameter supplier.
	pub authorization_params: AuthorizationParamsFn,
	/// Profile fetcher.
	pub fetch_profile: ProfileFetchFn<P>,
}
impl<P> ProviderHooks<P>
where
	P: 'static,
{
	/// Wraps a parameter supplier and an async profile fetcher.
	pub fn new<A, F, Fut>(authorization_params: A, fetch_profile: F) -> Self
	where
		A: 'static + Send + Sync + Fn() -> AuthorizationParams,
		F: 'static + Send + Sync + Fn(TokenSecret, ExtraParams) -> Fut,
		Fut: 'static + Send + Future<Output = Result<P>>,
	{
		let fetch_profile = move |token: TokenSecret, extra: ExtraParams| -> FlowFuture<'static, P> {
			Box::pin(fetch_profile(token, extra))
		};

		Self { authorization_params: Arc::new(authorization_params), fetch_profile: Arc::new(fetch_profile) }
	}
}
impl<P> Clone for ProviderHooks<P> {
	fn clone(&self) -> Self {
		Self {
			authorization_params: self.authorization_params.clone(),
			fetch_profile: self.fetch_profile.clone(),
		}
	}
}
impl<P> Debug for ProviderHooks<P> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ProviderHooks(..)")
	}
}

/// Wraps an async closure as a [`VerifyFn`].
pub fn verify_with<P, U, F, Fut>(verify: F) -> VerifyFn<P, U>
where
	P: 'static,
	U: 'static,
	F: 'static + Send + Sync + Fn(VerifyParams<P>) -> Fut,
	Fut: 'static + Send + Future<Output = Result<U>>,
{
	Arc::new(move |params: VerifyParams<P>| -> FlowFuture<'static, U> { Box::pin(verify(params)) })
}
