//! Authorization redirect state: anti-forgery `state`, optional PKCE pair, and the authorize URL.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	flows::{AuthorizationParams, ClientRegistration},
	provider::ProviderDescriptor,
};

const STATE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;

/// Query parameters the flow driver writes itself; hooks may not supply them.
pub const RESERVED_AUTHORIZATION_PARAMS: [&str; 7] = [
	"response_type",
	"client_id",
	"redirect_uri",
	"scope",
	"state",
	"code_challenge",
	"code_challenge_method",
];

/// Supported PKCE challenge methods surfaced via [`AuthorizationSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Redirect metadata returned by [`LoginFlow::start_authorization`](crate::flows::LoginFlow::start_authorization).
///
/// Persist it (server-side session, encrypted cookie) until the provider redirects back.
#[derive(Clone)]
pub struct AuthorizationSession {
	/// Opaque state value that must round-trip via the redirect handler.
	pub state: String,
	/// Redirect URI supplied when constructing the authorize URL.
	pub redirect_uri: Url,
	/// Fully-formed HTTPS authorize URL that callers should send end-users to.
	pub authorize_url: Url,
	pkce: Option<PkcePair>,
}
impl AuthorizationSession {
	/// PKCE code challenge, when the provider requires one.
	pub fn code_challenge(&self) -> Option<&str> {
		self.pkce.as_ref().map(|pkce| pkce.challenge.as_str())
	}

	/// PKCE challenge method, when the provider requires one.
	pub fn code_challenge_method(&self) -> Option<PkceCodeChallengeMethod> {
		self.pkce.as_ref().map(|pkce| pkce.method)
	}

	/// Validates the returned `state` parameter after the authorization redirect.
	pub fn validate_state(&self, returned_state: &str) -> Result<()> {
		if returned_state == self.state {
			Ok(())
		} else {
			Err(Error::InvalidGrant { reason: "Authorization state mismatch".into() })
		}
	}

	pub(crate) fn pkce_verifier(&self) -> Option<&str> {
		self.pkce.as_ref().map(|pkce| pkce.verifier.as_str())
	}
}
impl Debug for AuthorizationSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationSession")
			.field("state", &self.state)
			.field("redirect_uri", &self.redirect_uri)
			.field("authorize_url", &self.authorize_url)
			.field("code_challenge", &self.code_challenge())
			.field("code_challenge_method", &self.code_challenge_method())
			.finish()
	}
}

#[derive(Clone)]
struct PkcePair {
	verifier: String,
	challenge: String,
	method: PkceCodeChallengeMethod,
}
impl PkcePair {
	fn generate() -> Self {
		let verifier = random_string(PKCE_VERIFIER_LEN);
		let challenge = compute_pkce_challenge(&verifier);

		Self { verifier, challenge, method: PkceCodeChallengeMethod::S256 }
	}
}

pub(crate) fn build_session(
	descriptor: &ProviderDescriptor,
	registration: &ClientRegistration,
	params: &AuthorizationParams,
) -> Result<AuthorizationSession> {
	if let Some((name, _)) =
		params.iter().find(|(name, _)| RESERVED_AUTHORIZATION_PARAMS.contains(name))
	{
		return Err(ConfigError::ReservedAuthorizationParam { name: name.to_owned() }.into());
	}

	let state = random_string(STATE_LEN);
	let pkce = descriptor.requires_pkce().then(PkcePair::generate);
	let authorize_url = build_authorize_url(descriptor, registration, params, &state, pkce.as_ref());

	Ok(AuthorizationSession {
		state,
		redirect_uri: registration.redirect_uri.clone(),
		authorize_url,
		pkce,
	})
}

fn build_authorize_url(
	descriptor: &ProviderDescriptor,
	registration: &ClientRegistration,
	params: &AuthorizationParams,
	state: &str,
	pkce: Option<&PkcePair>,
) -> Url {
	let mut url = descriptor.endpoints.authorization.clone();
	let mut pairs = url.query_pairs_mut();

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", &registration.client_id);
	pairs.append_pair("redirect_uri", registration.redirect_uri.as_str());

	for (key, value) in params.iter() {
		pairs.append_pair(key, value);
	}

	pairs.append_pair("state", state);

	if let Some(pkce) = pkce {
		pairs.append_pair("code_challenge", &pkce.challenge);
		pairs.append_pair("code_challenge_method", pkce.method.as_str());
	}

	drop(pairs);

	url
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

fn compute_pkce_challenge(verifier: &str) -> String {
	let mut hasher = Sha256::new();

	hasher.update(verifier.as_bytes());

	URL_SAFE_NO_PAD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{auth::ProviderId, provider::ProviderQuirks};

	fn descriptor(pkce_required: bool) -> ProviderDescriptor {
		ProviderDescriptor::builder(
			ProviderId::new("session-test").expect("Provider identifier fixture should be valid."),
		)
		.authorization_endpoint(
			Url::parse("https://example.com/en/OAuth/Authorize")
				.expect("Authorization URL fixture should parse successfully."),
		)
		.token_endpoint(
			Url::parse("https://example.com/platform/app/oauth/token/")
				.expect("Token URL fixture should parse successfully."),
		)
		.quirks(ProviderQuirks { pkce_required })
		.build()
		.expect("Descriptor fixture should build.")
	}

	fn registration() -> ClientRegistration {
		ClientRegistration {
			client_id: "12345".into(),
			client_secret: Some("secret".into()),
			redirect_uri: Url::parse("https://app.example.com/auth/bungie/callback")
				.expect("Redirect URL fixture should parse successfully."),
		}
	}

	fn query(url: &Url) -> BTreeMap<String, String> {
		url.query_pairs().into_owned().collect()
	}

	#[test]
	fn authorize_url_carries_hook_params_without_scope() {
		let params = AuthorizationParams::new().with("prompt", "consent");
		let session = build_session(&descriptor(false), &registration(), &params)
			.expect("Session should build.");
		let query = query(&session.authorize_url);

		assert_eq!(query.get("response_type").map(String::as_str), Some("code"));
		assert_eq!(query.get("client_id").map(String::as_str), Some("12345"));
		assert_eq!(
			query.get("redirect_uri").map(String::as_str),
			Some("https://app.example.com/auth/bungie/callback")
		);
		assert_eq!(query.get("prompt").map(String::as_str), Some("consent"));
		assert_eq!(query.get("state"), Some(&session.state));
		assert_eq!(session.state.len(), STATE_LEN);
		assert!(!query.contains_key("scope"), "Authorize URL must not carry a scope parameter.");
		assert!(!query.contains_key("code_challenge"));
		assert!(session.code_challenge().is_none());
	}

	#[test]
	fn pkce_is_added_when_required() {
		let session = build_session(&descriptor(true), &registration(), &AuthorizationParams::new())
			.expect("Session should build.");
		let query = query(&session.authorize_url);
		let verifier = session.pkce_verifier().expect("PKCE verifier should be generated.");

		assert_eq!(query.get("code_challenge_method").map(String::as_str), Some("S256"));
		assert_eq!(query.get("code_challenge").map(String::as_str), session.code_challenge());
		assert_eq!(session.code_challenge(), Some(compute_pkce_challenge(verifier).as_str()));
	}

	#[test]
	fn reserved_params_are_rejected() {
		for name in RESERVED_AUTHORIZATION_PARAMS {
			let params = AuthorizationParams::new().with(name, "override");
			let err = build_session(&descriptor(false), &registration(), &params)
				.expect_err("Reserved parameters must be rejected.");

			assert!(
				matches!(
					&err,
					Error::Config(ConfigError::ReservedAuthorizationParam { name: rejected })
						if rejected == name
				),
				"Unexpected error for {name}: {err:?}."
			);
		}
	}

	#[test]
	fn state_validation_errors_on_mismatch() {
		let session = build_session(&descriptor(false), &registration(), &AuthorizationParams::new())
			.expect("Session should build.");
		let state = session.state.clone();

		assert!(session.validate_state(&state).is_ok());

		let err = session.validate_state("other").expect_err("State mismatch should fail.");

		assert!(matches!(err, Error::InvalidGrant { .. }));
	}
}
