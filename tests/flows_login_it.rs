#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use oauth2_bungie::{
	_preludet::*,
	bungie::{BungieConfig, BungieProfile, Prompt},
	error::ProfileError,
	flows::{VerifyParams, verify_with},
};

const CLIENT_ID: &str = "12345";
const CLIENT_SECRET: &str = "secret-it";
const ACCOUNT_FIXTURE: &str = include_str!("fixtures/get_bungie_account.json");

#[derive(Debug, PartialEq, Eq)]
struct HostUser {
	membership_id: String,
	display_name: String,
	access_token: String,
	membership_from_token: Option<String>,
}

#[derive(Debug)]
struct Banned;
impl Display for Banned {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("account banned")
	}
}
impl StdError for Banned {}

fn config() -> BungieConfig {
	BungieConfig::new(
		CLIENT_ID,
		Url::parse("https://app.example.com/auth/bungie/callback")
			.expect("Callback URL should parse successfully."),
	)
	.with_client_secret(CLIENT_SECRET)
	.with_api_key("api-key-it")
	.with_prompt(Prompt::Consent)
}

fn host_flow(server: &MockServer) -> ReqwestTestLoginFlow<HostUser> {
	let descriptor = build_mock_descriptor(
		Url::parse(&server.url("/en/OAuth/Authorize"))
			.expect("Mock authorization endpoint should parse successfully."),
		Url::parse(&server.url("/platform/app/oauth/token/"))
			.expect("Mock token endpoint should parse successfully."),
	);
	let profile_base = Url::parse(&server.url("/platform/User/GetBungieAccount/"))
		.expect("Mock profile base should parse successfully.");

	build_reqwest_test_login_flow(
		&config(),
		descriptor,
		profile_base,
		verify_with(|params: VerifyParams<BungieProfile>| async move {
			Ok(HostUser {
				membership_id: params.profile.membership_id,
				display_name: params.profile.display_name,
				access_token: params.tokens.access_token.expose().to_owned(),
				membership_from_token: params.extra.get_text("membership_id"),
			})
		}),
	)
}

fn token_body(membership_id: Option<&str>) -> String {
	let mut body = json!({
		"access_token": "access-it",
		"token_type": "Bearer",
		"expires_in": 3600,
		"refresh_token": "refresh-it",
		"refresh_expires_in": 7776000
	});

	if let Some(membership_id) = membership_id {
		body["membership_id"] = json!(membership_id);
	}

	body.to_string()
}

#[tokio::test]
async fn login_completes_through_verify_callback() {
	let server = MockServer::start_async().await;
	let flow = host_flow(&server);
	let session = flow.start_authorization().expect("Authorization session should start successfully.");
	let authorize_pairs: BTreeMap<_, _> = session.authorize_url.query_pairs().into_owned().collect();

	assert_eq!(authorize_pairs.get("response_type"), Some(&"code".into()));
	assert_eq!(authorize_pairs.get("client_id"), Some(&CLIENT_ID.into()));
	assert_eq!(authorize_pairs.get("prompt"), Some(&"consent".into()));
	assert_eq!(authorize_pairs.get("state"), Some(&session.state));
	assert!(!authorize_pairs.contains_key("scope"), "Bungie rejects a scope parameter.");

	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/platform/app/oauth/token/")
				.header("content-type", "application/x-www-form-urlencoded")
				.form_urlencoded_tuple("grant_type", "authorization_code")
				.form_urlencoded_tuple("code", "valid-code")
				.form_urlencoded_tuple("client_id", CLIENT_ID)
				.form_urlencoded_tuple("client_secret", CLIENT_SECRET);
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body(Some("20236149")));
		})
		.await;
	let profile_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/platform/User/GetBungieAccount/20236149/254/")
				.header("authorization", "Bearer access-it")
				.header("x-api-key", "api-key-it");
			then.status(200).header("content-type", "application/json").body(ACCOUNT_FIXTURE);
		})
		.await;
	let state = session.state.clone();
	let user = flow
		.complete(&session, &state, "valid-code")
		.await
		.expect("Login should complete successfully.");

	token_mock.assert_calls_async(1).await;
	profile_mock.assert_calls_async(1).await;

	assert_eq!(
		user,
		HostUser {
			membership_id: "20236149".into(),
			display_name: "Guardian".into(),
			access_token: "access-it".into(),
			membership_from_token: Some("20236149".into()),
		}
	);
}

#[tokio::test]
async fn exchange_exposes_tokens_and_extra_params() {
	let server = MockServer::start_async().await;
	let flow = host_flow(&server);
	let session = flow.start_authorization().expect("Authorization session should start successfully.");
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/platform/app/oauth/token/");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body(Some("20236149")));
		})
		.await;
	let exchange =
		flow.exchange_code(&session, "valid-code").await.expect("Code exchange should succeed.");

	token_mock.assert_calls_async(1).await;

	assert_eq!(exchange.tokens.access_token.expose(), "access-it");
	assert_eq!(exchange.tokens.refresh_token.as_ref().map(|secret| secret.expose()), Some("refresh-it"));
	assert_eq!(exchange.tokens.token_type, "Bearer");
	assert!(exchange.tokens.refresh_expires_at > exchange.tokens.expires_at);
	assert_eq!(exchange.extra.expires_in, Some(3600));
	assert_eq!(exchange.extra.get_str("membership_id"), Some("20236149"));
}

#[tokio::test]
async fn state_mismatch_never_contacts_token_endpoint() {
	let server = MockServer::start_async().await;
	let flow = host_flow(&server);
	let session = flow.start_authorization().expect("Authorization session should start successfully.");
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/platform/app/oauth/token/");
			then.status(200).header("content-type", "application/json").body(token_body(Some("1")));
		})
		.await;
	let err = flow
		.complete(&session, "forged-state", "valid-code")
		.await
		.expect_err("Forged state must be rejected.");

	assert!(matches!(err, Error::InvalidGrant { .. }));

	token_mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn invalid_code_is_classified_as_invalid_grant() {
	let server = MockServer::start_async().await;
	let flow = host_flow(&server);
	let session = flow.start_authorization().expect("Authorization session should start successfully.");

	server
		.mock_async(|when, then| {
			when.method(POST).path("/platform/app/oauth/token/");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"AuthorizationCodeInvalid\"}");
		})
		.await;

	let state = session.state.clone();
	let err = flow
		.complete(&session, &state, "stale-code")
		.await
		.expect_err("Stale codes must be rejected.");

	assert!(matches!(err, Error::InvalidGrant { .. }), "Unexpected error: {err:?}.");
}

#[tokio::test]
async fn token_without_membership_id_fails_before_profile_lookup() {
	let server = MockServer::start_async().await;
	let flow = host_flow(&server);
	let session = flow.start_authorization().expect("Authorization session should start successfully.");

	server
		.mock_async(|when, then| {
			when.method(POST).path("/platform/app/oauth/token/");
			then.status(200).header("content-type", "application/json").body(token_body(None));
		})
		.await;

	let profile_mock = server
		.mock_async(|when, then| {
			when.method(GET);
			then.status(200).body(ACCOUNT_FIXTURE);
		})
		.await;
	let state = session.state.clone();
	let err = flow
		.complete(&session, &state, "valid-code")
		.await
		.expect_err("Missing membership_id must fail.");

	assert!(matches!(err, Error::Profile(ProfileError::MissingMembershipId)));

	profile_mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn verify_rejection_is_propagated() {
	let server = MockServer::start_async().await;
	let descriptor = build_mock_descriptor(
		Url::parse(&server.url("/en/OAuth/Authorize"))
			.expect("Mock authorization endpoint should parse successfully."),
		Url::parse(&server.url("/platform/app/oauth/token/"))
			.expect("Mock token endpoint should parse successfully."),
	);
	let flow: ReqwestTestLoginFlow<()> = build_reqwest_test_login_flow(
		&config(),
		descriptor,
		Url::parse(&server.url("/platform/User/GetBungieAccount/"))
			.expect("Mock profile base should parse successfully."),
		verify_with(|_: VerifyParams<BungieProfile>| async move { Err(Error::verification(Banned)) }),
	);
	let session = flow.start_authorization().expect("Authorization session should start successfully.");

	server
		.mock_async(|when, then| {
			when.method(POST).path("/platform/app/oauth/token/");
			then.status(200)
				.header("content-type", "application/json")
				.body(token_body(Some("20236149")));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/platform/User/GetBungieAccount/20236149/254/");
			then.status(200).header("content-type", "application/json").body(ACCOUNT_FIXTURE);
		})
		.await;

	let state = session.state.clone();
	let err = flow
		.complete(&session, &state, "valid-code")
		.await
		.expect_err("Verification failures must reach the caller.");

	assert!(matches!(err, Error::Verification { .. }));
	assert_eq!(err.source().map(ToString::to_string).as_deref(), Some("account banned"));
}
