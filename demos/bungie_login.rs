//! Walks through a Bungie.net login against a local mock of the platform.
//!
//! The adapter supplies the authorization parameters and the typed profile lookup while the
//! generic [`ReqwestLoginFlow`] drives the redirect, code exchange, and verify callback.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use oauth2_bungie::{
	auth::ProviderId,
	bungie::{BungieAdapter, BungieConfig, BungieProfile, Prompt},
	flows::{ClientRegistration, ReqwestLoginFlow, VerifyParams, verify_with},
	http::ReqwestHttpClient,
	oauth::ReqwestTransportErrorMapper,
	provider::{ClientAuthMethod, ProviderDescriptor},
	reqwest::Client,
};

const ACCOUNT: &str = r#"{
	"ErrorCode": 1,
	"ErrorStatus": "Success",
	"Message": "Ok",
	"ThrottleSeconds": 0,
	"Response": {
		"destinyMemberships": [
			{ "membershipType": 3, "membershipId": "4611686018467284386", "displayName": "Guardian" }
		],
		"bungieNetUser": { "membershipId": "20236149", "displayName": "Guardian" }
	}
}"#;

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/platform/app/oauth/token/");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"Bearer\",\"expires_in\":3600,\"membership_id\":\"20236149\"}",
			);
		})
		.await;
	let profile_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/platform/User/GetBungieAccount/20236149/254/")
				.header("x-api-key", "demo-api-key");
			then.status(200).header("content-type", "application/json").body(ACCOUNT);
		})
		.await;
	let config = BungieConfig::new("demo-client", Url::parse("https://app.example.com/auth/bungie/callback")?)
		.with_client_secret("demo-secret")
		.with_api_key("demo-api-key")
		.with_prompt(Prompt::Consent);
	let http_client = ReqwestHttpClient::with_client(
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()?,
	);
	let mapper = Arc::new(ReqwestTransportErrorMapper);
	let adapter = Arc::new(
		BungieAdapter::<ReqwestHttpClient, ReqwestTransportErrorMapper>::with_http_client(
			&config,
			http_client.clone(),
			mapper.clone(),
		)
		.with_profile_base(Url::parse(&server.url("/platform/User/GetBungieAccount/"))?),
	);
	let descriptor = ProviderDescriptor::builder(ProviderId::new("bungie-demo")?)
		.authorization_endpoint(Url::parse(&server.url("/en/OAuth/Authorize"))?)
		.token_endpoint(Url::parse(&server.url("/platform/app/oauth/token/"))?)
		.preferred_client_auth_method(ClientAuthMethod::ClientSecretPost)
		.build()?;
	let flow = ReqwestLoginFlow::<BungieProfile, String>::with_http_client(
		descriptor,
		ClientRegistration::from(&config),
		adapter.hooks(),
		verify_with(|params: VerifyParams<BungieProfile>| async move {
			Ok(format!("{} ({})", params.profile.display_name, params.profile.membership_id))
		}),
		http_client,
		mapper,
	)
	.with_strategy(adapter.strategy.clone());
	let session = flow.start_authorization()?;

	println!("Redirect the browser to: {}.", session.authorize_url);

	let state = session.state.clone();
	let user = flow.complete(&session, &state, "demo-code").await?;

	println!("Signed in as {user}.");

	token_mock.assert_async().await;
	profile_mock.assert_async().await;

	Ok(())
}
