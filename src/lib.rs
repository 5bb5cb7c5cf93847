//! Bungie.net OAuth 2.0 login adapter: provider endpoints, authorization parameters, and typed
//! profile decoding composed into a generic authorization-code flow driver.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod bungie;
pub mod error;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod provider;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::ProviderId,
		bungie::{BungieAdapter, BungieConfig, BungieProfile},
		flows::{ClientRegistration, LoginFlow, VerifyFn},
		http::ReqwestHttpClient,
		oauth::ReqwestTransportErrorMapper,
		provider::{ClientAuthMethod, ProviderDescriptor},
	};

	/// Adapter type alias used by reqwest-backed integration tests.
	pub type ReqwestTestAdapter = BungieAdapter<ReqwestHttpClient, ReqwestTransportErrorMapper>;
	/// Login flow type alias used by reqwest-backed integration tests.
	pub type ReqwestTestLoginFlow<U> =
		LoginFlow<BungieProfile, U, ReqwestHttpClient, ReqwestTransportErrorMapper>;

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Builds an adapter whose profile requests target `profile_base` instead of bungie.net.
	pub fn build_reqwest_test_adapter(config: &BungieConfig, profile_base: Url) -> ReqwestTestAdapter {
		ReqwestTestAdapter::with_http_client(
			config,
			test_reqwest_http_client(),
			Arc::new(ReqwestTransportErrorMapper),
		)
		.with_profile_base(profile_base)
	}

	/// Builds a descriptor pointing the authorization and token endpoints at a mock server.
	pub fn build_mock_descriptor(authorization: Url, token: Url) -> ProviderDescriptor {
		ProviderDescriptor::builder(
			ProviderId::new("bungie-mock").expect("Mock provider identifier should be valid."),
		)
		.authorization_endpoint(authorization)
		.token_endpoint(token)
		.preferred_client_auth_method(ClientAuthMethod::ClientSecretPost)
		.build()
		.expect("Mock provider descriptor should build successfully.")
	}

	/// Wires a login flow for `config` against mock endpoints, reusing the adapter hooks.
	pub fn build_reqwest_test_login_flow<U>(
		config: &BungieConfig,
		descriptor: ProviderDescriptor,
		profile_base: Url,
		verify: VerifyFn<BungieProfile, U>,
	) -> ReqwestTestLoginFlow<U>
	where
		U: 'static + Send,
	{
		let adapter = Arc::new(build_reqwest_test_adapter(config, profile_base));
		let registration = ClientRegistration::from(config);

		ReqwestTestLoginFlow::<U>::with_http_client(
			descriptor,
			registration,
			adapter.hooks(),
			verify,
			test_reqwest_http_client(),
			Arc::new(ReqwestTransportErrorMapper),
		)
		.with_strategy(adapter.strategy.clone())
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
