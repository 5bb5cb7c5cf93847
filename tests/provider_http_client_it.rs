#![cfg(feature = "reqwest")]

// self
use oauth2_bungie::{
	_preludet::*,
	auth::TokenSecret,
	bungie::{BungieAdapter, BungieConfig, BungieProfile},
	error::{ConfigError, TransientError, TransportError},
	flows::{ExtraParams, VerifyParams, verify_with},
	http::{ProviderHttpClient, ResponseMetadata, ResponseMetadataSlot},
	oauth::{
		TransportErrorMapper,
		oauth2::{
			AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
			http::{
				StatusCode,
				header::{CONTENT_TYPE, HeaderValue},
			},
		},
	},
	provider::{Endpoint, ProviderStrategy},
};

const TOKEN_BODY: &str = r#"{"access_token":"fake-access","token_type":"Bearer","expires_in":3600,"membership_id":"20236149"}"#;
const ACCOUNT_FIXTURE: &str = include_str!("fixtures/get_bungie_account.json");

#[derive(Debug)]
enum FakeTransportError {
	Throttled,
}
impl Display for FakeTransportError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Throttled => write!(f, "Transport throttled."),
		}
	}
}
impl StdError for FakeTransportError {}

/// Serves canned Bungie responses by path; profile calls can be throttled.
#[derive(Clone, Default)]
struct FakeHttpClient {
	throttle_profile: Option<Duration>,
	seen: Arc<Mutex<Vec<(String, Option<String>)>>>,
}
impl FakeHttpClient {
	fn throttled(retry_after: Duration) -> Self {
		Self { throttle_profile: Some(retry_after), ..Default::default() }
	}

	fn seen(&self) -> Vec<(String, Option<String>)> {
		self.seen.lock().clone()
	}
}
impl ProviderHttpClient for FakeHttpClient {
	type Handle = FakeHttpHandle;
	type TransportError = FakeTransportError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		FakeHttpHandle { slot, client: self.clone() }
	}
}

struct FakeHttpHandle {
	slot: ResponseMetadataSlot,
	client: FakeHttpClient,
}
impl<'a> AsyncHttpClient<'a> for FakeHttpHandle {
	type Error = HttpClientError<FakeTransportError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'a + Send + Sync>>;

	fn call(&'a self, request: HttpRequest) -> Self::Future {
		let slot = self.slot.clone();
		let client = self.client.clone();

		Box::pin(async move {
			assert!(
				slot.take().is_none(),
				"ResponseMetadataSlot must be clear before dispatching a request."
			);

			let path = request.uri().path().to_owned();
			let api_key = request
				.headers()
				.get("x-api-key")
				.and_then(|value| value.to_str().ok())
				.map(str::to_owned);

			client.seen.lock().push((path.clone(), api_key));

			let body = if path.starts_with("/platform/app/oauth/token") {
				TOKEN_BODY
			} else if let Some(retry_after) = client.throttle_profile {
				slot.store(ResponseMetadata { status: Some(429), retry_after: Some(retry_after) });

				return Err(HttpClientError::Reqwest(Box::new(FakeTransportError::Throttled)));
			} else {
				ACCOUNT_FIXTURE
			};
			let mut response = HttpResponse::new(body.as_bytes().to_vec());

			*response.status_mut() = StatusCode::OK;
			response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
			slot.store(ResponseMetadata { status: Some(200), retry_after: None });

			Ok(response)
		})
	}
}

#[derive(Clone, Default)]
struct RecordingTransportErrorMapper {
	metadata: Arc<Mutex<Vec<(Endpoint, Option<ResponseMetadata>)>>>,
}
impl RecordingTransportErrorMapper {
	fn recorded(&self) -> Vec<(Endpoint, Option<ResponseMetadata>)> {
		self.metadata.lock().clone()
	}
}
impl TransportErrorMapper<FakeTransportError> for RecordingTransportErrorMapper {
	fn map_transport_error(
		&self,
		_strategy: &dyn ProviderStrategy,
		endpoint: Endpoint,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<FakeTransportError>,
	) -> Error {
		let status = meta.and_then(|value| value.status);
		let retry_after = meta.and_then(|value| value.retry_after);

		self.metadata.lock().push((endpoint, meta.cloned()));

		match err {
			HttpClientError::Reqwest(inner) => TransientError::Endpoint {
				endpoint,
				message: format!("fake transport error: {inner}"),
				status,
				retry_after,
			}
			.into(),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			other => TransientError::Endpoint {
				endpoint,
				message: format!("unhandled HTTP client error: {other:?}"),
				status,
				retry_after,
			}
			.into(),
		}
	}
}

fn config() -> BungieConfig {
	BungieConfig::new(
		"12345",
		Url::parse("https://app.example.com/auth/bungie/callback")
			.expect("Callback URL should parse successfully."),
	)
	.with_client_secret("fake-secret")
	.with_api_key("fake-key")
}

#[tokio::test]
async fn custom_transport_drives_the_whole_login() {
	let http_client = FakeHttpClient::default();
	let mapper = RecordingTransportErrorMapper::default();
	let adapter: Arc<BungieAdapter<FakeHttpClient, RecordingTransportErrorMapper>> = Arc::new(
		BungieAdapter::<FakeHttpClient, RecordingTransportErrorMapper>::with_http_client(
			&config(),
			http_client.clone(),
			mapper.clone(),
		),
	);
	let flow = adapter
		.login_flow(verify_with(|params: VerifyParams<BungieProfile>| async move {
			Ok(params.profile.display_name)
		}))
		.expect("Login flow should build.");
	let session = flow.start_authorization().expect("Authorization session should start successfully.");
	let state = session.state.clone();
	let display_name =
		flow.complete(&session, &state, "fake-code").await.expect("Login should complete.");

	assert_eq!(display_name, "Guardian");
	assert_eq!(
		http_client.seen(),
		vec![
			("/platform/app/oauth/token/".to_owned(), None),
			("/platform/User/GetBungieAccount/20236149/254/".to_owned(), Some("fake-key".to_owned())),
		]
	);
	assert!(mapper.recorded().is_empty());
}

#[tokio::test]
async fn custom_mapper_sees_profile_metadata() {
	let http_client = FakeHttpClient::throttled(Duration::seconds(5));
	let mapper = RecordingTransportErrorMapper::default();
	let adapter = BungieAdapter::<FakeHttpClient, RecordingTransportErrorMapper>::with_http_client(
		&config(),
		http_client,
		mapper.clone(),
	);
	let mut extra = ExtraParams::default();

	extra.fields.insert("membership_id".into(), "20236149".into());

	let err = adapter
		.fetch_profile(&TokenSecret::new("fake-access"), &extra)
		.await
		.expect_err("Throttled profile requests should fail.");

	match err {
		Error::Transient(TransientError::Endpoint { endpoint, status, retry_after, .. }) => {
			assert_eq!(endpoint, Endpoint::Profile);
			assert_eq!(status, Some(429));
			assert_eq!(retry_after, Some(Duration::seconds(5)));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	let recorded = mapper.recorded();

	assert_eq!(recorded.len(), 1);
	assert_eq!(recorded[0].0, Endpoint::Profile);
	assert_eq!(recorded[0].1.as_ref().and_then(|meta| meta.status), Some(429));
}
