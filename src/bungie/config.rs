//! Bungie application registration and provider options.

// self
use crate::{_prelude::*, flows::ClientRegistration};

/// Access type requested by the host (`online` unless configured otherwise).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
	/// Tokens are used while the user is present.
	#[default]
	Online,
	/// Tokens are used while the user is absent.
	Offline,
}
impl AccessType {
	/// Returns the wire label.
	pub const fn as_str(self) -> &'static str {
		match self {
			AccessType::Online => "online",
			AccessType::Offline => "offline",
		}
	}
}
impl Display for AccessType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Prompt mode forwarded verbatim to the authorization endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prompt {
	/// Do not display any authentication or consent screen.
	None,
	/// Always ask the user for consent.
	Consent,
	/// Ask the user to pick an account.
	SelectAccount,
}
impl Prompt {
	/// Returns the wire label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Prompt::None => "none",
			Prompt::Consent => "consent",
			Prompt::SelectAccount => "select_account",
		}
	}
}
impl Display for Prompt {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Bungie.net application registration plus provider options.
///
/// Field names are accepted in either snake_case or the camelCase used by the Bungie developer
/// portal, so the struct can be loaded straight from a host's config file:
///
/// ```
/// let config: oauth2_bungie::bungie::BungieConfig = serde_json::from_str(
/// 	r#"{
/// 		"clientID": "12345",
/// 		"clientSecret": "secret",
/// 		"callbackURL": "https://app.example.com/auth/bungie/callback",
/// 		"apiKey": "key",
/// 		"prompt": "consent"
/// 	}"#,
/// )
/// .unwrap();
///
/// assert_eq!(config.access_type.as_str(), "online");
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BungieConfig {
	/// OAuth client identifier issued by Bungie.
	#[serde(alias = "clientID", alias = "clientId")]
	pub client_id: String,
	/// OAuth client secret (confidential clients only).
	#[serde(default, alias = "clientSecret")]
	pub client_secret: Option<String>,
	/// Redirect URI registered with the application.
	#[serde(alias = "callbackURL", alias = "callbackUrl")]
	pub callback_url: Url,
	/// Application API key sent as `X-API-Key` on profile requests.
	#[serde(default, alias = "apiKey")]
	pub api_key: Option<String>,
	/// Requested access type.
	#[serde(default, alias = "accessType")]
	pub access_type: AccessType,
	/// Whether previously granted scopes should be included.
	#[serde(default, alias = "includeGrantedScopes")]
	pub include_granted_scopes: bool,
	/// Prompt mode forwarded to the authorization endpoint.
	#[serde(default)]
	pub prompt: Option<Prompt>,
}
impl BungieConfig {
	/// Creates a configuration with default options.
	pub fn new(client_id: impl Into<String>, callback_url: Url) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: None,
			callback_url,
			api_key: None,
			access_type: AccessType::default(),
			include_granted_scopes: false,
			prompt: None,
		}
	}

	/// Sets the client secret.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(secret.into());

		self
	}

	/// Sets the API key.
	pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
		self.api_key = Some(api_key.into());

		self
	}

	/// Sets the access type.
	pub fn with_access_type(mut self, access_type: AccessType) -> Self {
		self.access_type = access_type;

		self
	}

	/// Sets the scope-grant flag.
	pub fn with_include_granted_scopes(mut self, include: bool) -> Self {
		self.include_granted_scopes = include;

		self
	}

	/// Sets the prompt mode.
	pub fn with_prompt(mut self, prompt: Prompt) -> Self {
		self.prompt = Some(prompt);

		self
	}
}
impl Debug for BungieConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BungieConfig")
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("callback_url", &self.callback_url)
			.field("api_key_set", &self.api_key.is_some())
			.field("access_type", &self.access_type)
			.field("include_granted_scopes", &self.include_granted_scopes)
			.field("prompt", &self.prompt)
			.finish()
	}
}
impl From<&BungieConfig> for ClientRegistration {
	fn from(config: &BungieConfig) -> Self {
		Self {
			client_id: config.client_id.clone(),
			client_secret: config.client_secret.clone(),
			redirect_uri: config.callback_url.clone(),
		}
	}
}
