//! Typed decode of `User/GetBungieAccount` and the normalized profile handed to hosts.
//!
//! Identity fields (`bungieNetUser.membershipId`, `bungieNetUser.displayName`) are required;
//! everything else is optional and passes through as `None` when Bungie omits it.

// crates.io
use serde::Deserializer;
use serde_json::Value;
// self
use crate::{_prelude::*, bungie::PROVIDER_NAME};

/// Status members of the Bungie platform envelope wrapping every `/Platform` response.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct PlatformStatus {
	pub(crate) error_code: i32,
	#[serde(default)]
	pub(crate) error_status: String,
	#[serde(default)]
	pub(crate) message: String,
	#[serde(default)]
	pub(crate) throttle_seconds: i64,
}
impl PlatformStatus {
	const SUCCESS: i32 = 1;

	pub(crate) fn is_success(&self) -> bool {
		self.error_code == Self::SUCCESS
	}

	pub(crate) fn throttle(&self) -> Option<Duration> {
		(self.throttle_seconds > 0).then(|| Duration::seconds(self.throttle_seconds))
	}
}

/// Successful platform envelope of `User/GetBungieAccount`.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct AccountEnvelope {
	#[serde(rename = "Response")]
	pub(crate) response: BungieAccount,
}

/// `Response` payload of `User/GetBungieAccount`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BungieAccount {
	#[serde(default)]
	pub(crate) destiny_memberships: Vec<DestinyMembership>,
	pub(crate) bungie_net_user: BungieNetUser,
}

/// Normalized profile produced after a successful login.
///
/// Fields are selected from the upstream account without rewriting their values, with one
/// exception: 64-bit identifiers (`membershipId`, `successMessageFlags`) are always exposed as
/// decimal strings. Bungie documents them as strings, but a numeric JSON value is accepted and
/// rendered with its exact digits, so `20236149` and `"20236149"` yield the same profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BungieProfile {
	/// Provider tag, always `bungie`.
	pub provider: String,
	/// Bungie.net membership identifier.
	pub membership_id: String,
	/// Display name.
	pub display_name: String,
	/// Unique name, when reported.
	pub unique_name: Option<String>,
	/// Relative path of the profile picture.
	pub avatar: Option<String>,
	/// First linked Destiny membership (the cross-save primary when one is set).
	#[serde(rename = "destinyMemberships")]
	pub destiny_membership: Option<DestinyMembership>,
	/// Bungie.net account metadata.
	pub bungie_net_user: BungieNetUser,
}
impl BungieProfile {
	pub(crate) fn from_account(account: BungieAccount) -> Self {
		let BungieAccount { destiny_memberships, bungie_net_user } = account;

		Self {
			provider: PROVIDER_NAME.into(),
			membership_id: bungie_net_user.membership_id.clone(),
			display_name: bungie_net_user.display_name.clone(),
			unique_name: bungie_net_user.unique_name.clone(),
			avatar: bungie_net_user.profile_picture_path.clone(),
			destiny_membership: destiny_memberships.into_iter().next(),
			bungie_net_user,
		}
	}
}

/// Destiny membership linked to the Bungie.net account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinyMembership {
	/// Membership type whose data overrides this one under cross save.
	#[serde(default)]
	pub cross_save_override: Option<i32>,
	/// Membership types this membership can act as.
	#[serde(default)]
	pub applicable_membership_types: Option<Vec<i32>>,
	/// Whether the membership is public.
	#[serde(default)]
	pub is_public: Option<bool>,
	/// Platform membership type.
	#[serde(default)]
	pub membership_type: Option<i32>,
	/// Destiny membership identifier (64-bit, transported as text).
	#[serde(default, deserialize_with = "text_or_number")]
	pub membership_id: Option<String>,
	/// Platform display name.
	#[serde(default)]
	pub display_name: Option<String>,
	/// Bungie global display name.
	#[serde(default)]
	pub bungie_global_display_name: Option<String>,
	/// Bungie global display name code.
	#[serde(default)]
	pub bungie_global_display_name_code: Option<i32>,
}

/// Bungie.net account metadata as reported by the platform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BungieNetUser {
	/// Membership identifier (64-bit, transported as text).
	#[serde(deserialize_with = "required_text_or_number")]
	pub membership_id: String,
	/// Display name.
	pub display_name: String,
	/// Unique name.
	#[serde(default)]
	pub unique_name: Option<String>,
	/// Profile picture index.
	#[serde(default)]
	pub profile_picture: Option<i32>,
	/// Profile theme index.
	#[serde(default)]
	pub profile_theme: Option<i32>,
	/// User title index.
	#[serde(default)]
	pub user_title: Option<i32>,
	/// Success message flags (64-bit, transported as text).
	#[serde(default, deserialize_with = "text_or_number")]
	pub success_message_flags: Option<String>,
	/// Whether the account is deleted.
	#[serde(default)]
	pub is_deleted: Option<bool>,
	/// Free-form profile text.
	#[serde(default)]
	pub about: Option<String>,
	/// First access timestamp.
	#[serde(default)]
	pub first_access: Option<String>,
	/// Last update timestamp.
	#[serde(default)]
	pub last_update: Option<String>,
	/// Relationship context for the requesting user.
	#[serde(default)]
	pub context: Option<UserContext>,
	/// Whether activity is shown.
	#[serde(default)]
	pub show_activity: Option<bool>,
	/// Preferred locale.
	#[serde(default)]
	pub locale: Option<String>,
	/// Whether the locale follows the default.
	#[serde(default)]
	pub locale_inherit_default: Option<bool>,
	/// Whether group messaging is shown.
	#[serde(default)]
	pub show_group_messaging: Option<bool>,
	/// Relative profile picture path.
	#[serde(default)]
	pub profile_picture_path: Option<String>,
	/// Profile theme name.
	#[serde(default)]
	pub profile_theme_name: Option<String>,
	/// Rendered user title.
	#[serde(default)]
	pub user_title_display: Option<String>,
	/// Status text.
	#[serde(default)]
	pub status_text: Option<String>,
	/// Status timestamp.
	#[serde(default)]
	pub status_date: Option<String>,
	/// Linked Blizzard display name.
	#[serde(default)]
	pub blizzard_display_name: Option<String>,
	/// Linked Steam display name.
	#[serde(default)]
	pub steam_display_name: Option<String>,
	/// Linked Twitch display name.
	#[serde(default)]
	pub twitch_display_name: Option<String>,
	/// Cached Bungie global display name.
	#[serde(default)]
	pub cached_bungie_global_display_name: Option<String>,
	/// Cached Bungie global display name code.
	#[serde(default)]
	pub cached_bungie_global_display_name_code: Option<i32>,
}

/// Relationship between the requesting user and the profile owner.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
	/// Whether the requesting user follows the owner.
	#[serde(default)]
	pub is_following: Option<bool>,
	/// Ignore state.
	#[serde(default)]
	pub ignore_status: Option<IgnoreStatus>,
}

/// Ignore state between the requesting user and the profile owner.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnoreStatus {
	/// Whether the owner is ignored.
	#[serde(default)]
	pub is_ignored: Option<bool>,
	/// Ignore flag bits.
	#[serde(default)]
	pub ignore_flags: Option<i32>,
}

fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	match Option::<Value>::deserialize(deserializer)? {
		None | Some(Value::Null) => Ok(None),
		Some(Value::String(text)) => Ok(Some(text)),
		Some(Value::Number(number)) => Ok(Some(number.to_string())),
		Some(other) =>
			Err(serde::de::Error::custom(format!("expected a string or number, found {other}"))),
	}
}

fn required_text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	text_or_number(deserializer)?
		.ok_or_else(|| serde::de::Error::custom("expected a string or number, found null"))
}
