use std::any::Any;

use prism_meta::Describe;
use serde::Serialize;

/// A registered account.
#[derive(Debug, Clone, PartialEq, Serialize, Describe)]
pub struct User {
	/// Login name.
	#[serde(rename = "login")]
	pub name: String,
	#[prism(readonly)]
	pub id: u64,
	pub email: Option<String>,
	#[serde(skip)]
	#[prism(skip)]
	pub session: Vec<u8>,
	pub(crate) score: i32,
	#[serde(skip)]
	password_hash: String,
}

impl User {
	pub fn new(name: impl Into<String>, id: u64) -> Self {
		Self {
			name: name.into(),
			id,
			email: None,
			session: Vec::new(),
			score: 0,
			password_hash: String::new(),
		}
	}

	pub fn score(&self) -> i32 {
		self.score
	}

	pub fn has_password(&self) -> bool {
		!self.password_hash.is_empty()
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Describe)]
pub struct Pair<T> {
	pub left: T,
	pub right: T,
}

/// Outgoing and incoming owner of a transferred account.
pub type Handover = Pair<User>;

/// Code the billing system uses for a suspended account.
pub const SUSPENDED_CODE: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Describe)]
#[repr(i32)]
pub enum Status {
	#[serde(rename = "active")]
	Active = 1,
	Suspended = SUSPENDED_CODE,
	Closed,
	Legacy = -1,
}

/// Editor preferences. Plugins receive these type-erased, so no query site
/// names the type; it is registered through `bootstrap`.
#[derive(Debug, Default, Describe)]
pub struct Settings {
	pub theme: String,
	pub font_size: u16,
}

/// Never queried and never bootstrapped.
pub struct Secret {
	pub value: String,
}

/// Settings as handed to plugins.
pub fn settings_for_plugin() -> Box<dyn Any> {
	prism_meta::bootstrap::<Settings>();
	Box::new(Settings {
		theme: "dark".to_string(),
		font_size: 12,
	})
}
