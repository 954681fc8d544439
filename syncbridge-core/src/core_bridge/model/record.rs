/*
    record.rs - The synchronized unit

    A record is a saved credential. Its natural key (origin, the two form
    element names, the username and the signon realm) identifies it across
    replicas; everything else is payload.
*/

use serde::{Deserialize, Serialize};

/// Form scheme the credential was captured from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Scheme {
    #[default]
    Html,
    Basic,
    Digest,
    Other,
}

impl Scheme {
    pub fn as_i32(&self) -> i32 {
        match self {
            Scheme::Html => 0,
            Scheme::Basic => 1,
            Scheme::Digest => 2,
            Scheme::Other => 3,
        }
    }

    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => Scheme::Basic,
            2 => Scheme::Digest,
            3 => Scheme::Other,
            _ => Scheme::Html,
        }
    }
}

/// Fields that define a record's real-world identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NaturalKey {
    pub origin: String,
    pub username_element: String,
    pub username_value: String,
    pub password_element: String,
    pub signon_realm: String,
}

/// A stored credential
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Record {
    /// Page the credential was saved on
    pub origin: String,

    /// Form submission target
    pub action: String,

    pub username_element: String,
    pub username_value: String,
    pub password_element: String,

    /// The secret; never part of the natural key
    pub password_value: String,

    pub signon_realm: String,

    pub scheme: Scheme,
    pub preferred: bool,
    pub blacklisted_by_user: bool,
    pub times_used: i64,

    /// Microseconds since the Unix epoch
    pub date_created: i64,

    pub display_name: String,
    pub icon_url: String,
}

impl Record {
    /// Create a record from its natural key with an empty payload
    pub fn new(key: NaturalKey) -> Self {
        Record {
            origin: key.origin,
            username_element: key.username_element,
            username_value: key.username_value,
            password_element: key.password_element,
            signon_realm: key.signon_realm,
            ..Default::default()
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password_value = password.into();
        self
    }

    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            origin: self.origin.clone(),
            username_element: self.username_element.clone(),
            username_value: self.username_value.clone(),
            password_element: self.password_element.clone(),
            signon_realm: self.signon_realm.clone(),
        }
    }

    /// Whether two records refer to the same credential
    pub fn same_natural_key(&self, other: &Record) -> bool {
        self.origin == other.origin
            && self.username_element == other.username_element
            && self.username_value == other.username_value
            && self.password_element == other.password_element
            && self.signon_realm == other.signon_realm
    }
}
