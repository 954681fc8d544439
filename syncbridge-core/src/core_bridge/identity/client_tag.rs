/*
    client_tag.rs - Content-derived record identity

    Two replicas that share no keys yet recognise the same credential by its
    client tag: the normalised, path-escaped origin followed by the four
    identifying form fields, joined by '|'. The escape set covers '|', so the
    delimiter never appears inside the origin part.
*/

use crate::core_bridge::model::RecordSpecifics;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use sha2::{Digest, Sha256};
use url::Url;

/// Separator between natural-key fields
pub const TAG_DELIMITER: char = '|';

/// Namespace mixed into the hash so tags from other record types never collide
pub const CLIENT_TAG_HASH_PREFIX: &str = "passwords";

/// Characters escaped in the origin part
const PATH_ESCAPE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b':')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Canonical form of an origin URL; unparsable input is kept verbatim
fn normalize_origin(origin: &str) -> String {
    match Url::parse(origin) {
        Ok(url) => url.to_string(),
        Err(_) => origin.to_string(),
    }
}

fn escape_path(input: &str) -> String {
    utf8_percent_encode(input, PATH_ESCAPE_SET).to_string()
}

/// Compute the client tag of a record
pub fn client_tag(specifics: &RecordSpecifics) -> String {
    let origin = escape_path(&normalize_origin(&specifics.origin));

    let mut tag = String::with_capacity(
        origin.len()
            + specifics.username_element.len()
            + specifics.username_value.len()
            + specifics.password_element.len()
            + specifics.signon_realm.len()
            + 4,
    );
    tag.push_str(&origin);
    for field in [
        &specifics.username_element,
        &specifics.username_value,
        &specifics.password_element,
        &specifics.signon_realm,
    ] {
        tag.push(TAG_DELIMITER);
        tag.push_str(field);
    }
    tag
}

/// Wire form of a client tag
pub fn client_tag_hash(tag: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(CLIENT_TAG_HASH_PREFIX.as_bytes());
    hasher.update(tag.as_bytes());
    STANDARD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn specifics(
        origin: &str,
        username_element: &str,
        username_value: &str,
        password_element: &str,
        signon_realm: &str,
    ) -> RecordSpecifics {
        RecordSpecifics {
            origin: origin.to_string(),
            username_element: username_element.to_string(),
            username_value: username_value.to_string(),
            password_element: password_element.to_string(),
            signon_realm: signon_realm.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_client_tag_format() {
        let s = specifics(
            "http://www.origin.com",
            "username_element",
            "username_value",
            "password_element",
            "signon_realm",
        );

        assert_eq!(
            client_tag(&s),
            "http%3A//www.origin.com/|username_element|username_value|password_element|signon_realm"
        );
    }

    #[test]
    fn test_payload_does_not_affect_tag() {
        let mut a = specifics("https://a.example", "u", "alice", "p", "https://a.example/");
        let mut b = a.clone();
        a.password_value = "one".to_string();
        b.password_value = "two".to_string();
        b.times_used = 9;

        assert_eq!(client_tag(&a), client_tag(&b));
    }

    #[test]
    fn test_origin_delimiter_is_escaped() {
        let s = specifics("not a url|with pipe", "u", "v", "p", "r");
        let tag = client_tag(&s);

        assert!(tag.starts_with("not%20a%20url%7Cwith%20pipe|"));
        assert_eq!(tag.matches(TAG_DELIMITER).count(), 4);
    }

    #[test]
    fn test_equivalent_origins_share_a_tag() {
        let a = specifics("HTTP://WWW.Origin.com", "u", "v", "p", "r");
        let b = specifics("http://www.origin.com/", "u", "v", "p", "r");
        assert_eq!(client_tag(&a), client_tag(&b));
    }

    #[test]
    fn test_hash_is_stable_base64() {
        let hash = client_tag_hash("tag");
        assert_eq!(hash, client_tag_hash("tag"));
        assert_ne!(hash, client_tag_hash("tag2"));
        assert_eq!(hash.len(), 44);
    }

    proptest! {
        #[test]
        fn prop_tag_depends_only_on_natural_key(
            user in "[a-z]{0,8}",
            realm in "[a-z]{1,8}",
            secret_a in ".*",
            secret_b in ".*",
        ) {
            let mut a = specifics("https://example.org", "user", &user, "pass", &realm);
            let mut b = a.clone();
            a.password_value = secret_a;
            b.password_value = secret_b;
            prop_assert_eq!(client_tag(&a), client_tag(&b));
        }

        #[test]
        fn prop_distinct_keys_give_distinct_tags(
            user_a in "[a-z]{1,8}",
            user_b in "[a-z]{1,8}",
        ) {
            prop_assume!(user_a != user_b);
            let a = specifics("https://example.org", "user", &user_a, "pass", "realm");
            let b = specifics("https://example.org", "user", &user_b, "pass", "realm");
            prop_assert_ne!(client_tag_hash(&client_tag(&a)), client_tag_hash(&client_tag(&b)));
        }
    }
}
