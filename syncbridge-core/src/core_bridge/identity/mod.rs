/*
    Identity - Cross-replica record matching
*/

pub mod client_tag;

pub use client_tag::{client_tag, client_tag_hash, CLIENT_TAG_HASH_PREFIX, TAG_DELIMITER};
