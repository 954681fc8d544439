//! Test fixtures for creating common test objects

use crate::core_bridge::model::{
    entity_from_record, EntityChange, EntityData, NaturalKey, Record, RecordSpecifics,
};

pub const TEST_ORIGIN: &str = "http://www.origin.com";

/// Natural key shared by every fixture, varying only the realm
pub fn make_natural_key(signon_realm: &str) -> NaturalKey {
    NaturalKey {
        origin: TEST_ORIGIN.to_string(),
        username_element: "username_element".to_string(),
        username_value: "username_value".to_string(),
        password_element: "password_element".to_string(),
        signon_realm: signon_realm.to_string(),
    }
}

pub fn make_record(signon_realm: &str) -> Record {
    Record::new(make_natural_key(signon_realm)).with_password("password")
}

pub fn make_specifics(signon_realm: &str) -> RecordSpecifics {
    RecordSpecifics::from(&make_record(signon_realm))
}

/// Entity as the remote side would deliver it
pub fn make_remote_entity(signon_realm: &str, server_id: &str) -> EntityData {
    let mut data = entity_from_record(&make_record(signon_realm));
    data.id = server_id.to_string();
    data
}

pub fn make_remote_add(signon_realm: &str) -> EntityChange {
    EntityChange::create_add(make_remote_entity(signon_realm, &format!("server-{}", signon_realm)))
}
