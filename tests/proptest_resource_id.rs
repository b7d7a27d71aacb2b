//! Property-based tests using proptest
//!
//! These tests verify resource ID parsing, location normalization and
//! schema validation using randomized inputs.

use azrm::arm::resource_id::ResourceId;
use azrm::resource::helpers::normalize_location;
use azrm::resource::{get_schema, ResourceData};
use proptest::prelude::*;
use serde_json::json;

/// Generate an identifier segment as ARM emits them
fn arb_segment() -> impl Strategy<Value = String> {
    "[A-Za-z0-9][A-Za-z0-9._-]{0,20}"
}

/// Generate a provider-scoped resource ID with 1-3 nested type/name pairs
fn arb_resource_id() -> impl Strategy<Value = (String, String, String, Vec<(String, String)>)> {
    (
        "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
        arb_segment(),
        prop_oneof![
            Just("Microsoft.DBforMySQL".to_string()),
            Just("Microsoft.Network".to_string()),
            Just("Microsoft.Storage".to_string()),
        ],
        prop::collection::vec((arb_segment(), arb_segment()), 1..4),
    )
}

/// Generate a region display name like "West Europe" or "East US 2"
fn arb_location() -> impl Strategy<Value = String> {
    (
        prop_oneof!["West", "East", "North", "South", "Central"],
        prop_oneof!["Europe", "US", "Asia", "India"],
        prop::option::of(1u8..4),
    )
        .prop_map(|(a, b, n)| match n {
            Some(n) => format!("{} {} {}", a, b, n),
            None => format!("{} {}", a, b),
        })
}

proptest! {
    #[test]
    fn parse_recovers_every_segment((sub, group, provider, path) in arb_resource_id()) {
        let mut id = format!("/subscriptions/{}/resourceGroups/{}/providers/{}", sub, group, provider);
        for (key, value) in &path {
            id.push_str(&format!("/{}/{}", key, value));
        }

        let parsed = ResourceId::parse(&id).unwrap();
        prop_assert_eq!(&parsed.subscription_id, &sub);
        prop_assert_eq!(&parsed.resource_group, &group);
        prop_assert_eq!(parsed.provider.as_deref(), Some(provider.as_str()));
        prop_assert_eq!(parsed.name(), path.last().unwrap().1.as_str());
        prop_assert_eq!(parsed.to_string(), id);
    }

    #[test]
    fn trailing_slash_is_ignored((sub, group, provider, path) in arb_resource_id()) {
        let mut id = format!("/subscriptions/{}/resourceGroups/{}/providers/{}", sub, group, provider);
        for (key, value) in &path {
            id.push_str(&format!("/{}/{}", key, value));
        }

        let with_slash = ResourceId::parse(&format!("{}/", id)).unwrap();
        prop_assert_eq!(with_slash, ResourceId::parse(&id).unwrap());
    }

    #[test]
    fn odd_segment_counts_never_parse(sub in arb_segment(), group in arb_segment(), extra in arb_segment()) {
        let id = format!("/subscriptions/{}/resourceGroups/{}/{}", sub, group, extra);
        prop_assert!(ResourceId::parse(&id).is_err());
    }

    #[test]
    fn parse_never_panics(s in "\\PC*") {
        let _ = ResourceId::parse(&s);
    }

    #[test]
    fn normalize_location_is_idempotent(location in arb_location()) {
        let once = normalize_location(&location);
        prop_assert_eq!(normalize_location(&once), once.clone());
        prop_assert!(!once.contains(' '));
        prop_assert_eq!(once, normalize_location(&location.to_uppercase()));
    }

    #[test]
    fn equivalent_locations_never_drift(location in arb_location()) {
        let schema = get_schema("azurerm_resource_group").unwrap();
        let canonical = normalize_location(&location);
        prop_assert!(schema.equivalent("location", &json!(location), &json!(canonical)));
    }

    #[test]
    fn storage_outside_allow_list_is_rejected(storage_mb in 0i64..1_000_000) {
        prop_assume!(storage_mb != 51200 && storage_mb != 102400);

        let d = ResourceData::from_value(json!({
            "name": "db1",
            "location": "westeurope",
            "resource_group_name": "rg",
            "sku": [{"name": "MYSQLB50", "capacity": 50, "tier": "Basic"}],
            "administrator_login": "admin",
            "administrator_login_password": "P@ssw0rd!",
            "version": "5.7",
            "storage_mb": storage_mb,
            "ssl_enforcement": "Enabled"
        }))
        .unwrap();

        let schema = get_schema("azurerm_mysql_server").unwrap();
        prop_assert!(schema.validate(&d).is_err());
    }
}
