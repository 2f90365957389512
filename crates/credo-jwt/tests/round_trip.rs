use credo_api::{Profile, ProfileKind};
use credo_jwt::{JwtAuthenticator, JwtGenerator};
use proptest::prelude::*;
use serde_json::Value;

const KEY: &str = "12345678901234567890123456789012";

fn kind() -> impl Strategy<Value = ProfileKind> {
    prop::sample::select(ProfileKind::ALL.to_vec())
}

fn attribute_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        ".{0,24}".prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        prop::num::f64::NORMAL.prop_map(Value::from),
    ]
}

fn profile() -> impl Strategy<Value = Profile> {
    (
        kind(),
        "[A-Za-z0-9@._#-]{1,32}",
        prop::collection::btree_map("[a-z_]{1,12}", attribute_value(), 0..6),
        prop::collection::btree_set("[a-z]{1,8}", 0..3),
        prop::collection::btree_set("[a-z:]{1,8}", 0..3),
        any::<bool>(),
    )
        .prop_map(|(kind, id, attributes, roles, permissions, remembered)| {
            let mut profile = Profile::new(kind, id).unwrap();
            for (name, value) in attributes {
                profile.add_attribute(name, value);
            }
            for role in roles {
                profile.add_role(role);
            }
            for permission in permissions {
                profile.add_permission(permission);
            }
            profile.set_remembered(remembered);
            profile
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn authenticate_inverts_generate(profile in profile(), encrypt in any::<bool>()) {
        let generator = JwtGenerator::from_secret(KEY).unwrap().encrypted(encrypt);
        let authenticator = JwtAuthenticator::from_secret(KEY).unwrap();

        let token = generator.generate(&profile).unwrap();
        let resolved = authenticator.authenticate(&token).unwrap();

        prop_assert_eq!(resolved.typed_id(), profile.typed_id());
        prop_assert_eq!(resolved, profile);
    }
}
