use std::sync::Arc;

use proptest::prelude::*;
use ucms_auth::auth::{Identity, ManualClock, Role, TokenService};
use ucms_auth::configuration::JwtSettings;

const START: i64 = 1_700_000_000;
const BASE64URL: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

fn service() -> (TokenService, Arc<ManualClock>) {
    let settings = JwtSettings {
        secret: "property-test-secret-with-32-plus-bytes".to_string(),
        access_token_expiry: 900,
        refresh_token_expiry: 604_800,
    };
    let clock = Arc::new(ManualClock::new(START));
    (TokenService::new(&settings, clock.clone()), clock)
}

fn role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Student), Just(Role::Counselor), Just(Role::Admin)]
}

fn identity() -> impl Strategy<Value = Identity> {
    (1i64..i64::MAX, "[a-z]{1,12}@u\\.edu", role()).prop_map(|(subject_id, email, role)| {
        Identity {
            subject_id,
            email,
            role,
        }
    })
}

/// Replace the character at `index` of `segment` (0 = header, 2 = signature)
fn tamper(token: &str, segment: usize, index: usize, replacement: u8) -> Option<String> {
    let mut parts: Vec<String> = token.split('.').map(str::to_owned).collect();
    let target = parts[segment].as_bytes();
    let index = index % target.len();
    if target[index] == replacement {
        return None;
    }

    let mut bytes = target.to_vec();
    bytes[index] = replacement;
    parts[segment] = String::from_utf8(bytes).ok()?;
    Some(parts.join("."))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_issued_tokens_verify_to_the_same_identity(identity in identity()) {
        let (tokens, _) = service();
        let pair = tokens.issue(&identity).unwrap();

        for token in [&pair.access_token, &pair.refresh_token] {
            let claims = tokens.verify(token).unwrap();
            prop_assert_eq!(claims.identity(), identity.clone());
            prop_assert_eq!(claims.issued_at, START);
        }
    }

    #[test]
    fn prop_access_token_valid_through_its_lifetime(identity in identity(), elapsed in 0i64..=900) {
        let (tokens, clock) = service();
        let pair = tokens.issue(&identity).unwrap();

        clock.advance(elapsed);
        prop_assert!(tokens.verify(&pair.access_token).is_some());
    }

    #[test]
    fn prop_access_token_rejected_after_its_lifetime(identity in identity(), elapsed in 901i64..604_800) {
        let (tokens, clock) = service();
        let pair = tokens.issue(&identity).unwrap();

        clock.advance(elapsed);
        prop_assert!(tokens.verify(&pair.access_token).is_none());
        prop_assert!(tokens.verify(&pair.refresh_token).is_some());
    }

    #[test]
    fn prop_any_changed_character_is_rejected(
        identity in identity(),
        segment in 0usize..3,
        index in any::<usize>(),
        replacement in proptest::sample::select(BASE64URL),
    ) {
        let (tokens, _) = service();
        let pair = tokens.issue(&identity).unwrap();

        let tampered = tamper(&pair.access_token, segment, index, replacement);
        prop_assume!(tampered.is_some());

        prop_assert!(tokens.verify(&tampered.unwrap()).is_none());
    }

    #[test]
    fn prop_arbitrary_strings_never_verify(input in ".{0,200}") {
        let (tokens, _) = service();
        prop_assert!(tokens.verify(&input).is_none());
    }
}
