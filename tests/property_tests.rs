//! Property-based tests for field routing and event assembly

use proptest::prelude::*;
use std::sync::Arc;
use tracing_sink_ext::field::Field;
use tracing_sink_ext::level::Level;
use tracing_sink_ext::record::Entry;
use tracing_sink_ext::sentry::classify::{accumulate, Accumulated, Attributes, ClassifiedFields};
use tracing_sink_ext::sentry::keys::*;
use tracing_sink_ext::sentry::{skip, SentryCore, Severity};
use tracing_sink_ext::transport::MemoryTransport;

const RESERVED: [&str; 10] = [
    EVENT_ID_KEY,
    PROJECT_KEY,
    TIMESTAMP_KEY,
    LOGGER_KEY,
    PLATFORM_KEY,
    CULPRIT_KEY,
    SERVER_NAME_KEY,
    ERROR_KEY,
    HTTP_REQUEST_KEY,
    USER_KEY,
];

fn free_key() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,11}".prop_filter("reserved key", |k| !RESERVED.contains(&k.as_str()))
}

fn free_field() -> impl Strategy<Value = Field> {
    (free_key(), any::<bool>(), ".{0,16}", any::<i64>()).prop_map(|(key, as_tag, text, n)| {
        if as_tag {
            Field::str(format!("{}{}", TAG_PREFIX, key), text)
        } else {
            Field::i64(key, n)
        }
    })
}

fn level() -> impl Strategy<Value = Level> {
    prop::sample::select(Level::ALL.to_vec())
}

fn classified(base: &[Field], call: &[Field]) -> ClassifiedFields {
    match accumulate(base, call).unwrap() {
        Accumulated::Fields(acc) => acc,
        Accumulated::Skipped => panic!("unexpected skip"),
    }
}

proptest! {
    /// A non-reserved field lands in exactly one of tags or context
    #[test]
    fn test_free_fields_route_to_one_destination(key in free_key(), value in ".{0,24}") {
        let plain = classified(&[], &[Field::str(key.clone(), value.clone())]);
        prop_assert!(plain.tags.is_empty());
        prop_assert_eq!(plain.context.get(&key), Some(&serde_json::Value::String(value.clone())));

        let tag_key = format!("{}{}", TAG_PREFIX, key);
        let tagged = classified(&[], &[Field::str(tag_key, value.clone())]);
        prop_assert!(tagged.context.is_empty());
        prop_assert_eq!(tagged.tags.get(&key), Some(&value));
    }

    /// Call-site fields win over base fields with the same key
    #[test]
    fn test_call_fields_override_base(
        key in free_key(),
        base in any::<i64>(),
        call in any::<i64>(),
    ) {
        let acc = classified(&[Field::i64(key.clone(), base)], &[Field::i64(key.clone(), call)]);
        prop_assert_eq!(acc.context.len(), 1);
        prop_assert_eq!(acc.context.get(&key), Some(&serde_json::json!(call)));
    }

    /// The skip sentinel suppresses the entry wherever it appears
    #[test]
    fn test_sentinel_anywhere_skips(
        before in prop::collection::vec(free_field(), 0..8),
        after in prop::collection::vec(free_field(), 0..8),
        in_base in any::<bool>(),
    ) {
        let mut fields = before.clone();
        fields.push(skip());
        fields.extend(after);

        let outcome = if in_base {
            accumulate(&fields, &[]).unwrap()
        } else {
            accumulate(&before, &fields).unwrap()
        };
        prop_assert!(matches!(outcome, Accumulated::Skipped));
    }

    /// Without the sentinel every free field is accounted for
    #[test]
    fn test_free_fields_are_never_lost(fields in prop::collection::vec(free_field(), 0..16)) {
        let acc = classified(&[], &fields);
        for field in &fields {
            match field.key.strip_prefix(TAG_PREFIX) {
                Some(name) => prop_assert!(acc.tags.contains_key(name)),
                None => prop_assert!(acc.context.contains_key(&field.key)),
            }
        }
        prop_assert_eq!(acc.attributes, Attributes::default());
        prop_assert!(acc.error.is_none());
    }

    /// Every level maps to a tracker severity, and the mapping is monotonic
    #[test]
    fn test_severity_mapping_is_total(a in level(), b in level()) {
        let rank = |s: Severity| match s {
            Severity::Debug => 0,
            Severity::Info => 1,
            Severity::Warning => 2,
            Severity::Error => 3,
            Severity::Fatal => 4,
        };
        if a <= b {
            prop_assert!(rank(Severity::from(a)) <= rank(Severity::from(b)));
        }
        if a >= Level::DPanic {
            prop_assert_eq!(Severity::from(a), Severity::Fatal);
        }
    }

    /// Raw levels outside the known range are rejected
    #[test]
    fn test_unknown_raw_level_is_an_error(raw in any::<i8>()) {
        let parsed = Level::try_from(raw);
        if (-1..=5).contains(&raw) {
            prop_assert_eq!(parsed.unwrap() as i8, raw);
        } else {
            prop_assert!(parsed.is_err());
        }
    }

    /// Deriving a core never changes the fields seen by its parent or siblings
    #[test]
    fn test_derivation_isolation(left in free_key(), right in free_key()) {
        prop_assume!(left != right);
        let parent = SentryCore::new(Level::Debug, Arc::new(MemoryTransport::new()));
        let a = parent.with_fields(&[Field::bool(left.clone(), true)]);
        let b = parent.with_fields(&[Field::bool(right.clone(), true)]);
        let entry = Entry::new(Level::Error, "boom");

        let context = |core: &SentryCore| core.event(&entry, &[]).unwrap().unwrap().context;
        prop_assert_eq!(context(&parent), None);

        let seen_a = context(&a).unwrap();
        prop_assert!(seen_a.contains_key(&left) && !seen_a.contains_key(&right));

        let seen_b = context(&b).unwrap();
        prop_assert!(seen_b.contains_key(&right) && !seen_b.contains_key(&left));
    }
}
