//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check key derivation, the payload codec, the memory tier
//! and manager bookkeeping over generated inputs.

use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tempfile::TempDir;

use crate::cache::{
    canonical_params, codec, derive_key, CacheManager, Cell, HotEntry, MemoryTier, Param, Params,
    Payload, PutOptions, Table,
};
use crate::config::CacheConfig;

// == Strategies ==
/// Finite floats only; NaN and infinities cannot be keyed
fn finite_f64() -> impl Strategy<Value = f64> {
    -1.0e12f64..1.0e12f64
}

fn field_name() -> impl Strategy<Value = String> {
    "[a-z_]{1,8}"
}

fn timestamp() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..4_102_444_800_000).prop_map(|ms| DateTime::from_timestamp_millis(ms).unwrap_or_default())
}

fn date() -> impl Strategy<Value = NaiveDate> {
    (2000i32..2030, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default())
}

fn param_leaf() -> impl Strategy<Value = Param> {
    prop_oneof![
        Just(Param::Null),
        any::<bool>().prop_map(Param::Bool),
        any::<i64>().prop_map(Param::Int),
        finite_f64().prop_map(Param::Float),
        "[A-Za-z0-9 <>=_.]{0,12}".prop_map(Param::Text),
        timestamp().prop_map(Param::from),
        date().prop_map(Param::Date),
    ]
}

fn param_tree() -> impl Strategy<Value = Param> {
    param_leaf().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Param::List),
            prop::collection::btree_map(field_name(), inner, 0..4)
                .prop_map(|fields| Param::Map(params_from(fields))),
        ]
    })
}

fn params_strategy() -> impl Strategy<Value = Params> {
    prop::collection::btree_map(field_name(), param_tree(), 0..6).prop_map(params_from)
}

fn params_from(fields: BTreeMap<String, Param>) -> Params {
    fields
        .into_iter()
        .fold(Params::new(), |params, (k, v)| params.with(k, v))
}

/// Rebuilds a parameter set with every map's field order reversed
fn reversed(params: &Params) -> Params {
    let fields: Vec<(&str, &Param)> = params.iter().collect();
    fields
        .into_iter()
        .rev()
        .fold(Params::new(), |out, (k, v)| out.with(k, reversed_param(v)))
}

fn reversed_param(value: &Param) -> Param {
    match value {
        Param::Map(inner) => Param::Map(reversed(inner)),
        Param::List(items) => Param::List(items.iter().map(reversed_param).collect()),
        other => other.clone(),
    }
}

fn cell() -> impl Strategy<Value = Cell> {
    prop_oneof![
        Just(Cell::Null),
        any::<bool>().prop_map(Cell::Bool),
        any::<i64>().prop_map(Cell::Int),
        finite_f64().prop_map(Cell::Float),
        "[A-Za-z0-9 ]{0,10}".prop_map(Cell::Text),
        date().prop_map(Cell::Date),
        timestamp().prop_map(Cell::Timestamp),
    ]
}

fn table() -> impl Strategy<Value = Table> {
    (0usize..5).prop_flat_map(|width| {
        (
            prop::collection::vec("[a-z]{1,6}", width),
            prop::collection::vec(prop::collection::vec(cell(), width), 0..6),
        )
            .prop_map(|(columns, rows)| {
                let mut table = Table::new(columns);
                for row in rows {
                    // Widths match by construction
                    let _ = table.push_row(row);
                }
                table
            })
    })
}

fn payload() -> impl Strategy<Value = Payload> {
    let leaf = prop_oneof![
        Just(Payload::Null),
        any::<bool>().prop_map(Payload::Bool),
        any::<i64>().prop_map(Payload::Int),
        any::<u64>().prop_map(Payload::UInt),
        finite_f64().prop_map(Payload::Float),
        ".{0,16}".prop_map(Payload::Text),
        timestamp().prop_map(Payload::Timestamp),
        table().prop_map(Payload::Table),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Payload::List),
            prop::collection::btree_map(field_name(), inner, 0..4).prop_map(Payload::Map),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Determinism: field order and explicit nulls never change the key.
    #[test]
    fn prop_key_ignores_field_order_and_nulls(
        params in params_strategy(),
        null_fields in prop::collection::vec("Z[a-z]{1,4}", 0..3)
    ) {
        let expected = derive_key("screen_run", &params).unwrap();

        prop_assert_eq!(&derive_key("screen_run", &reversed(&params)).unwrap(), &expected);

        let padded = null_fields
            .into_iter()
            .fold(params.clone(), |p, name| p.with(name, Param::Null));
        prop_assert_eq!(&derive_key("screen_run", &padded).unwrap(), &expected);
    }

    // Discrimination: distinct normalized trees never share a key.
    #[test]
    fn prop_no_key_collisions(batch in prop::collection::vec(params_strategy(), 1..40)) {
        let mut seen: HashMap<String, String> = HashMap::new();
        for params in &batch {
            let canonical = canonical_params(params).unwrap();
            let key = derive_key("rank_ranks", params).unwrap();
            if let Some(previous) = seen.insert(key.clone(), canonical.clone()) {
                prop_assert_eq!(previous, canonical, "collision on key {}", key);
            }
        }
    }

    // Round-trip: decode(encode(v)) == v for every payload shape.
    #[test]
    fn prop_codec_roundtrip(value in payload()) {
        let blob = codec::encode(&value).unwrap();
        prop_assert_eq!(codec::decode(&blob).unwrap(), value);
    }

    // Corruption of any body byte is detected, never silently decoded.
    #[test]
    fn prop_codec_detects_corruption(value in payload(), flip in any::<prop::sample::Index>()) {
        let mut blob = codec::encode(&value).unwrap();
        let header = 13;
        prop_assume!(blob.len() > header);
        let idx = header + flip.index(blob.len() - header);
        blob[idx] ^= 0x5A;
        prop_assert!(codec::decode(&blob).is_err());
    }

    // Capacity: the memory tier never holds more than its capacity.
    #[test]
    fn prop_memory_capacity_enforced(
        keys in prop::collection::vec("[a-z0-9]{1,6}", 1..200),
        capacity in 1usize..50
    ) {
        let tier = MemoryTier::new(capacity);
        let now = Utc::now();
        for key in keys {
            tier.put(key, Arc::new(HotEntry {
                payload: Payload::Null,
                category: "c".into(),
                created_at: now,
                expires_at: now + chrono::TimeDelta::hours(1),
                size_bytes: 0,
            }));
            prop_assert!(tier.len() <= capacity, "tier holds {} > {}", tier.len(), capacity);
        }
    }
}

// Manager properties hit SQLite, so they run fewer cases
proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    // Statistics: every get counts exactly once, as a hit or a miss.
    #[test]
    fn prop_statistics_accuracy(
        ops in prop::collection::vec((any::<bool>(), 0i64..4), 1..30)
    ) {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(
            CacheConfig::default().with_db_path(dir.path().join("cache.db"))
        ).unwrap();

        let mut expected_hits = 0u64;
        let mut expected_misses = 0u64;
        for (is_put, id) in ops {
            let params = Params::new().with("id", id);
            if is_put {
                cache.put("strategy", &params, &Payload::Int(id), "strategy", PutOptions::default()).unwrap();
            } else {
                match cache.get("strategy", &params, false).unwrap() {
                    Some(found) => {
                        prop_assert_eq!(found, Payload::Int(id));
                        expected_hits += 1;
                    }
                    None => expected_misses += 1,
                }
            }
        }

        let stats = cache.statistics();
        prop_assert_eq!(stats.hits, expected_hits);
        prop_assert_eq!(stats.misses, expected_misses);
    }

    // Put followed by get returns exactly what was stored.
    #[test]
    fn prop_put_then_get_roundtrip(params in params_strategy(), value in payload()) {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(
            CacheConfig::default().with_db_path(dir.path().join("cache.db"))
        ).unwrap();

        prop_assert!(cache.put("screen_run", &params, &value, "screen_run", PutOptions::default()).unwrap());
        prop_assert_eq!(cache.get("screen_run", &reversed(&params), false).unwrap(), Some(value));
    }
}

// == Property Test for Error Response Format ==
proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    // Every error converts to a JSON body with an "error" string.
    #[test]
    fn prop_error_response_format(error_msg in "[a-zA-Z0-9 _-]{1,100}") {
        use crate::error::CacheError;
        use axum::body::to_bytes;
        use axum::response::IntoResponse;

        let error_variants = vec![
            CacheError::StorageUnavailable(error_msg.clone()),
            CacheError::InvalidParameters(error_msg.clone()),
            CacheError::Config(error_msg.clone()),
        ];

        let rt = tokio::runtime::Runtime::new().unwrap();
        for error in error_variants {
            let expected_msg = error.to_string();
            let response = error.into_response();

            let content_type = response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok());
            prop_assert!(
                content_type.map(|ct| ct.contains("application/json")).unwrap_or(false),
                "Response should have JSON content-type"
            );

            let bytes = rt.block_on(async { to_bytes(response.into_body(), usize::MAX).await.unwrap() });
            let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            prop_assert_eq!(json["error"].as_str(), Some(expected_msg.as_str()));
        }
    }
}
