//! Integration tests for the ingest pipeline
//!
//! These tests validate routing from wire topic to stores:
//! - History eviction and latest-value overwrite
//! - Malformed payload handling
//! - Unmapped topics

mod common;

use common::builders::temp_only;
use envdash_rs::ingest::IngestDispatcher;
use envdash_rs::registry::{Channel, ChannelRegistry};
use envdash_rs::types::{IngestResult, RejectReason, Sample, SampleValue};
use std::sync::Arc;

fn dispatcher(capacity: usize) -> IngestDispatcher {
    let registry = ChannelRegistry::new(temp_only()).unwrap();
    IngestDispatcher::new(Arc::new(registry), capacity).unwrap()
}

#[test]
fn test_oldest_sample_evicted_at_capacity() {
    let mut d = dispatcher(3);
    for payload in ["20.0", "21.0", "22.0", "23.0"] {
        assert!(d.ingest("siot/环境温度", payload).is_applied());
    }

    let history = d.store().history("temp").unwrap();
    assert_eq!(history.values(), vec![21.0, 22.0, 23.0]);
    assert_eq!(d.store().latest("temp").and_then(Sample::as_f64), Some(23.0));

    let snapshot = d.store().history_snapshot("temp").unwrap();
    let timestamps: Vec<_> = snapshot.iter().map(Sample::timestamp).collect();
    assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_malformed_payload_keeps_latest_value() {
    let mut d = dispatcher(3);
    d.ingest("siot/环境温度", "20.0");

    let result = d.ingest("siot/环境温度", "abc");
    assert_eq!(
        result,
        IngestResult::Rejected {
            key: "temp".into(),
            reason: RejectReason::NotANumber("abc".into()),
        }
    );
    assert_eq!(d.store().latest("temp").and_then(Sample::as_f64), Some(20.0));
    assert_eq!(d.store().history("temp").unwrap().len(), 1);
}

#[test]
fn test_unmapped_topic_is_idempotent() {
    let mut d = dispatcher(3);
    d.ingest("siot/环境温度", "20.0");
    let version = d.store().version();

    for _ in 0..3 {
        assert_eq!(d.ingest("unknown/topic", "42"), IngestResult::Unmapped);
    }
    assert_eq!(d.store().version(), version);
    assert_eq!(d.store().history("temp").unwrap().values(), vec![20.0]);
    assert_eq!(d.stats().unmapped, 3);
}

#[test]
fn test_campus_registry_routes_every_sensor() {
    let registry = Arc::new(ChannelRegistry::campus_default().unwrap());
    let mut d = IngestDispatcher::new(registry.clone(), 30).unwrap();

    let messages = [
        ("siot/环境温度", "23.4"),
        ("siot/环境湿度", "56"),
        ("siot/aqi", "41"),
        ("siot/tvoc", "120"),
        ("siot/eco2", "650"),
        ("siot/紫外线指数", "5.2"),
        ("siot/紫外线风险等级", "中等"),
        ("siot/噪音", "48.5"),
        ("siot/摄像头", "data:image/jpeg;base64,/9j/4AAQ"),
    ];
    for (topic, payload) in messages {
        assert!(d.ingest(topic, payload).is_applied(), "{} was not applied", topic);
    }

    assert_eq!(d.stats().applied, messages.len() as u64);
    assert!(d.store().history("camera").is_none());
    assert!(d.store().history("uv_risk").is_none());
    assert!(matches!(
        d.store().latest("camera").map(Sample::value),
        Some(SampleValue::Opaque(_))
    ));
}

#[test]
fn test_whitespace_and_non_finite_payloads() {
    let mut d = dispatcher(3);
    assert!(d.ingest("siot/环境温度", " 19.5 \r\n").is_applied());
    assert!(matches!(
        d.ingest("siot/环境温度", "NaN"),
        IngestResult::Rejected {
            reason: RejectReason::NonFinite(_),
            ..
        }
    ));
    assert!(matches!(
        d.ingest("siot/环境温度", ""),
        IngestResult::Rejected {
            reason: RejectReason::EmptyPayload,
            ..
        }
    ));
    assert_eq!(d.store().history("temp").unwrap().values(), vec![19.5]);
}

#[test]
fn test_registry_rejects_duplicate_topics() {
    let result = ChannelRegistry::new(vec![
        Channel::numeric("temp", "siot/环境温度"),
        Channel::numeric("temp_backup", "siot/环境温度"),
    ]);
    assert!(result.is_err());
}

#[test]
fn test_zero_capacity_is_fatal() {
    let registry = ChannelRegistry::new(temp_only()).unwrap();
    assert!(IngestDispatcher::new(Arc::new(registry), 0).is_err());
}
