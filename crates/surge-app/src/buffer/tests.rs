//! Tests for the buffer module.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use chrono::{DateTime, TimeZone, Utc};
    use surge_core::{Error, MessageItem, Priority, ViewportGeometry};

    use crate::buffer::{BufferEvent, MessageBuffer};
    use crate::config::{
        BufferConfig, ConfigUpdate, MonitorSettings, OrderingPolicy, PerformanceMode,
    };

    fn ts(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn msg(id: &str, ms: i64) -> MessageItem {
        MessageItem::new(id, ts(ms))
    }

    fn numbered(range: std::ops::RangeInclusive<i64>) -> Vec<MessageItem> {
        range.map(|i| msg(&format!("m{}", i), i)).collect()
    }

    fn unbatched(max: usize, threshold: usize) -> BufferConfig {
        BufferConfig {
            max_messages: max,
            prune_threshold: threshold,
            enable_batching: false,
            ..BufferConfig::default()
        }
    }

    fn record_events(buffer: &mut MessageBuffer) -> Arc<Mutex<Vec<BufferEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        buffer.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
        events
    }

    // ─────────────────────────────────────────────────────────
    // Capacity scenarios
    // ─────────────────────────────────────────────────────────

    #[test]
    fn test_overflow_evicts_down_to_capacity() {
        let mut buffer = MessageBuffer::new(unbatched(5, 5)).unwrap();

        buffer.ingest(numbered(1..=7)).unwrap();

        assert_eq!(buffer.len(), 5);
        let metrics = buffer.get_metrics();
        assert_eq!(metrics.dropped_messages, 2);
        assert_eq!(metrics.pruning_events, 1);
    }

    #[test]
    fn test_critical_item_survives_truncation() {
        let mut buffer = MessageBuffer::new(unbatched(3, 3)).unwrap();
        let mut items = vec![msg("crit", 1).with_priority(Priority::Critical)];
        items.extend(numbered(2..=6));

        buffer.ingest(items).unwrap();

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.get_metrics().dropped_messages, 3);
        let all = buffer.get_all(None);
        assert!(all.iter().any(|m| m.id == "crit"));
        assert_eq!(all.iter().filter(|m| !m.priority.is_protected()).count(), 2);
    }

    #[test]
    fn test_critical_survives_in_batch_recency_order() {
        let mut config = unbatched(3, 3);
        config.ordering = OrderingPolicy::BatchRecency;
        let mut buffer = MessageBuffer::new(config).unwrap();
        let mut items = vec![msg("crit", 1).with_priority(Priority::Critical)];
        items.extend(numbered(2..=6));

        buffer.ingest(items).unwrap();

        let ids: Vec<_> = buffer.get_all(None).into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["m3", "m2", "crit"]);
        assert_eq!(buffer.get_metrics().dropped_messages, 3);
    }

    #[test]
    fn test_size_bound_holds_across_many_ingests() {
        let mut buffer = MessageBuffer::new(unbatched(20, 20)).unwrap();
        let now = Instant::now();

        for round in 0..50i64 {
            let items = (0..7i64)
                .map(|i| {
                    let n = round * 7 + i;
                    let priority = if n % 11 == 0 {
                        Priority::Critical
                    } else if n % 5 == 0 {
                        Priority::Low
                    } else {
                        Priority::Medium
                    };
                    msg(&format!("m{}", n), n).with_priority(priority)
                })
                .collect();
            buffer.ingest_at(items, now).unwrap();

            let protected = buffer
                .get_all(Some(&|m: &MessageItem| m.priority.is_protected()))
                .len();
            assert!(buffer.len() <= 20usize.max(protected));
        }
    }

    #[test]
    fn test_protected_volume_exceeds_capacity() {
        let mut buffer = MessageBuffer::new(unbatched(3, 3)).unwrap();
        let items = (1..=6)
            .map(|i| msg(&format!("h{}", i), i).with_priority(Priority::High))
            .collect();

        buffer.ingest(items).unwrap();

        assert_eq!(buffer.len(), 6);
        assert_eq!(buffer.get_metrics().dropped_messages, 0);
    }

    // ─────────────────────────────────────────────────────────
    // Ingest semantics
    // ─────────────────────────────────────────────────────────

    #[test]
    fn test_ingest_is_total_until_evicted() {
        let mut buffer = MessageBuffer::new(unbatched(100, 100)).unwrap();
        let items = numbered(1..=10);
        let ids: Vec<_> = items.iter().map(|m| m.id.clone()).collect();

        buffer.ingest(items).unwrap();

        let stored: Vec<_> = buffer.get_all(None).into_iter().map(|m| m.id).collect();
        assert_eq!(stored, ids);
    }

    #[test]
    fn test_flushed_batch_is_ascending() {
        let mut buffer = MessageBuffer::new(BufferConfig::default()).unwrap();
        let now = Instant::now();

        buffer
            .ingest_at(vec![msg("c", 30), msg("a", 10)], now)
            .unwrap();
        buffer
            .ingest_at(vec![msg("d", 40), msg("b", 20)], now)
            .unwrap();
        assert_eq!(buffer.flush_at(now).unwrap(), 4);

        let stored: Vec<_> = buffer.get_all(None).into_iter().map(|m| m.timestamp).collect();
        let mut sorted = stored.clone();
        sorted.sort();
        assert_eq!(stored, sorted);
    }

    #[test]
    fn test_empty_ingest_is_noop() {
        let mut buffer = MessageBuffer::new(BufferConfig::default()).unwrap();
        let events = record_events(&mut buffer);

        buffer.ingest(Vec::new()).unwrap();

        assert!(buffer.is_empty());
        assert_eq!(buffer.pending_count(), 0);
        assert_eq!(buffer.flush_deadline(), None);
        assert_eq!(buffer.get_metrics().batches_processed, 0);
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_item_rejects_whole_call() {
        let mut buffer = MessageBuffer::new(unbatched(10, 10)).unwrap();
        buffer.ingest(vec![msg("ok", 1)]).unwrap();

        let result = buffer.ingest(vec![msg("fine", 2), msg("", 3)]);

        assert!(matches!(result, Err(Error::Validation { .. })));
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.get_all(None)[0].id, "ok");
    }

    #[test]
    fn test_get_chunk_paginates() {
        let mut buffer = MessageBuffer::new(unbatched(100, 100)).unwrap();
        buffer.ingest(numbered(1..=10)).unwrap();

        let page: Vec<_> = buffer.get_chunk(4, 3).into_iter().map(|m| m.id).collect();
        assert_eq!(page, vec!["m5", "m6", "m7"]);
        assert_eq!(buffer.get_chunk(8, 10).len(), 2);
    }

    // ─────────────────────────────────────────────────────────
    // Batching
    // ─────────────────────────────────────────────────────────

    #[test]
    fn test_flush_fires_on_batch_size_before_timer() {
        let mut buffer = MessageBuffer::new(BufferConfig {
            batch_size: 3,
            update_interval_ms: 100,
            enable_batching: true,
            ..BufferConfig::default()
        })
        .unwrap();
        let start = Instant::now();

        buffer
            .ingest_at(vec![msg("a", 1), msg("b", 2)], start)
            .unwrap();
        assert!(buffer.is_empty());
        assert_eq!(
            buffer.flush_deadline(),
            Some(start + Duration::from_millis(100))
        );

        buffer
            .ingest_at(vec![msg("c", 3)], start + Duration::from_millis(10))
            .unwrap();

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.get_metrics().batches_processed, 1);
        assert_eq!(buffer.flush_deadline(), None);
        // the cancelled timer does not flush again
        assert!(!buffer.poll(start + Duration::from_millis(100)).unwrap());
        assert_eq!(buffer.get_metrics().batches_processed, 1);
    }

    #[test]
    fn test_deferred_flush_fires_on_poll() {
        let mut buffer = MessageBuffer::new(BufferConfig::default()).unwrap();
        let start = Instant::now();

        buffer
            .ingest_at(vec![msg("a", 1), msg("b", 2)], start)
            .unwrap();
        assert!(!buffer.poll(start + Duration::from_millis(50)).unwrap());
        assert_eq!(
            buffer.time_until_flush(start + Duration::from_millis(50)),
            Some(Duration::from_millis(50))
        );

        assert!(buffer.poll(start + Duration::from_millis(100)).unwrap());
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.get_metrics().batches_processed, 1);
    }

    #[test]
    fn test_singleton_bypasses_batching() {
        let mut buffer = MessageBuffer::new(BufferConfig::default()).unwrap();
        buffer.ingest(vec![msg("solo", 1)]).unwrap();

        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.get_metrics().batches_processed, 0);
    }

    // ─────────────────────────────────────────────────────────
    // Configuration
    // ─────────────────────────────────────────────────────────

    #[test]
    fn test_update_with_current_config_is_idempotent() {
        let mut buffer = MessageBuffer::new(unbatched(5, 10)).unwrap();
        let now = Instant::now();
        buffer.ingest_at(numbered(1..=6), now).unwrap();
        buffer.ingest_at(numbered(7..=8), now).unwrap();
        let before = buffer.get_metrics();
        let len_before = buffer.len();
        let events = record_events(&mut buffer);

        let current = buffer.config().clone();
        buffer
            .update_config_at(
                ConfigUpdate {
                    max_messages: Some(current.max_messages),
                    prune_threshold: Some(current.prune_threshold),
                    enable_batching: Some(current.enable_batching),
                    ..Default::default()
                },
                now,
            )
            .unwrap();

        assert_eq!(buffer.len(), len_before);
        assert_eq!(buffer.get_metrics(), before);
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_update_leaves_config_intact() {
        let mut buffer = MessageBuffer::new(BufferConfig::default()).unwrap();

        let result = buffer.update_config(ConfigUpdate {
            batch_size: Some(5),
            max_messages: Some(0),
            ..Default::default()
        });

        assert!(matches!(result, Err(Error::Configuration { .. })));
        assert_eq!(buffer.config(), &BufferConfig::default());
    }

    #[test]
    fn test_lowering_capacity_prunes_immediately() {
        let mut buffer = MessageBuffer::new(unbatched(100, 100)).unwrap();
        buffer.ingest(numbered(1..=50)).unwrap();

        buffer
            .update_config(ConfigUpdate {
                max_messages: Some(10),
                prune_threshold: Some(10),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(buffer.len(), 10);
        assert_eq!(buffer.get_metrics().dropped_messages, 40);
        assert_eq!(buffer.get_all(None)[0].id, "m41");
    }

    #[test]
    fn test_disabling_batching_flushes_pending() {
        let mut buffer = MessageBuffer::new(BufferConfig::default()).unwrap();
        buffer.ingest(vec![msg("a", 1), msg("b", 2)]).unwrap();
        assert!(buffer.is_empty());

        buffer
            .update_config(ConfigUpdate {
                enable_batching: Some(false),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.flush_deadline(), None);
    }

    #[test]
    fn test_manual_mode_applies_profile() {
        let mut buffer = MessageBuffer::new(BufferConfig::default()).unwrap();
        buffer
            .update_config(ConfigUpdate::mode(PerformanceMode::HighFrequency))
            .unwrap();

        assert_eq!(buffer.mode(), PerformanceMode::HighFrequency);
        assert_eq!(buffer.config().max_messages, 500);
        assert_eq!(buffer.config().batch_size, 25);
    }

    // ─────────────────────────────────────────────────────────
    // Monitoring & mode control
    // ─────────────────────────────────────────────────────────

    #[test]
    fn test_high_load_switches_to_ultra_and_prunes() {
        let monitor = MonitorSettings {
            mode_stability_samples: 1,
            ..MonitorSettings::default()
        };
        let mut buffer = MessageBuffer::with_monitor(unbatched(1000, 1500), &monitor).unwrap();
        let events = record_events(&mut buffer);
        let start = Instant::now();

        assert_eq!(buffer.sample(start).unwrap(), None);
        buffer.ingest_at(numbered(1..=600), start).unwrap();

        let switched = buffer.sample(start + Duration::from_secs(1)).unwrap();

        assert_eq!(switched, Some(PerformanceMode::UltraPerformance));
        assert_eq!(buffer.mode(), PerformanceMode::UltraPerformance);
        assert_eq!(buffer.config().max_messages, 200);
        assert_eq!(buffer.len(), 200);
        assert_eq!(buffer.get_metrics().messages_per_second, 600);
        assert!(events.lock().unwrap().contains(&BufferEvent::ModeChanged {
            from: PerformanceMode::Normal,
            to: PerformanceMode::UltraPerformance,
        }));
    }

    #[test]
    fn test_short_sample_interval_reports_per_second_rate() {
        let monitor = MonitorSettings {
            sample_interval_ms: 100,
            mode_stability_samples: 1,
            ..MonitorSettings::default()
        };
        let mut buffer = MessageBuffer::with_monitor(unbatched(1000, 1500), &monitor).unwrap();
        let start = Instant::now();

        buffer.sample(start).unwrap();
        buffer.ingest_at(numbered(1..=40), start).unwrap();
        let switched = buffer.sample(start + Duration::from_millis(100)).unwrap();

        assert_eq!(buffer.get_metrics().messages_per_second, 400);
        assert_eq!(switched, Some(PerformanceMode::UltraPerformance));
        assert_eq!(buffer.len(), 40);
    }

    #[test]
    fn test_mode_switch_waits_for_stable_load() {
        let monitor = MonitorSettings {
            mode_stability_samples: 2,
            ..MonitorSettings::default()
        };
        let mut buffer = MessageBuffer::with_monitor(unbatched(5000, 5000), &monitor).unwrap();
        let start = Instant::now();
        buffer.sample(start).unwrap();

        buffer.ingest_at(numbered(1..=60), start).unwrap();
        assert_eq!(buffer.sample(start + Duration::from_secs(1)).unwrap(), None);

        buffer.ingest_at(numbered(61..=120), start).unwrap();
        assert_eq!(
            buffer.sample(start + Duration::from_secs(2)).unwrap(),
            Some(PerformanceMode::HighFrequency)
        );
    }

    #[test]
    fn test_auto_mode_disabled() {
        let monitor = MonitorSettings {
            auto_mode: false,
            mode_stability_samples: 1,
            ..MonitorSettings::default()
        };
        let mut buffer = MessageBuffer::with_monitor(unbatched(1000, 1500), &monitor).unwrap();
        let start = Instant::now();
        buffer.sample(start).unwrap();
        buffer.ingest_at(numbered(1..=500), start).unwrap();

        assert_eq!(buffer.sample(start + Duration::from_secs(1)).unwrap(), None);
        assert_eq!(buffer.mode(), PerformanceMode::Normal);
    }

    #[test]
    fn test_metrics_track_processing_and_memory() {
        let mut buffer = MessageBuffer::new(unbatched(100, 100)).unwrap();
        buffer
            .ingest(vec![
                msg("a", 1).with_size_estimate(1000),
                msg("b", 2).with_size_estimate(24),
            ])
            .unwrap();

        let metrics = buffer.get_metrics();
        assert_eq!(metrics.memory_usage_estimate_bytes, 1024);
        assert!(metrics.average_processing_time_ms >= 0.0);

        buffer.reset_metrics();
        assert_eq!(buffer.get_metrics().batches_processed, 0);
    }

    // ─────────────────────────────────────────────────────────
    // Windowing, subscribers, teardown
    // ─────────────────────────────────────────────────────────

    #[test]
    fn test_view_window_over_store() {
        let mut buffer = MessageBuffer::new(unbatched(100, 100)).unwrap();
        buffer.ingest(numbered(0..=49)).unwrap();

        let window = buffer.view_window(ViewportGeometry::new(200.0, 100.0, 20.0).with_overscan(2));

        assert_eq!((window.start, window.end), (8, 17));
        assert_eq!(window.items[0].id, "m8");
        assert_eq!(window.total_height_px, 1000.0);
        assert_eq!(window.offset_y_px, 160.0);
    }

    #[test]
    fn test_subscribers_see_insert_and_prune() {
        let mut buffer = MessageBuffer::new(unbatched(5, 5)).unwrap();
        let events = record_events(&mut buffer);

        buffer.ingest(numbered(1..=7)).unwrap();

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                BufferEvent::Inserted { count: 7, size: 5 },
                BufferEvent::Pruned {
                    dropped: 2,
                    size: 5
                },
            ]
        );
    }

    #[test]
    fn test_clear_keeps_metrics() {
        let mut buffer = MessageBuffer::new(unbatched(2, 2)).unwrap();
        buffer.ingest(numbered(1..=3)).unwrap();
        buffer.clear();

        assert!(buffer.is_empty());
        assert_eq!(buffer.get_metrics().dropped_messages, 1);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut buffer = MessageBuffer::new(BufferConfig::default()).unwrap();
        let events = record_events(&mut buffer);
        buffer.ingest(vec![msg("a", 1)]).unwrap();
        buffer.ingest(vec![msg("b", 2), msg("c", 3)]).unwrap();

        buffer.destroy();
        buffer.destroy();

        assert!(buffer.is_empty());
        assert_eq!(buffer.pending_count(), 0);
        assert_eq!(buffer.flush_deadline(), None);
        // one Inserted for the singleton, one Cleared from the first destroy
        assert_eq!(events.lock().unwrap().len(), 2);
    }
}
