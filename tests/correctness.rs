//! Correctness and invariant tests for groupflow
//!
//! These tests drive each engine through its host-facing interface and check
//! the properties that must hold across groups, cold starts and warm
//! restarts. They complement the unit tests in each module.
//!
//! Run with: cargo test --test correctness --features full

// Require all features
#[cfg(not(all(feature = "ema", feature = "zscore", feature = "batch")))]
compile_error!(
    "Correctness tests require all features. Run: cargo test --test correctness --features full"
);

use groupflow::agent::{Agent, Request, Response};
use groupflow::batch::{BatchConfig, WindowBatcher};
use groupflow::config::OptionSetting;
use groupflow::ema::{EmaConfig, EmaEngine};
use groupflow::error::{EngineError, RestoreError};
use groupflow::point::{Output, Point};
use groupflow::traits::{GroupState, Handler};
use groupflow::zscore::{ZScoreConfig, ZScoreEngine};

fn value_point(group: &str, time: i64, value: f64) -> Point {
    Point::new("series", group, time)
        .with_tag("group", group)
        .with_double("value", value)
}

/// Deterministic pseudo-random walk across a few groups
fn workload(len: usize) -> Vec<Point> {
    let groups = ["alpha", "beta", "gamma"];
    let mut x: u64 = 0x9E37_79B9_7F4A_7C15;
    (0..len)
        .map(|i| {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            let value = (x % 1000) as f64 / 10.0;
            value_point(groups[(x % 3) as usize], i as i64 * 3, value)
        })
        .collect()
}

/// Feed `head` to `live`, snapshot it into `restored`, then check both emit
/// the same events for `tail`.
fn assert_warm_restart<H: Handler>(mut live: H, mut restored: H, head: &[Point], tail: &[Point]) {
    let mut sink = Vec::new();
    for p in head {
        live.point(p.clone(), &mut sink).unwrap();
    }

    let blob = live.snapshot().unwrap();
    restored.restore(&blob).unwrap();

    let mut expected = Vec::new();
    let mut actual = Vec::new();
    for p in tail {
        live.point(p.clone(), &mut expected).unwrap();
        restored.point(p.clone(), &mut actual).unwrap();
    }
    assert!(!expected.is_empty());
    assert_eq!(actual, expected);
}

// ============================================================================
// Exponential moving average
// ============================================================================

mod ema {
    use super::*;

    #[test]
    fn reproduces_recurrence_step_by_step() {
        let mut engine = EmaEngine::with_config(EmaConfig::new("value", 3, 0.5));
        let mut out = Vec::new();
        for (t, v) in [1.0, 2.0, 3.0, 4.0].iter().enumerate() {
            engine.point(value_point("g", t as i64, *v), &mut out).unwrap();
            assert!(engine.registry().get("g").unwrap().window_len() <= 3);
        }

        let avgs: Vec<f64> = out
            .iter()
            .map(|o| o.as_point().unwrap().fields_double["exp_avg"])
            .collect();
        assert_eq!(avgs, vec![0.5, 1.25, 2.125, 3.0]);
    }

    #[test]
    fn zero_alpha_or_size_is_rejected() {
        for (size, alpha) in [(3, 0.0), (0, 0.5), (0, 0.0)] {
            let mut engine = EmaEngine::new();
            let err = engine
                .init(&[
                    OptionSetting::string("field", "value"),
                    OptionSetting::int("size", size),
                    OptionSetting::double("alpha", alpha),
                ])
                .unwrap_err();
            assert!(
                !err.to_string().is_empty(),
                "size={} alpha={} should produce a message",
                size,
                alpha
            );
        }
    }

    #[test]
    fn warm_restart_matches_live_instance() {
        let points = workload(200);
        let config = EmaConfig::new("value", 8, 0.3);
        assert_warm_restart(
            EmaEngine::with_config(config.clone()),
            EmaEngine::with_config(config),
            &points[..120],
            &points[120..],
        );
    }

    #[test]
    fn state_exists_only_for_seen_groups() {
        let mut engine = EmaEngine::with_config(EmaConfig::new("value", 4, 0.5));
        let mut out = Vec::new();
        for p in workload(50) {
            engine.point(p, &mut out).unwrap();
        }
        let mut keys: Vec<&str> = engine.registry().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["alpha", "beta", "gamma"]);
    }
}

// ============================================================================
// Rolling z-score
// ============================================================================

mod zscore {
    use super::*;

    #[test]
    fn flat_window_scores_zero() {
        let mut engine = ZScoreEngine::with_config(ZScoreConfig::new("value").with_size(5));
        let mut out = Vec::new();
        for t in 0..20 {
            engine.point(value_point("g", t, 42.0), &mut out).unwrap();
        }
        assert_eq!(out.len(), 20);
        for o in &out {
            assert_eq!(o.as_point().unwrap().fields_double["sigma_value"], 0.0);
        }
        assert_eq!(engine.registry().get("g").unwrap().sigma(), 0.0);
    }

    #[test]
    fn fill_window_holds_back_first_points() {
        let config = ZScoreConfig::new("value")
            .with_size(5)
            .with_fill_window(true);
        let mut engine = ZScoreEngine::with_config(config);
        let mut emitted = Vec::new();
        for t in 0..8 {
            let mut out = Vec::new();
            engine
                .point(value_point("g", t, t as f64 * 1.5), &mut out)
                .unwrap();
            emitted.push(out.len());
        }
        assert_eq!(emitted, vec![0, 0, 0, 0, 1, 1, 1, 1]);
    }

    #[test]
    fn windowed_moments_match_direct_computation() {
        let size = 6;
        let mut engine = ZScoreEngine::with_config(ZScoreConfig::new("value").with_size(size));
        let mut values = Vec::new();
        let mut out = Vec::new();

        for p in workload(100).into_iter().filter(|p| p.group == "beta") {
            values.push(p.fields_double["value"]);
            engine.point(p, &mut out).unwrap();

            let tail = &values[values.len().saturating_sub(size)..];
            let n = tail.len() as f64;
            let mean = tail.iter().sum::<f64>() / n;
            let state = engine.registry().get("beta").unwrap();
            assert!((state.mean() - mean).abs() < 1e-6);
        }
    }

    #[test]
    fn warm_restart_matches_live_instance() {
        let points = workload(200);
        let config = ZScoreConfig::new("value")
            .with_size(10)
            .with_fill_window(true);
        assert_warm_restart(
            ZScoreEngine::with_config(config.clone()),
            ZScoreEngine::with_config(config),
            &points[..90],
            &points[90..],
        );
    }
}

// ============================================================================
// Window batcher
// ============================================================================

mod batch {
    use super::*;

    fn shape(out: &[Output]) -> String {
        out.iter()
            .map(|o| match o {
                Output::BeginBatch(_) => 'B',
                Output::Point(_) => 'P',
                Output::EndBatch(_) => 'E',
            })
            .collect()
    }

    #[test]
    fn size_threshold_releases_one_batch() {
        let mut batcher = WindowBatcher::with_config(BatchConfig::new(3, 0));
        let mut out = Vec::new();
        for t in 0..3 {
            batcher.point(value_point("g", t, 1.0), &mut out).unwrap();
        }
        assert_eq!(shape(&out), "BPPPE");
        assert_eq!(batcher.registry().get("g").unwrap().window_len(), 0);

        out.clear();
        batcher.point(value_point("g", 3, 1.0), &mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(batcher.registry().get("g").unwrap().window_len(), 1);
    }

    #[test]
    fn period_deadline_flushes_all_groups() {
        let mut batcher = WindowBatcher::with_config(BatchConfig::new(1000, 10));
        let mut out = Vec::new();
        batcher.point(value_point("a", 0, 1.0), &mut out).unwrap();
        batcher.point(value_point("b", 3, 1.0), &mut out).unwrap();
        batcher.point(value_point("c", 5, 1.0), &mut out).unwrap();
        assert!(out.is_empty());

        batcher.point(value_point("a", 10, 1.0), &mut out).unwrap();
        assert_eq!(shape(&out), "BPEBPEBPE");

        let mut flushed: Vec<&str> = out
            .iter()
            .filter_map(|o| match o {
                Output::BeginBatch(b) => Some(b.group.as_str()),
                _ => None,
            })
            .collect();
        flushed.sort_unstable();
        assert_eq!(flushed, vec!["a", "b", "c"]);
    }

    #[test]
    fn every_point_is_emitted_exactly_once() {
        let mut batcher = WindowBatcher::with_config(BatchConfig::new(4, 25));
        let points = workload(300);
        let mut out = Vec::new();
        for p in points.iter().cloned() {
            batcher.point(p, &mut out).unwrap();
        }
        let buffered: usize = batcher.registry().iter().map(|(_, s)| s.window_len()).sum();
        let emitted = out.iter().filter(|o| o.as_point().is_some()).count();
        assert_eq!(emitted + buffered, points.len());

        // Markers are balanced and never nested
        let mut open = false;
        for o in &out {
            match o {
                Output::BeginBatch(_) => {
                    assert!(!open);
                    open = true;
                }
                Output::EndBatch(_) => {
                    assert!(open);
                    open = false;
                }
                Output::Point(_) => assert!(open),
            }
        }
        assert!(!open);
    }

    #[test]
    fn released_batches_respect_size() {
        for (size, period) in [(1, 10), (2, 9), (4, 25), (5, 3)] {
            let mut batcher = WindowBatcher::with_config(BatchConfig::new(size, period));
            let mut out = Vec::new();
            for p in workload(300) {
                batcher.point(p, &mut out).unwrap();
            }
            for o in &out {
                if let Output::BeginBatch(b) = o {
                    assert!(
                        b.size <= size,
                        "size={} period={} released {}",
                        size,
                        period,
                        b.size
                    );
                }
            }
        }
    }

    #[test]
    fn restored_deadline_needs_a_period() {
        let mut live = WindowBatcher::with_config(BatchConfig::new(50, 10));
        let mut out = Vec::new();
        live.point(value_point("g", 0, 1.0), &mut out).unwrap();

        let mut restored = WindowBatcher::with_config(BatchConfig::new(50, 0));
        restored.restore(&live.snapshot().unwrap()).unwrap();
        for t in [20, 21, 22] {
            restored.point(value_point("g", t, 1.0), &mut out).unwrap();
        }
        assert!(out.is_empty());
        assert_eq!(restored.deadline(), None);
    }

    #[test]
    fn warm_restart_matches_live_instance() {
        let points = workload(300);
        let config = BatchConfig::new(7, 40);
        assert_warm_restart(
            WindowBatcher::with_config(config.clone()),
            WindowBatcher::with_config(config),
            &points[..150],
            &points[150..],
        );
    }
}

// ============================================================================
// Snapshot integrity
// ============================================================================

mod snapshot {
    use super::*;

    #[test]
    fn snapshot_from_another_engine_is_refused() {
        let mut ema = EmaEngine::with_config(EmaConfig::new("value", 3, 0.5));
        let mut out = Vec::new();
        ema.point(value_point("g", 0, 1.0), &mut out).unwrap();
        let blob = ema.snapshot().unwrap();

        let mut zscore = ZScoreEngine::with_config(ZScoreConfig::new("value"));
        zscore.point(value_point("h", 0, 1.0), &mut out).unwrap();
        let before = zscore.registry().clone();

        let err = zscore.restore(&blob).unwrap_err();
        assert!(matches!(err, RestoreError::KindMismatch { .. }));
        assert_eq!(zscore.registry(), &before);
    }

    #[test]
    fn one_bad_group_rejects_the_whole_snapshot() {
        let mut engine = ZScoreEngine::with_config(ZScoreConfig::new("value").with_size(3));
        let mut out = Vec::new();
        engine.point(value_point("keep", 0, 1.0), &mut out).unwrap();

        let blob = br#"{
            "version": 1,
            "kind": "zscore",
            "groups": {
                "good": {"size": 3, "window": [1.0], "square_window": [1.0], "avg": 1.0, "avg_square": 1.0},
                "bad": {"size": 0, "window": [], "square_window": [], "avg": 0.0, "avg_square": 0.0}
            }
        }"#;
        let err = engine.restore(blob).unwrap_err();
        assert_eq!(
            err,
            RestoreError::InvalidGroup {
                group: "bad".into(),
                reason: "size must be at least 1".into()
            }
        );
        assert!(engine.registry().get("keep").is_some());
        assert!(engine.registry().get("good").is_none());
    }

    #[test]
    fn extreme_values_never_poison_snapshots() {
        let extremes = [1.0, 1e200, -1e300, f64::MAX, 3.0, 1e154, -2.5];

        let mut zscore = ZScoreEngine::with_config(ZScoreConfig::new("value").with_size(3));
        let mut ema = EmaEngine::with_config(EmaConfig::new("value", 3, 1.8));
        let mut out = Vec::new();
        for (t, v) in extremes.iter().enumerate() {
            zscore.point(value_point("g", t as i64, *v), &mut out).unwrap();
            ema.point(value_point("g", t as i64, *v), &mut out).unwrap();
        }

        let mut restored = ZScoreEngine::with_config(ZScoreConfig::new("value").with_size(3));
        restored.restore(&zscore.snapshot().unwrap()).unwrap();
        assert_eq!(restored.registry(), zscore.registry());

        let mut restored = EmaEngine::with_config(EmaConfig::new("value", 3, 1.8));
        restored.restore(&ema.snapshot().unwrap()).unwrap();
        assert_eq!(restored.registry(), ema.registry());
    }

    #[test]
    fn restore_replaces_previous_groups() {
        let mut source = EmaEngine::with_config(EmaConfig::new("value", 3, 0.5));
        let mut out = Vec::new();
        source.point(value_point("new", 0, 1.0), &mut out).unwrap();

        let mut target = EmaEngine::with_config(EmaConfig::new("value", 3, 0.5));
        target.point(value_point("old", 0, 1.0), &mut out).unwrap();
        target.restore(&source.snapshot().unwrap()).unwrap();

        assert!(target.registry().get("old").is_none());
        assert!(target.registry().get("new").is_some());
    }
}

// ============================================================================
// Host session
// ============================================================================

mod session {
    use super::*;

    #[test]
    fn batcher_session_end_to_end() {
        let mut agent = Agent::new(WindowBatcher::new());
        let init = agent
            .handle(Request::Init(vec![
                OptionSetting::int("size", 2),
                OptionSetting::string("as", "echo"),
            ]))
            .unwrap();
        assert!(matches!(&init[0], Response::Init(r) if r.success));

        assert!(agent
            .handle(Request::Point(value_point("g", 1, 1.0)))
            .unwrap()
            .is_empty());
        let responses = agent
            .handle(Request::Point(value_point("g", 2, 2.0)))
            .unwrap();
        assert_eq!(responses.len(), 4);
        assert!(matches!(&responses[0], Response::BeginBatch(b) if b.name == "echo" && b.size == 2));
        assert!(matches!(&responses[3], Response::EndBatch(e) if e.tmax == 2));
    }

    #[test]
    fn shape_mismatch_ends_session() {
        let mut agent = Agent::new(ZScoreEngine::new());
        agent
            .handle(Request::Init(vec![OptionSetting::string("field", "value")]))
            .unwrap();

        let err = agent
            .handle(Request::EndBatch(Default::default()))
            .unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedShape(_)));

        let err = agent
            .handle(Request::Point(value_point("g", 0, 1.0)))
            .unwrap_err();
        assert!(matches!(err, EngineError::SessionFailed(_)));
    }
}
