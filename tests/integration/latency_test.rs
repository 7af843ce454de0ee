use std::sync::Arc;
use std::time::Duration;

use procwatch::core::config::EngineConfig;
use procwatch::core::process_monitor::testing::{MockProcess, MockSource};
use procwatch::core::process_monitor::{ProcessEngine, ProcessSource};
use procwatch::platform::LinuxClassifier;
use tokio::time::Instant;

fn engine(source: &Arc<MockSource>) -> ProcessEngine {
    ProcessEngine::new(
        Arc::clone(source) as Arc<dyn ProcessSource>,
        Arc::new(LinuxClassifier),
        &EngineConfig::default(),
    )
}

#[tokio::test(start_paused = true)]
async fn test_two_hundred_processes_within_budget() {
    let source = Arc::new(MockSource::with_processes((1..=200).map(|pid| {
        MockProcess::new(pid, &format!("worker-{}", pid)).delay(Duration::from_millis(10))
    })));
    let engine = engine(&source);

    let start = Instant::now();
    let event = engine.refresh().await.unwrap().unwrap();
    let elapsed = start.elapsed();

    assert!(event.is_full());
    assert_eq!(engine.current().len(), 200);
    assert!(source.max_in_flight() <= 15);
    assert!(
        elapsed <= Duration::from_millis(14 * 150 + 50),
        "refresh took {:?}",
        elapsed
    );
}

#[tokio::test(start_paused = true)]
async fn test_hung_processes_are_cut_off() {
    let source = Arc::new(MockSource::with_processes((1..=30).map(|pid| {
        MockProcess::new(pid, "stuck").delay(Duration::from_secs(5))
    })));
    let engine = engine(&source);

    let start = Instant::now();
    engine.refresh().await.unwrap();

    // Two waves of 15, each bounded by the per-process deadline
    assert!(start.elapsed() <= Duration::from_millis(2 * 150 + 50));
}

#[tokio::test(start_paused = true)]
async fn test_stable_load_produces_no_changes() {
    let source = Arc::new(MockSource::with_processes((1..=20).map(|pid| {
        MockProcess::new(pid, "steady")
            .cpu(10.0)
            .memory(64 * 1024 * 1024, 2.0)
    })));
    let engine = engine(&source);
    engine.refresh().await.unwrap();

    for pid in 1..=20 {
        source.update(pid, |p| {
            p.cpu += 0.9;
            p.memory.percent += 0.4;
        });
    }

    let event = engine.refresh().await.unwrap().unwrap();
    assert!(event.is_noop());
}
