use std::sync::Arc;
use std::time::Duration;

use procwatch::core::config::EngineConfig;
use procwatch::core::process_monitor::testing::{MockProcess, MockSource};
use procwatch::core::process_monitor::{
    EngineEvent, PluginLifecycle, ProcessManager, ProcessSource, ProcessUpdateEvent,
    QueryOptions,
};
use procwatch::platform::LinuxClassifier;
use procwatch::ProcwatchError;
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::TryRecvError;

fn manager(source: &Arc<MockSource>) -> ProcessManager {
    ProcessManager::with_classifier(
        Arc::clone(source) as Arc<dyn ProcessSource>,
        Arc::new(LinuxClassifier),
        EngineConfig::default(),
        Handle::current(),
    )
}

fn desktop() -> Arc<MockSource> {
    Arc::new(MockSource::with_processes(vec![
        MockProcess::new(1, "systemd").user("root").exe("/usr/lib/systemd/systemd"),
        MockProcess::new(410, "chrome")
            .user("alice")
            .exe("/opt/google/chrome/chrome")
            .cpu(12.0)
            .memory(400 * 1024 * 1024, 5.0),
        MockProcess::new(411, "chromium-sandbox")
            .user("root")
            .exe("/opt/chromium/sandbox"),
        MockProcess::new(900, "bash").user("alice").exe("/home/alice/bin/bash"),
    ]))
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_view_lifecycle_publishes_only_while_active() {
    let source = desktop();
    let manager = manager(&source);
    manager.init().unwrap();
    manager.service_startup().unwrap();

    let mut events = manager.subscribe();

    manager.on_view_enter();
    let first = events.recv().await.unwrap();
    match first {
        EngineEvent::ProcessUpdate(ProcessUpdateEvent::Full { full_list }) => {
            assert_eq!(full_list.len(), 4);
        }
        other => panic!("expected full update, got {:?}", other),
    }

    manager.on_view_leave();
    tokio::time::sleep(Duration::from_secs(15)).await;
    settle().await;
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

    manager.on_view_enter();
    let update = events.recv().await.unwrap();
    assert_eq!(update.name(), EngineEvent::UPDATE);
    settle().await;
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

    manager.service_shutdown().unwrap();
    assert!(!manager.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_search_excludes_system_processes() {
    let source = desktop();
    let manager = manager(&source);
    manager.refresh_now().await.unwrap();

    let options = QueryOptions {
        search_term: "chrom".to_string(),
        show_system: false,
        ..Default::default()
    };
    let result = manager.get_processes(&options).unwrap();

    let pids: Vec<u32> = result.items.iter().map(|p| p.pid).collect();
    assert_eq!(pids, vec![410]);
    assert_eq!(result.total, 1);

    let options = QueryOptions {
        show_system: true,
        ..options
    };
    assert_eq!(manager.get_processes(&options).unwrap().total, 2);
}

#[tokio::test(start_paused = true)]
async fn test_kill_absent_pid_leaves_snapshot_untouched() {
    let source = desktop();
    let manager = manager(&source);
    manager.refresh_now().await.unwrap();
    let before = manager.snapshot();

    let err = manager.kill_process(4242).unwrap_err();
    assert!(matches!(err, ProcwatchError::ProcessNotFound(4242)));

    let after = manager.snapshot();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(after.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_kill_then_refresh_reports_removal() {
    let source = desktop();
    let manager = manager(&source);
    manager.refresh_now().await.unwrap();

    let mut events = manager.subscribe();
    manager.kill_process(900).unwrap();
    assert_eq!(events.recv().await.unwrap().name(), EngineEvent::KILLED);

    manager.refresh_now().await.unwrap();
    match events.recv().await.unwrap() {
        EngineEvent::ProcessUpdate(ProcessUpdateEvent::Incremental { removed, .. }) => {
            assert_eq!(removed, vec![900]);
        }
        other => panic!("expected incremental update, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_enumeration_failure_keeps_previous_snapshot() {
    let source = desktop();
    let manager = manager(&source);
    manager.refresh_now().await.unwrap();

    let mut events = manager.subscribe();
    source.set_fail_enumeration(true);

    assert!(manager.refresh_now().await.is_err());
    assert_eq!(events.recv().await.unwrap().name(), EngineEvent::ERROR);
    assert_eq!(manager.snapshot().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_process_detail_is_fresh() {
    let source = desktop();
    let manager = manager(&source);
    manager.refresh_now().await.unwrap();

    source.update(410, |p| p.cpu = 77.0);
    let detail = manager.get_process_detail(410).await.unwrap();
    assert_eq!(detail.cpu_percent, 77.0);
    assert_eq!(manager.snapshot().get(410).unwrap().cpu_percent, 12.0);

    let err = manager.get_process_detail(31337).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test(start_paused = true)]
async fn test_force_refresh_runs_in_background() {
    let source = desktop();
    let manager = manager(&source);
    let mut events = manager.subscribe();

    manager.force_refresh();
    assert_eq!(events.recv().await.unwrap().name(), EngineEvent::UPDATE);
    assert_eq!(manager.snapshot().len(), 4);
    assert!(!manager.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_search_matches_command_line_arguments() {
    let source = desktop();
    source.insert(
        MockProcess::new(1200, "python3")
            .user("alice")
            .exe("/home/alice/.venv/bin/python3")
            .cmdline(&["python3", "manage.py", "runserver", "--port=8000"]),
    );
    let manager = manager(&source);
    manager.refresh_now().await.unwrap();

    let detail = manager.snapshot().get(1200).cloned().unwrap();
    assert_eq!(detail.cmdline, "python3 manage.py runserver --port=8000");

    for term in ["RunServer", "manage.py", "port=8000"] {
        let options = QueryOptions {
            search_term: term.to_string(),
            ..Default::default()
        };
        let result = manager.get_processes(&options).unwrap();
        let pids: Vec<u32> = result.items.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![1200], "search {:?}", term);
    }
}
