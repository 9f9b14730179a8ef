mod common;

use std::sync::Arc;

use mcr_core::{McrError, SamplingEngine};
use mcr_mcmc::session::{ExtendTask, WorkerTask};
use mcr_mcmc::{run, run_with_diagnostic, LoopState, WorkerPool};
use serde_json::json;

use common::{engine, offset_inits, stub_config, stub_request, ScriptedDiagnostic};

#[test]
fn pool_spawns_one_worker_per_chain_in_index_order() {
    let (_, shared) = engine();
    let pool = WorkerPool::acquire(4, shared).unwrap();
    let ids: Vec<usize> = pool.worker_ids().iter().map(|id| id.index()).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);
    assert_eq!(pool.len(), 4);
    pool.release();
}

#[test]
fn empty_pool_is_rejected() {
    let (_, shared) = engine();
    let err = WorkerPool::acquire(0, shared).err().unwrap();
    assert!(matches!(err, McrError::Config(_)));
    assert_eq!(err.info().code, "pool-size");
}

#[test]
fn dispatch_requires_one_task_per_worker() {
    let (_, shared) = engine();
    let pool = WorkerPool::acquire(2, shared).unwrap();
    let err = pool.dispatch(Vec::new()).unwrap_err();
    assert_eq!(err.info().code, "dispatch-size");
}

#[test]
fn extension_before_build_reports_missing_session() {
    let (_, shared) = engine();
    let pool = WorkerPool::acquire(2, shared).unwrap();
    let task = WorkerTask::Extend(ExtendTask {
        n_rburn: 0,
        n_draw: 5,
        n_thin: 1,
        params: vec!["theta".to_string()].into(),
    });
    let err = pool.dispatch(vec![task.clone(), task]).unwrap_err();
    assert_eq!(err.info().code, "session-missing");
    assert_eq!(err.info().context.get("worker").map(String::as_str), Some("0"));
}

#[test]
fn successful_run_releases_every_session() {
    let (stub, shared) = engine();
    let config = stub_config(3);
    let outcome = run(shared, &stub_request(offset_inits(3)), &config).unwrap();
    assert_eq!(outcome.merged.len(), 3);
    assert_eq!(stub.counters.built(), 3);
    assert_eq!(stub.counters.dropped(), 3);
}

#[test]
fn build_failure_aborts_run_and_releases_pool() {
    let (stub, shared) = engine();
    let config = stub_config(3);
    let mut inits = offset_inits(3);
    inits[1] = json!({ "invalid": true });
    let err = run(shared, &stub_request(inits), &config).unwrap_err();
    assert!(matches!(err, McrError::Model(_)));
    assert_eq!(err.info().context.get("worker").map(String::as_str), Some("1"));
    assert_eq!(stub.counters.built(), 2);
    assert_eq!(stub.counters.dropped(), 2);
}

#[test]
fn first_error_by_worker_index_wins() {
    let (_, shared) = engine();
    let config = stub_config(3);
    let inits = vec![
        json!({ "offset": 0.0 }),
        json!({ "fail_on_draw": 1 }),
        json!({ "invalid": true }),
    ];
    let err = run(shared, &stub_request(inits), &config).unwrap_err();
    assert!(matches!(err, McrError::Sampling(_)));
    assert_eq!(err.info().context.get("worker").map(String::as_str), Some("1"));
}

#[test]
fn failure_in_extension_round_releases_pool() {
    let (stub, shared) = engine();
    let mut config = stub_config(2);
    config.extra = true;
    config.n_max = Some(10_000);
    let mut inits = offset_inits(2);
    inits[0] = json!({ "offset": 0.0, "fail_on_draw": 2 });
    let diagnostic = ScriptedDiagnostic::new(&[1.5]);
    let err = run_with_diagnostic(shared, &stub_request(inits), &config, &diagnostic).unwrap_err();
    assert_eq!(err.info().code, "stub-draw");
    assert_eq!(stub.counters.built(), 2);
    assert_eq!(stub.counters.dropped(), 2);
}

#[test]
fn worker_panic_becomes_worker_error() {
    let (stub, shared) = engine();
    let config = stub_config(2);
    let mut inits = offset_inits(2);
    inits[1] = json!({ "panic_on_draw": 1 });
    let err = run(shared, &stub_request(inits), &config).unwrap_err();
    assert!(matches!(err, McrError::Worker(_)));
    assert_eq!(err.info().code, "worker-panic");
    assert_eq!(stub.counters.dropped(), stub.counters.built());
}

#[test]
fn budget_exhaustion_releases_pool() {
    let (stub, shared) = engine();
    let mut config = stub_config(2);
    config.extra = true;
    config.n_max = Some(400);
    let diagnostic = ScriptedDiagnostic::new(&[1.5]);
    let outcome =
        run_with_diagnostic(shared, &stub_request(offset_inits(2)), &config, &diagnostic).unwrap();
    assert_eq!(outcome.terminal, LoopState::BudgetExhausted);
    assert_eq!(stub.counters.built(), 2);
    assert_eq!(stub.counters.dropped(), 2);
}

#[test]
fn dropping_pool_without_release_joins_workers() {
    let (stub, shared) = engine();
    {
        let pool = WorkerPool::acquire(2, Arc::clone(&shared)).unwrap();
        assert_eq!(pool.len(), 2);
    }
    assert_eq!(stub.counters.built(), 0);
    assert_eq!(shared.name(), "stub");
}
