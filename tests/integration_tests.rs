//! Integration tests for cpu-load
//!
//! These drive whole pool runs with small budgets, plus the worker and
//! validator halves of the protocol against hand-built channel pairs.

use cpu_load::config::RunConfig;
use cpu_load::error::{ConfigError, LoadError, ProtocolError, WorkerError};
use cpu_load::pool::{
    run_worker, validate_stream, ChannelPair, CompletionBarrier, Control, Data, PoolCoordinator,
    SqrtDrift, Validator, Worker,
};
use std::sync::Arc;

fn collect_stream(validator: &cpu_load::pool::ValidatorEnd) -> Vec<Data> {
    let mut messages = Vec::new();
    loop {
        let message = validator.recv().unwrap();
        messages.push(message);
        if message.is_stop() {
            break;
        }
    }
    messages
}

#[test]
fn test_four_workers_eight_iterations() {
    let config = RunConfig::new(4, 8).unwrap();
    let result = PoolCoordinator::new(config).run(None).unwrap();

    assert_eq!(result.workers.len(), 4);
    for (id, report) in result.workers.iter().enumerate() {
        assert_eq!(report.worker, id);
        assert_eq!(report.iterations, 8);
        assert_eq!(report.progress_sent, 4);
    }
    assert_eq!(result.progress_messages, 16);
}

#[test]
fn test_stream_shape_per_worker() {
    let config = RunConfig::new(3, 8).unwrap();
    let mut streams = Vec::new();
    let mut workers = Vec::new();

    for id in 0..config.worker_count {
        let (control, end, validator) =
            ChannelPair::new(id, config.channel_capacity).into_ends();
        workers.push(
            Worker::spawn(
                end,
                config.iterations,
                config.progress_interval(),
                Arc::new(SqrtDrift),
            )
            .unwrap(),
        );
        control.send(Control::Start).unwrap();
        streams.push(validator);
    }

    for (id, validator) in streams.iter().enumerate() {
        let messages = collect_stream(validator);
        let progress: Vec<u64> = messages
            .iter()
            .filter_map(|m| match m {
                Data::Progress { worker, iteration } => {
                    assert_eq!(*worker, id);
                    Some(*iteration)
                }
                Data::Stop => None,
            })
            .collect();

        assert_eq!(progress, vec![0, 2, 4, 6]);
        assert_eq!(messages.last(), Some(&Data::Stop));
        assert_eq!(messages.len(), 5);
    }

    for worker in workers {
        worker.join().unwrap().unwrap();
    }

    // Workers dropped their senders after Stop: nothing follows it
    for validator in &streams {
        assert_eq!(validator.try_recv(), None);
        assert_eq!(
            validator.recv(),
            Err(ProtocolError::DataChannelClosed {
                worker: validator.worker()
            })
        );
    }
}

#[test]
fn test_progress_count_matches_interval() {
    for iterations in [4u64, 5, 7, 10, 13, 100, 1001] {
        let config = RunConfig::new(2, iterations).unwrap();
        let expected = config.expected_progress_per_worker();
        let ratio = iterations / (iterations / 4);

        let result = PoolCoordinator::new(config).run(None).unwrap();
        for report in &result.workers {
            assert_eq!(report.progress_sent, expected, "B={iterations}");
            assert!(report.progress_sent.abs_diff(ratio) <= 1, "B={iterations}");
        }
    }
}

#[test]
fn test_many_workers_single_slot_channels() {
    let config = RunConfig::new(32, 400)
        .unwrap()
        .with_channel_capacity(1)
        .unwrap();
    let result = PoolCoordinator::new(config).run(None).unwrap();

    assert_eq!(result.workers.len(), 32);
    assert_eq!(result.progress_messages, 32 * 4);
}

#[test]
fn test_single_worker_minimal_budget() {
    let config = RunConfig::new(1, 4).unwrap();
    let result = PoolCoordinator::new(config).run(None).unwrap();
    assert_eq!(result.workers[0].progress_sent, 4);
}

#[test]
fn test_rejected_configurations() {
    assert_eq!(
        RunConfig::new(1, 1),
        Err(ConfigError::InvalidIterationBudget {
            iterations: 1,
            min: 4
        })
    );
    assert_eq!(
        RunConfig::new(0, 1000),
        Err(ConfigError::InvalidWorkerCount { count: 0 })
    );

    let err: LoadError = RunConfig::new(4, 3).unwrap_err().into();
    assert!(matches!(err, LoadError::Config(_)));
}

#[test]
fn test_non_start_token_halts_worker() {
    let (control, end, validator) = ChannelPair::new(0, 4).into_ends();
    let worker = Worker::spawn(end, 1000, 250, Arc::new(SqrtDrift)).unwrap();

    control.send(Control::Stop).unwrap();
    let outcome = worker.join().unwrap();

    assert_eq!(
        outcome,
        Err(ProtocolError::UnexpectedControl {
            worker: 0,
            received: Control::Stop
        })
    );

    // Zero data messages: the channel is closed without a single message
    assert_eq!(
        validator.recv(),
        Err(ProtocolError::DataChannelClosed { worker: 0 })
    );
    assert_eq!(validator.stats().sent(), 0);
}

#[test]
fn test_malformed_stream_faults_barrier() {
    let barrier = CompletionBarrier::new(2);

    // Worker 0 behaves
    let (_c0, good, good_validator) = ChannelPair::new(0, 8).into_ends();
    good.emit(Data::Progress {
        worker: 0,
        iteration: 0,
    })
    .unwrap();
    good.emit(Data::Stop).unwrap();

    // Worker 1's channel carries a progress message tagged for worker 0
    let (_c1, bad, bad_validator) = ChannelPair::new(1, 8).into_ends();
    bad.emit(Data::Progress {
        worker: 0,
        iteration: 0,
    })
    .unwrap();

    let v0 = Validator::spawn(good_validator, barrier.handle()).unwrap();
    let v1 = Validator::spawn(bad_validator, barrier.handle()).unwrap();
    assert_eq!((v0.id(), v1.id()), (0, 1));

    let err = barrier.wait().unwrap_err();
    assert!(matches!(
        err,
        LoadError::Protocol(ProtocolError::ForeignProgress { worker: 1, .. })
    ));

    v0.join().unwrap();
    v1.join().unwrap();
}

#[test]
fn test_validator_accepts_worker_output() {
    let (control, end, validator) = ChannelPair::new(5, 64).into_ends();
    control.send(Control::Start).unwrap();

    let report = run_worker(&end, 20, 5, &SqrtDrift, 5.0).unwrap();
    drop(end);

    let summary = validate_stream(&validator).unwrap();
    assert_eq!(summary.worker, 5);
    assert_eq!(summary.progress_messages, report.progress_sent);
    assert_eq!(summary.last_iteration, Some(15));
}

#[test]
fn test_repeated_runs_are_identical() {
    let run = || {
        let config = RunConfig::new(6, 40).unwrap();
        PoolCoordinator::new(config).run(None).unwrap()
    };

    let first = run();
    let second = run();

    assert_eq!(first.workers, second.workers);
    assert_eq!(first.progress_messages, second.progress_messages);
}

#[test]
fn test_panicking_worker_aborts_run() {
    let config = RunConfig::new(2, 100).unwrap();
    let workload = |worker: usize, state: f64| {
        if worker == 1 {
            panic!("workload failed for worker {}", worker);
        }
        state
    };

    let err = PoolCoordinator::with_workload(config, workload)
        .run(None)
        .unwrap_err();

    match err {
        LoadError::Worker(WorkerError::Panicked { role, id, message }) => {
            assert_eq!(role, "worker");
            assert_eq!(id, 1);
            assert!(message.contains("workload failed"));
        }
        other => panic!("expected worker 1 panic as root cause, got {other:?}"),
    }
}

#[test]
fn test_aborted_runs_report_the_same_cause() {
    for _ in 0..20 {
        let config = RunConfig::new(4, 40).unwrap();
        let workload = |worker: usize, state: f64| {
            if worker == 3 {
                panic!("bad worker");
            }
            state + 1.0
        };

        let err = PoolCoordinator::with_workload(config, workload)
            .run(None)
            .unwrap_err();
        assert!(
            matches!(err, LoadError::Worker(WorkerError::Panicked { id: 3, .. })),
            "got {err:?}"
        );
    }
}
