mod utils;
#[allow(unused)]
use utils::*;

use cushion::prelude::*;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::num::NonZeroUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::Instrument;

fn observed_handler(
    index: usize,
    workload: &MockWorkload,
    completion: &Arc<CompletionCounter>,
) -> BenchmarkHandler<ObservedTimer, Requests> {
    let timer = ObservedTimer {
        inner: ConnectionTimer::new(),
        clock: workload.clock.clone(),
        observer: workload.observers[index].clone(),
    };
    BenchmarkHandler::new(index, timer, workload.handler(index), completion.clone())
}

#[tracing_test::traced_test]
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ntest::timeout(30000)]
async fn every_connection_signals_once() {
    const CONNECTIONS: usize = 300;

    for seed in 0..5u64 {
        let mut workload = MockWorkload::new(seed, CONNECTIONS);
        workload.connect_fail_rate = 0.05;
        workload.send_fail_rate = 0.03;
        workload.response_fail_rate = 0.03;
        let workload = Arc::new(workload);
        let completion = Arc::new(CompletionCounter::new(CONNECTIONS));

        let tasks: Vec<_> = (0..CONNECTIONS)
            .map(|index| {
                let workload = workload.clone();
                let completion = completion.clone();
                tokio::spawn(
                    async move {
                        let handler = observed_handler(index, &workload, &completion);
                        match workload.connect(index).await {
                            Ok(connection) => handler.run(connection, Shutdown::never()).await,
                            Err(err) => handler.fail(err).await,
                        }
                    }
                    .in_current_span(),
                )
            })
            .collect();

        completion.wait().await;
        assert_eq!(completion.remaining(), 0);

        let mut faulted = 0;
        for task in tasks {
            let report = task.await.unwrap();
            if report.faulted {
                faulted += 1;
            }
        }
        assert!(faulted > 0, "seed {seed}: no faults were injected");
        assert!(faulted < CONNECTIONS, "seed {seed}: every connection faulted");

        for (index, observer) in workload.observers.iter().enumerate() {
            assert_eq!(observer.timer_stops.load(Ordering::SeqCst), 1, "connection {index}");
            let closes = observer.close_requests.load(Ordering::SeqCst);
            assert!(closes <= 1, "connection {index} requested {closes} closes");
            if closes == 1 {
                assert!(
                    observer.stopped_at.load(Ordering::SeqCst)
                        < observer.close_requested_at.load(Ordering::SeqCst),
                    "connection {index} requested close before stopping its timer"
                );
            }
        }

        assert_eq!(completion.count_down(), Err(CompletionError::Underflow));
    }

    assert!(logs_contain("Connection fault"));
    assert!(!logs_contain("Completion counter is already at zero"));
    assert!(!logs_contain("Close completion in state"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30000)]
async fn benchmark_run_with_faults() {
    const CONNECTIONS: usize = 200;

    let mut workload = MockWorkload::new(99, CONNECTIONS);
    workload.requests = 20;
    workload.connect_fail_rate = 0.1;
    workload.send_fail_rate = 0.02;
    workload.response_fail_rate = 0.02;
    let observers = workload.observers.clone();

    let stats = Benchmark::new(workload, NonZeroUsize::new(CONNECTIONS).unwrap())
        .run()
        .await;

    assert_eq!(stats.connections, CONNECTIONS);
    assert!(stats.faulted > 0);
    let closed = observers
        .iter()
        .filter(|p| p.close_requests.load(Ordering::SeqCst) == 1)
        .count();
    // Every connection that opened released its channel exactly once.
    assert!(observers
        .iter()
        .all(|p| p.close_requests.load(Ordering::SeqCst) <= 1));
    assert!(closed > CONNECTIONS / 2);
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Response,
    Error,
    Close,
    CloseComplete,
}

/// Delivers lifecycle callbacks for many connections in a random global order, including
/// duplicate closes, errors after close and duplicate close completions.
#[test]
fn callback_interleavings_decrement_once() {
    const CONNECTIONS: usize = 64;

    for seed in 0..200u64 {
        let mut rng = SmallRng::seed_from_u64(seed);
        let workload = MockWorkload::new(seed, CONNECTIONS);
        let completion = Arc::new(CompletionCounter::new(CONNECTIONS));

        let mut handlers: Vec<_> = (0..CONNECTIONS)
            .map(|index| observed_handler(index, &workload, &completion))
            .collect();
        let mut connections: Vec<_> = (0..CONNECTIONS)
            .map(|index| MockConnection {
                rng: SmallRng::seed_from_u64(seed + index as u64),
                fail_rate: 0.,
                clock: workload.clock.clone(),
                observer: workload.observers[index].clone(),
            })
            .collect();

        // Per-connection scripts, then a random merge that keeps each script's order.
        let mut scripts: Vec<Vec<Step>> = (0..CONNECTIONS)
            .map(|_| {
                let mut script = vec![Step::Response; rng.gen_range(0..4)];
                if rng.gen_bool(0.5) {
                    script.push(Step::Error);
                }
                script.push(Step::Close);
                if rng.gen_bool(0.3) {
                    script.push(Step::Error);
                }
                if rng.gen_bool(0.3) {
                    script.push(Step::Close);
                }
                script.push(Step::CloseComplete);
                if rng.gen_bool(0.3) {
                    script.push(Step::CloseComplete);
                }
                script.reverse();
                script
            })
            .collect();
        let mut order: Vec<usize> = scripts
            .iter()
            .enumerate()
            .flat_map(|(index, script)| std::iter::repeat(index).take(script.len()))
            .collect();
        order.shuffle(&mut rng);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let _guard = runtime.enter();

        let mut closed = vec![false; CONNECTIONS];
        for handler in handlers.iter_mut() {
            handler.on_open();
        }
        for index in order {
            let step = scripts[index].pop().unwrap();
            let handler = &mut handlers[index];
            let connection = &mut connections[index];
            match step {
                Step::Response => {
                    let _ = handler.on_response(1);
                }
                Step::Error => {
                    let _ = handler.on_error(
                        connection,
                        ConnectionError::Malformed("injected".to_string()),
                    );
                }
                Step::Close => {
                    let _ = handler.close(connection);
                }
                Step::CloseComplete => {
                    let before = completion.remaining();
                    if handler.on_close_complete(Ok(())) {
                        assert!(!closed[index], "seed {seed}: connection {index} closed twice");
                        closed[index] = true;
                        assert_eq!(completion.remaining(), before - 1);
                    } else {
                        assert_eq!(completion.remaining(), before);
                    }
                }
            }

            let open = closed.iter().filter(|c| !**c).count();
            assert_eq!(completion.remaining(), open, "seed {seed}");
        }

        assert!(closed.iter().all(|c| *c));
        assert!(handlers
            .iter()
            .all(|h| h.state() == ConnectionState::Closed));
        drop(handlers);
        assert_eq!(completion.remaining(), 0);
        for observer in workload.observers.iter() {
            assert_eq!(observer.timer_stops.load(Ordering::SeqCst), 1);
            assert_eq!(observer.close_requests.load(Ordering::SeqCst), 1);
            assert!(
                observer.stopped_at.load(Ordering::SeqCst)
                    < observer.close_requested_at.load(Ordering::SeqCst)
            );
        }
    }
}
