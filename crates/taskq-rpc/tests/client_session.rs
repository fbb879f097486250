//! Integration tests driving the RPC client through a shared task queue

use std::cell::Cell;
use std::rc::Rc;
use taskq::{from_fn, TaskError, TaskQueue};
use taskq_rpc::{Client, IndexType, LoopbackTransport, RpcConfig, RpcError};

const ROUNDS: usize = 32;

fn setup(latency: u32) -> (TaskQueue, Client<LoopbackTransport>) {
    (TaskQueue::new(), Client::new(LoopbackTransport::new(latency)))
}

#[test]
fn test_full_table_session() {
    let (mut queue, client) = setup(2);

    client.ping(&mut queue).unwrap().wait(&mut queue, ROUNDS).unwrap();
    client
        .create_table(&mut queue, "users")
        .unwrap()
        .wait(&mut queue, ROUNDS)
        .unwrap();
    let table = client
        .open_table(&mut queue, "users")
        .unwrap()
        .wait(&mut queue, ROUNDS)
        .unwrap();

    let key = client
        .insert(&mut queue, table, b"alice")
        .unwrap()
        .wait(&mut queue, ROUNDS)
        .unwrap();
    client
        .write(&mut queue, table, key, b"alice v2")
        .unwrap()
        .wait(&mut queue, ROUNDS)
        .unwrap();
    let data = client
        .read(&mut queue, table, key)
        .unwrap()
        .wait(&mut queue, ROUNDS)
        .unwrap();
    assert_eq!(data, b"alice v2");

    let index = client
        .create_index(&mut queue, table, IndexType::Bytes, true, true)
        .unwrap()
        .wait(&mut queue, ROUNDS)
        .unwrap();
    client
        .drop_index(&mut queue, table, index)
        .unwrap()
        .wait(&mut queue, ROUNDS)
        .unwrap();
    client
        .drop_table(&mut queue, "users")
        .unwrap()
        .wait(&mut queue, ROUNDS)
        .unwrap();

    assert!(queue.is_idle());
    assert_eq!(queue.task_count(), 0);
    assert_eq!(client.last_error(), None);
}

#[test]
fn test_concurrent_calls_share_rounds() {
    let (mut queue, client) = setup(1);
    client
        .create_table(&mut queue, "t")
        .unwrap()
        .wait(&mut queue, ROUNDS)
        .unwrap();
    let table = client
        .open_table(&mut queue, "t")
        .unwrap()
        .wait(&mut queue, ROUNDS)
        .unwrap();

    let mut pending: Vec<_> = (0..4u8)
        .map(|i| client.insert(&mut queue, table, &[i]).unwrap())
        .collect();
    assert_eq!(queue.outstanding_tasks(), 4);

    // Latency 1: every call needs two rounds, all of them progress together.
    queue.proceed().unwrap();
    assert!(pending.iter().all(|p| !p.is_ready()));
    assert_eq!(queue.outstanding_tasks(), 4);
    queue.proceed().unwrap();
    assert!(pending.iter().all(|p| p.is_ready()));
    assert!(queue.is_idle());

    let keys: Vec<u64> = pending
        .iter_mut()
        .map(|p| p.take(&mut queue).unwrap().unwrap())
        .collect();
    assert_eq!(keys, vec![0, 1, 2, 3]);
    assert_eq!(queue.task_count(), 0);
}

#[test]
fn test_unrelated_tasks_keep_running_while_waiting() {
    let (mut queue, client) = setup(3);
    let ticks = Rc::new(Cell::new(0));

    let counter = ticks.clone();
    let ticker = queue
        .insert(from_fn(move |cx| {
            counter.set(counter.get() + 1);
            cx.reschedule();
            Ok(())
        }))
        .unwrap();
    queue.schedule(ticker).unwrap();

    client.ping(&mut queue).unwrap().wait(&mut queue, ROUNDS).unwrap();
    assert_eq!(ticks.get(), 4);
    assert!(queue.is_scheduled(ticker));
}

#[test]
fn test_failing_neighbour_interrupts_wait() {
    let (mut queue, client) = setup(0);
    let mut pending = client.ping(&mut queue).unwrap();

    let bad = queue
        .insert(from_fn(|_cx| Err(TaskError::failed("disk on fire"))))
        .unwrap();
    queue.schedule(bad).unwrap();

    // The ping task runs first, so its response is recorded before the
    // failure interrupts the round.
    let Err(err) = pending.wait(&mut queue, ROUNDS) else {
        panic!("wait ignored a failing task");
    };
    assert!(matches!(err, RpcError::Task(TaskError::Failed(ref msg)) if msg == "disk on fire"));

    // The interrupted call still holds its response.
    assert!(pending.is_ready());
    pending.wait(&mut queue, ROUNDS).unwrap();
    assert_eq!(queue.task_count(), 1);
    queue.remove(bad).unwrap();
    assert_eq!(queue.task_count(), 0);
}

#[test]
fn test_server_errors_do_not_poison_client() {
    let (mut queue, client) = setup(0);

    let Err(err) = client
        .read(&mut queue, 99, 1)
        .unwrap()
        .wait(&mut queue, ROUNDS)
    else {
        panic!("read from missing table succeeded");
    };
    assert!(matches!(err, RpcError::Server(_)));
    assert!(client.last_error().is_some());

    client.ping(&mut queue).unwrap().wait(&mut queue, ROUNDS).unwrap();
    assert_eq!(queue.task_count(), 0);
}

#[test]
fn test_transport_from_config() {
    let config = RpcConfig {
        loopback_latency: 5,
        max_wait_rounds: 4,
    };
    let mut queue = TaskQueue::new();
    let client = Client::new(LoopbackTransport::from_config(&config));

    let Err(err) = client
        .ping(&mut queue)
        .unwrap()
        .wait(&mut queue, config.max_wait_rounds)
    else {
        panic!("response arrived before the configured latency");
    };
    assert!(matches!(err, RpcError::Stalled { rounds: 4 }));
}
