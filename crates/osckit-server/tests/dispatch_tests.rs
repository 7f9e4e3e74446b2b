//! Dispatch table tests

use osckit_core::{OscValue, PatternCache};
use osckit_server::{dispatch, Callback, CallbackEntry, DispatchTable, Request, SocketId};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;

fn sender() -> SocketAddr {
    "127.0.0.1:5000".parse().unwrap()
}

/// Callback recording a label each time it runs
fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, label: &'static str) -> Callback {
    let log = Arc::clone(log);
    Callback::new(move |_| {
        log.lock().push(label);
        Ok(())
    })
}

fn run(table: &DispatchTable, socket: SocketId, address: &[u8]) {
    let values = [OscValue::Int(1)];
    let request = Request::new(address, &values, sender(), socket);
    for group in table.resolve(socket, address) {
        dispatch(&group, &request, true).unwrap();
    }
}

#[test]
fn test_same_callback_bound_once() {
    let sock = SocketId::new(1);
    let log = Arc::new(Mutex::new(Vec::new()));
    let cb = recorder(&log, "cb");

    let mut table = DispatchTable::new(false);
    for _ in 0..3 {
        table.bind(sock, b"/a", cb.clone(), false).unwrap();
    }
    assert_eq!(table.callback_count(sock, b"/a"), 1);

    run(&table, sock, b"/a");
    assert_eq!(*log.lock(), vec!["cb"]);
}

fn handler(_: &Request<'_>) -> anyhow::Result<()> {
    Ok(())
}

#[test]
fn test_same_function_bound_once() {
    let sock = SocketId::new(1);
    let mut table = DispatchTable::new(false);
    table.bind(sock, b"/a", Callback::new(handler), false).unwrap();
    table.bind(sock, b"/a", Callback::new(handler), false).unwrap();
    assert_eq!(table.callback_count(sock, b"/a"), 1);

    table.unbind(sock, b"/a", &Callback::new(handler));
    assert_eq!(table.callback_count(sock, b"/a"), 0);
}

#[test]
fn test_capturing_closures_are_distinct() {
    let sock = SocketId::new(1);
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut table = DispatchTable::new(false);
    table.bind(sock, b"/a", recorder(&log, "x"), false).unwrap();
    table.bind(sock, b"/a", recorder(&log, "x"), false).unwrap();
    assert_eq!(table.callback_count(sock, b"/a"), 2);
}

#[test]
fn test_bind_order_within_group() {
    let sock = SocketId::new(1);
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut table = DispatchTable::new(false);
    table.bind(sock, b"/a", recorder(&log, "first"), false).unwrap();
    table.bind(sock, b"/a", recorder(&log, "second"), true).unwrap();
    table.bind(sock, b"/a", recorder(&log, "third"), false).unwrap();

    run(&table, sock, b"/a");
    assert_eq!(*log.lock(), vec!["first", "second", "third"]);
}

#[test]
fn test_sockets_are_separate() {
    let one = SocketId::new(1);
    let two = SocketId::new(2);
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut table = DispatchTable::new(true);
    table.bind(one, b"/a", recorder(&log, "one"), false).unwrap();
    table.bind(two, b"/*", recorder(&log, "two"), false).unwrap();

    run(&table, one, b"/a");
    run(&table, two, b"/a");
    run(&table, two, b"/b");
    assert_eq!(*log.lock(), vec!["one", "two", "two"]);

    table.remove_socket(two);
    assert!(table.resolve(two, b"/a").is_empty());
    assert_eq!(table.resolve(one, b"/a").len(), 1);
}

#[test]
fn test_pattern_table() {
    let sock = SocketId::new(1);
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut table = DispatchTable::new(true);
    table.bind(sock, b"/test?", recorder(&log, "q"), false).unwrap();
    table.bind(sock, b"/t[^ea]st", recorder(&log, "class"), false).unwrap();
    table.bind(sock, b"/{str1,str2}", recorder(&log, "alt"), false).unwrap();

    let fires = |address: &[u8]| table.resolve(sock, address).len();
    assert_eq!(fires(b"/testa"), 1);
    assert_eq!(fires(b"/testi"), 1);
    assert_eq!(fires(b"/test"), 0);
    assert_eq!(fires(b"/testaa"), 0);
    assert_eq!(fires(b"/tist"), 1);
    assert_eq!(fires(b"/tost"), 1);
    assert_eq!(fires(b"/tast"), 0);
    assert_eq!(fires(b"/str1"), 1);
    assert_eq!(fires(b"/str2"), 1);
    assert_eq!(fires(b"/str3"), 0);
}

#[test]
fn test_shared_pattern_cache() {
    let cache = Arc::new(PatternCache::new());
    let mut a = DispatchTable::with_cache(true, Arc::clone(&cache));
    let mut b = DispatchTable::with_cache(true, Arc::clone(&cache));
    let cb = Callback::new(|_| Ok(()));

    a.bind(SocketId::new(1), b"/synth/*/freq", cb.clone(), false)
        .unwrap();
    b.bind(SocketId::new(1), b"/synth/*/freq", cb, false).unwrap();
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_default_only_without_match() {
    let sock = SocketId::new(1);
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut table = DispatchTable::new(false);
    table.bind(sock, b"/a", recorder(&log, "bound"), false).unwrap();
    table.set_default(Some(recorder(&log, "default")));

    run(&table, sock, b"/a");
    run(&table, sock, b"/b");
    assert_eq!(*log.lock(), vec!["bound", "default"]);

    table.set_default(None);
    assert!(table.resolve(sock, b"/b").is_empty());
}

#[test]
fn test_failing_callback_does_not_stop_the_rest() {
    let sock = SocketId::new(1);
    let log = Arc::new(Mutex::new(Vec::new()));
    let group = vec![
        CallbackEntry {
            callback: Callback::new(|_| anyhow::bail!("nope")),
            wants_address: false,
        },
        CallbackEntry {
            callback: recorder(&log, "after"),
            wants_address: false,
        },
    ];
    let request = Request::new(b"/a", &[], sender(), sock);
    assert!(dispatch(&group, &request, true).is_ok());
    assert_eq!(*log.lock(), vec!["after"]);
}
