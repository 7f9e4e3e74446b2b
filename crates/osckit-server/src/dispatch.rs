//! Dispatch table
//!
//! Maps `(socket, address)` keys to ordered callback lists. In exact mode a
//! received address is looked up directly; in pattern mode every bound key is
//! a compiled address pattern and all matching keys fire, in bind order.

use osckit_core::{PatternCache, SmartAddress};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::error;

use crate::callback::{Callback, Request};
use crate::error::Result;

/// Identifies one socket of a server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(u64);

impl SocketId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "socket#{}", self.0)
    }
}

/// A callback as bound to one key
#[derive(Debug, Clone)]
pub struct CallbackEntry {
    pub callback: Callback,
    /// Pass the matched address to the callback
    pub wants_address: bool,
}

/// Callbacks that fire together for one matched key, in bind order
pub type CallbackGroup = Vec<CallbackEntry>;

struct Binding {
    address: Vec<u8>,
    pattern: Option<Arc<SmartAddress>>,
    callbacks: CallbackGroup,
}

#[derive(Default)]
struct SocketRoutes {
    bindings: Vec<Binding>,
    index: HashMap<Vec<u8>, usize>,
}

/// Route table for one server
pub struct DispatchTable {
    advanced: bool,
    patterns: Arc<PatternCache>,
    sockets: HashMap<SocketId, SocketRoutes>,
    default: Option<Callback>,
}

impl DispatchTable {
    /// Create a table; `advanced` selects pattern matching
    pub fn new(advanced: bool) -> Self {
        Self::with_cache(advanced, Arc::new(PatternCache::new()))
    }

    /// Create a table compiling patterns through a shared cache
    pub fn with_cache(advanced: bool, patterns: Arc<PatternCache>) -> Self {
        Self {
            advanced,
            patterns,
            sockets: HashMap::new(),
            default: None,
        }
    }

    pub fn is_advanced(&self) -> bool {
        self.advanced
    }

    /// Handler for messages no key matched
    pub fn set_default(&mut self, callback: Option<Callback>) {
        self.default = callback;
    }

    /// Bind `callback` to `address` on `socket`
    ///
    /// Binding the same callback with the same flag twice is a no-op. In
    /// pattern mode the address is compiled first and compile errors are
    /// returned.
    pub fn bind(
        &mut self,
        socket: SocketId,
        address: &[u8],
        callback: Callback,
        wants_address: bool,
    ) -> Result<()> {
        let pattern = if self.advanced {
            Some(self.patterns.compile(address)?)
        } else {
            None
        };

        let routes = self.sockets.entry(socket).or_default();
        let slot = match routes.index.get(address) {
            Some(&slot) => slot,
            None => {
                routes.bindings.push(Binding {
                    address: address.to_vec(),
                    pattern,
                    callbacks: Vec::new(),
                });
                let slot = routes.bindings.len() - 1;
                routes.index.insert(address.to_vec(), slot);
                slot
            }
        };

        let callbacks = &mut routes.bindings[slot].callbacks;
        if !callbacks
            .iter()
            .any(|e| e.callback.same(&callback) && e.wants_address == wants_address)
        {
            callbacks.push(CallbackEntry {
                callback,
                wants_address,
            });
        }
        Ok(())
    }

    /// Remove `callback` from `address` on `socket`, whatever flag it was
    /// bound with
    ///
    /// The key itself stays, possibly with no callbacks. Returns how many
    /// entries were removed.
    pub fn unbind(&mut self, socket: SocketId, address: &[u8], callback: &Callback) -> usize {
        let Some(routes) = self.sockets.get_mut(&socket) else {
            return 0;
        };
        let Some(&slot) = routes.index.get(address) else {
            return 0;
        };
        let callbacks = &mut routes.bindings[slot].callbacks;
        let before = callbacks.len();
        callbacks.retain(|e| !e.callback.same(callback));
        before - callbacks.len()
    }

    /// Callback groups that should handle `address` received on `socket`
    ///
    /// Keys left without callbacks by `unbind` do not count as matches. The
    /// groups are copies, so the table can be released before they run.
    pub fn resolve(&self, socket: SocketId, address: &[u8]) -> Vec<CallbackGroup> {
        let mut groups = Vec::new();

        if let Some(routes) = self.sockets.get(&socket) {
            if self.advanced {
                groups.extend(
                    routes
                        .bindings
                        .iter()
                        .filter(|b| !b.callbacks.is_empty())
                        .filter(|b| b.pattern.as_ref().is_some_and(|p| p.matches(address)))
                        .map(|b| b.callbacks.clone()),
                );
            } else if let Some(&slot) = routes.index.get(address) {
                let callbacks = &routes.bindings[slot].callbacks;
                if !callbacks.is_empty() {
                    groups.push(callbacks.clone());
                }
            }
        }

        if groups.is_empty() {
            if let Some(default) = &self.default {
                groups.push(vec![CallbackEntry {
                    callback: default.clone(),
                    wants_address: true,
                }]);
            }
        }

        groups
    }

    /// Bound addresses on `socket` that still have callbacks, in bind order
    pub fn addresses(&self, socket: SocketId) -> Vec<Vec<u8>> {
        self.sockets
            .get(&socket)
            .map(|routes| {
                routes
                    .bindings
                    .iter()
                    .filter(|b| !b.callbacks.is_empty())
                    .map(|b| b.address.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of callbacks bound to `address` on `socket`
    pub fn callback_count(&self, socket: SocketId, address: &[u8]) -> usize {
        self.sockets
            .get(&socket)
            .and_then(|routes| routes.index.get(address).map(|&i| &routes.bindings[i]))
            .map(|b| b.callbacks.len())
            .unwrap_or(0)
    }

    /// Forget every binding of `socket`
    pub fn remove_socket(&mut self, socket: SocketId) {
        self.sockets.remove(&socket);
    }
}

/// Run every callback of `group` for `request`
///
/// Callbacks that did not ask for the address get a request without it. With
/// `intercept`, a failing callback is logged and the rest still run;
/// otherwise the first failure is returned.
pub fn dispatch(group: &[CallbackEntry], request: &Request<'_>, intercept: bool) -> Result<()> {
    for entry in group {
        let view = if entry.wants_address {
            *request
        } else {
            request.without_address()
        };
        match entry.callback.invoke(&view) {
            Ok(()) => {}
            Err(err) if intercept => error!("{}", err),
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SOCK: SocketId = SocketId(1);

    fn counter() -> (Callback, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let cb = Callback::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (cb, hits)
    }

    #[test]
    fn test_dedup() {
        let mut table = DispatchTable::new(false);
        let (cb, _) = counter();
        table.bind(SOCK, b"/a", cb.clone(), false).unwrap();
        table.bind(SOCK, b"/a", cb.clone(), false).unwrap();
        assert_eq!(table.callback_count(SOCK, b"/a"), 1);

        table.bind(SOCK, b"/a", cb.clone(), true).unwrap();
        assert_eq!(table.callback_count(SOCK, b"/a"), 2);

        assert_eq!(table.unbind(SOCK, b"/a", &cb), 2);
        assert_eq!(table.callback_count(SOCK, b"/a"), 0);
        assert!(table.addresses(SOCK).is_empty());
    }

    #[test]
    fn test_exact_resolve() {
        let mut table = DispatchTable::new(false);
        let (cb, _) = counter();
        table.bind(SOCK, b"/a/*", cb, false).unwrap();
        assert!(table.resolve(SOCK, b"/a/b").is_empty());
        assert_eq!(table.resolve(SOCK, b"/a/*").len(), 1);
        assert!(table.resolve(SocketId(2), b"/a/*").is_empty());
    }

    #[test]
    fn test_pattern_resolve_order() {
        let mut table = DispatchTable::new(true);
        let (a, _) = counter();
        let (b, _) = counter();
        table.bind(SOCK, b"/synth/*", a.clone(), false).unwrap();
        table.bind(SOCK, b"/synth/[0-9]", b.clone(), false).unwrap();
        table.bind(SOCK, b"/other", b.clone(), false).unwrap();

        let groups = table.resolve(SOCK, b"/synth/4");
        assert_eq!(groups.len(), 2);
        assert!(groups[0][0].callback.same(&a));
        assert!(groups[1][0].callback.same(&b));
    }

    #[test]
    fn test_bad_pattern() {
        let mut table = DispatchTable::new(true);
        let (cb, _) = counter();
        assert!(table.bind(SOCK, b"/bad[", cb, false).is_err());
    }

    #[test]
    fn test_default_handler() {
        let mut table = DispatchTable::new(false);
        let (cb, _) = counter();
        table.set_default(Some(cb.clone()));
        let groups = table.resolve(SOCK, b"/nothing");
        assert_eq!(groups.len(), 1);
        assert!(groups[0][0].wants_address);
        assert!(groups[0][0].callback.same(&cb));
    }

    #[test]
    fn test_emptied_key_falls_back_to_default() {
        let mut table = DispatchTable::new(false);
        let (cb, _) = counter();
        let (fallback, _) = counter();
        table.bind(SOCK, b"/a", cb.clone(), false).unwrap();
        table.unbind(SOCK, b"/a", &cb);
        assert!(table.resolve(SOCK, b"/a").is_empty());

        table.set_default(Some(fallback.clone()));
        let groups = table.resolve(SOCK, b"/a");
        assert!(groups[0][0].callback.same(&fallback));
    }

    #[test]
    fn test_dispatch_isolation() {
        let failing = Callback::new(|_| anyhow::bail!("first fails"));
        let (ok, hits) = counter();
        let group = vec![
            CallbackEntry {
                callback: failing,
                wants_address: false,
            },
            CallbackEntry {
                callback: ok,
                wants_address: false,
            },
        ];
        let sender = "127.0.0.1:1".parse().unwrap();
        let request = Request::new(b"/a", &[], sender, SOCK);

        dispatch(&group, &request, true).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(dispatch(&group, &request, false).is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_error_names_route_for_values_only_callback() {
        let group = vec![CallbackEntry {
            callback: Callback::new(|_| anyhow::bail!("broken")),
            wants_address: false,
        }];
        let sender = "127.0.0.1:1".parse().unwrap();
        let request = Request::new(b"/synth/1", &[], sender, SOCK);
        match dispatch(&group, &request, false) {
            Err(crate::ServerError::Callback { address, message }) => {
                assert_eq!(address, "/synth/1");
                assert_eq!(message, "broken");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_address_only_when_requested() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let cb = Callback::new(move |req| {
            sink.lock().push(req.address().map(<[u8]>::to_vec));
            Ok(())
        });
        let group = vec![
            CallbackEntry {
                callback: cb.clone(),
                wants_address: false,
            },
            CallbackEntry {
                callback: cb,
                wants_address: true,
            },
        ];
        let sender = "127.0.0.1:1".parse().unwrap();
        dispatch(&group, &Request::new(b"/x", &[], sender, SOCK), true).unwrap();
        assert_eq!(*seen.lock(), vec![None, Some(b"/x".to_vec())]);
    }
}
