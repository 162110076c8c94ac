//! Connectivity monitor: edge detection over online/offline transitions.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

/// A transition edge reported by [`ConnectivityMonitor::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEdge {
    WentOnline,
    WentOffline,
}

/// Tracks the last observed connectivity state and reports edges only.
///
/// The offline edge is purely advisory (the UI shows a persistent offline
/// indicator from the watch channel); the online edge is what the engine
/// uses to schedule a bulk sync. Steady-state observations report nothing.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    online: AtomicBool,
    tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _) = watch::channel(initially_online);
        Self {
            online: AtomicBool::new(initially_online),
            tx,
        }
    }

    /// Record an observation; returns the edge if the state changed.
    pub fn observe(&self, online: bool) -> Option<ConnectivityEdge> {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return None;
        }
        let _ = self.tx.send(online);
        if online {
            Some(ConnectivityEdge::WentOnline)
        } else {
            Some(ConnectivityEdge::WentOffline)
        }
    }

    /// Current state, used to gate writes (local-only vs remote-then-local).
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Subscribe to state changes for the UI indicator.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
