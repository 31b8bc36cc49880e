//! Connectivity flag. The host platform owns detection (OS reachability
//! callbacks, request outcomes) and toggles this; the sync engine only
//! reads it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::info;

use ledgerly_core::sync::NetworkMonitor;

pub struct SharedNetworkMonitor {
    online: AtomicBool,
}

impl SharedNetworkMonitor {
    pub fn new(initially_online: bool) -> Arc<Self> {
        Arc::new(Self {
            online: AtomicBool::new(initially_online),
        })
    }

    pub fn set_online(&self, online: bool) {
        let was = self.online.swap(online, Ordering::SeqCst);
        if was != online {
            info!(
                "Connectivity changed: {}",
                if online { "online" } else { "offline" }
            );
        }
    }
}

impl NetworkMonitor for SharedNetworkMonitor {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
