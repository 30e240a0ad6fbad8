use containerflow_cloud::memory::InMemoryControlPlane;
use containerflow_cloud::{PassTimeouts, PollConfig, PollingWaiter, Reconciler};
use containerflow_core::DesiredConfig;
use std::sync::Arc;
use std::time::Duration;

pub const FOLDER: &str = "b1gfolder";

pub struct Harness {
    pub plane: Arc<InMemoryControlPlane>,
    pub reconciler: Reconciler,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_reconciler(|r| r.with_default_folder(FOLDER))
    }

    pub fn with_reconciler(configure: impl FnOnce(Reconciler) -> Reconciler) -> Self {
        let plane = Arc::new(InMemoryControlPlane::new());
        let waiter = PollingWaiter::new(plane.clone()).with_config(fast_poll());
        let reconciler = configure(Reconciler::new(plane.clone(), Arc::new(waiter)));
        Self { plane, reconciler }
    }
}

pub fn fast_poll() -> PollConfig {
    PollConfig {
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        multiplier: 2.0,
    }
}

#[allow(dead_code)]
pub fn short_timeouts(timeout: Duration) -> PassTimeouts {
    PassTimeouts {
        create: timeout,
        update: timeout,
        delete: timeout,
        read: timeout,
    }
}

pub fn desired(memory: u64) -> DesiredConfig {
    DesiredConfig::new("api", "cr.yandex/crp/api:1.0", memory).with_label("env", "prod")
}
