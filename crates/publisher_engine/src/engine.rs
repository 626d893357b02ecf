use std::io;

use publisher_core::{publish_store, PublishStore, WorkflowState};
use tokio::runtime::{Builder, Handle, Runtime};

use crate::middleware::{Collaborators, PublishMiddleware};
use crate::PublishSettings;

/// Owns the runtime that executes archive, upload, poll and login-wait tasks.
///
/// Stores built here keep dispatching from those tasks; drop the engine after
/// the stores it produced.
pub struct PublishEngine {
    runtime: Runtime,
}

impl PublishEngine {
    pub fn new() -> io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("publisher-engine")
            .enable_all()
            .build()?;
        Ok(Self { runtime })
    }

    pub fn handle(&self) -> Handle {
        self.runtime.handle().clone()
    }

    pub fn middleware(&self, settings: PublishSettings, deps: Collaborators) -> PublishMiddleware {
        PublishMiddleware::new(settings, deps, self.handle())
    }

    /// Store with the publish middleware installed in front of the reducer.
    pub fn build_store(
        &self,
        settings: PublishSettings,
        deps: Collaborators,
        initial: WorkflowState,
    ) -> PublishStore {
        publish_store(initial).with_middleware(self.middleware(settings, deps))
    }
}
