use convertr_core::Config;
use convertr_processing::{ConversionManager, IntakeValidator};
use convertr_storage::Storage;
use convertr_worker::{ConversionQueue, WorkerContext};
use std::sync::Arc;

/// Shared state handed to every handler
pub struct AppState {
    pub config: Config,
    pub worker: WorkerContext,
    pub queue: ConversionQueue,
    pub validator: IntakeValidator,
}

impl AppState {
    /// Wire the worker context and spawn the conversion worker pool.
    /// Must be called from within a tokio runtime.
    pub fn new(config: Config, storage: Arc<dyn Storage>, manager: ConversionManager) -> Self {
        let worker = WorkerContext::new(storage, manager, config.public_base_url.clone());
        let queue = ConversionQueue::new(
            worker.clone(),
            config.max_concurrent_conversions,
            config.conversion_queue_size,
        );
        let validator = IntakeValidator::new(config.max_file_size_bytes, config.strict_formats);

        Self {
            config,
            worker,
            queue,
            validator,
        }
    }
}
