use crate::consumer::MessageHandler;
use processor_domain::JobPipeline;
use std::sync::Arc;

/// Create a [`MessageHandler`] that routes each delivery through the
/// pipeline orchestrator
///
/// The pipeline returns a disposition instead of touching the queue, so
/// this adapter stays a thin closure.
pub fn create_pipeline_handler(pipeline: Arc<JobPipeline>) -> MessageHandler {
    Box::new(move |body, delivery| {
        let pipeline = Arc::clone(&pipeline);
        Box::pin(async move { pipeline.handle_message(&body, delivery).await })
    })
}

// Unit tests for the handler need real NATS Message objects, which require
// a live connection; end-to-end behavior is covered by the pipeline
// scenario tests in processor-domain.
