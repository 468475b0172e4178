mod client;
mod completion_producer;
mod consumer;
mod dead_letter_producer;
mod processor;

pub use client::NatsClient;
pub use completion_producer::NatsCompletionPublisher;
pub use consumer::{JobConsumer, MessageHandler};
pub use dead_letter_producer::NatsDeadLetterPublisher;
pub use processor::create_pipeline_handler;
