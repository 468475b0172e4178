mod client;
mod config;
mod job_repository;

pub use client::PostgresClient;
pub use config::PostgresConfig;
pub use job_repository::PostgresJobRepository;
