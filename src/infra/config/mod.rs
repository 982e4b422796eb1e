// Configuration infra: the JSON job file.

#[path = "job_file_store.rs"]
pub mod job_file_store;

pub use job_file_store::JobFileStore;
