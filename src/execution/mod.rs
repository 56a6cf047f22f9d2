//! Execution core: polling, pagination, orchestration and freshness checks.

pub mod freshness;
pub mod orchestrator;
pub mod pagination;
pub mod poller;

pub use freshness::{age_in_hours, is_stale, FreshnessFetcher};
pub use orchestrator::Orchestrator;
pub use pagination::{drain, PageFetcher, Paginated, ResultFormat};
pub use poller::{PollOptions, StatusPoller};
