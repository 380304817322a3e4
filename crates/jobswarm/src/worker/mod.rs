pub mod portal_worker;
pub mod quota;

pub use portal_worker::{CycleReport, PortalWorker, WorkerSettings, WorkerState};
pub use quota::QuotaState;
