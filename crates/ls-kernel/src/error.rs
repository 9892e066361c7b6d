use ls_core::{EntityId, GroupId, WorkerId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("invalid kernel configuration: {0}")]
    Config(String),

    #[error("work groups have not been started")]
    NotStarted,

    #[error("work groups are already running")]
    AlreadyStarted,

    #[error("shared barriers have not been initialized")]
    BarriersNotInitialized,

    #[error("shared barriers are already initialized")]
    BarriersAlreadyInitialized,

    #[error("group {0} does not exist")]
    InvalidGroupReference(GroupId),

    #[error("worker {worker} is not a member of group {group}")]
    InvalidWorkerReference { group: GroupId, worker: WorkerId },

    #[error("entity {entity} is not managed by worker {worker}")]
    EntityNotFound { entity: EntityId, worker: WorkerId },

    #[error("structural changes are not allowed while workers are running")]
    WorkersRunning,

    #[error("simulation was interrupted")]
    Interrupted,

    #[error("failed to spawn worker thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),

    #[error("worker {0} panicked")]
    WorkerPanicked(WorkerId),
}

pub type KernelResult<T> = Result<T, KernelError>;
