use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("graph has no nodes")]
    EmptyGraph,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("simulation has not been started")]
    NotStarted,

    #[error("unknown node id: {0}")]
    UnknownNode(String),

    #[error("simulation worker disconnected")]
    WorkerDisconnected,
}
