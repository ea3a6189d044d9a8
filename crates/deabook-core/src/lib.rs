pub mod adapter;
pub mod builder;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod model;
pub mod registry;
pub mod result;

pub use adapter::{
    BackendError, DEFAULT_THREAD_LIMIT, SolveOutcome, SolveStatus, SolverAdapter, SolverBackend, Tolerance,
};
pub use builder::{Affine, DeaProblem, VariableLayout};
pub use config::EngineConfig;
pub use dataset::{Dataset, Dmu};
pub use engine::{CancelToken, Engine, UnitStage};
pub use error::DeaError;
pub use model::{
    Direction, DirectionVector, Disposability, Formulation, ModelSpec, Orientation, ParseModelError, ReturnsToScale,
};
pub use result::{
    DimensionValues, EfficiencyResult, Peer, ResultStatus, ResultTable, RunMetadata, RunReport, Summary, UnitFailure,
    UnitOutcome,
};
