//! Tabular predictors served by the prediction endpoints.
//!
//! - `TabularModel`: an immutable fitted model loaded from a JSON artifact
//! - `ModelRegistry`: the set of models configured for this process
//! - `therapy` / `risk`: request records and the domain rules around them

mod error;
mod model;
mod preprocess;
mod record;
mod registry;
mod tree;

pub mod risk;
pub mod therapy;

pub use error::ModelError;
pub use model::{EstimatorSpec, ModelArtifact, TabularModel, Task};
pub use preprocess::{HandleUnknown, PreprocessorSpec, TransformerSpec};
pub use record::{Cell, Record};
pub use registry::{ModelRegistry, ModelSummary};
pub use tree::TreeSpec;
