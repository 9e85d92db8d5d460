pub mod activations;
pub mod config;
pub mod error;
pub mod few_shot;
pub mod prompt;
pub mod services;
pub mod simulation;

pub use config::{SimulationType, SimulatorConfig};
pub use error::{PredictorError, PromptError, SimulationError};
pub use simulation::{NeuronSimulator, SequenceSimulation};
