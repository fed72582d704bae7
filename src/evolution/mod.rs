pub mod driver;
pub mod history;
pub mod mutation;
pub mod reproduction;
pub mod rng;
pub mod selection;

pub use driver::EvolutionDriver;
