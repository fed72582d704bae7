pub mod chromosome;
pub mod fingerprint;
pub mod gene_instance;
pub mod population;

pub use chromosome::Chromosome;
pub use gene_instance::ChromosomeGene;
pub use population::Population;
