pub mod cli;
pub mod probe;
