pub mod config;
pub mod domain;
pub mod numerics;
pub mod parser;
pub mod path;
pub mod sampler;
pub mod serialization;
pub mod workflows;
