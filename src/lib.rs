pub mod ast;
pub mod bytecode;
pub mod compiler;
pub mod config;
pub mod fixtures;
pub mod frontend;
pub mod normalize;
pub mod pipeline;
pub mod visit;
pub mod vm;

pub use bytecode::{CompiledUnit, Word};
pub use config::VmConfig;
pub use pipeline::{Pipeline, Prepared};

#[cfg(test)]
mod harness;
