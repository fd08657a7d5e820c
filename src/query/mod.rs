//! Query compiler: query value types and tree-to-term-spec compilation.

pub mod compiler;
pub mod tree;

pub use compiler::{compile_query, CompiledNode};
pub use tree::{Query, QueryTree, TermSpec};
