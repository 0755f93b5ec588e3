pub mod blocks;
pub mod symbols;
pub mod types;

pub use blocks::{BlockExtractor, BlockKind, LineMapEntry, PythonBlock, in_python_block};
pub use symbols::{Scope, ScopeKind, Span, Symbol, SymbolKind, SymbolParser};
pub use types::{infer_expr, infer_return_type};
