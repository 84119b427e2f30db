pub mod arena;
pub mod ast;
pub mod builder;
pub mod eval;
pub mod resolver;
pub mod table;
pub mod types;

#[cfg(test)]
mod tests;
