pub mod app;
pub mod embedder;
pub mod error;
pub mod knowledge;
pub mod lang_graph;
pub mod llm;
pub mod logging;
pub mod settings;
pub mod vector_db;
pub mod web;

#[cfg(test)]
mod testing;
