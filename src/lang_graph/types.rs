pub mod query;
pub mod state;
