pub mod download;
pub mod list;
pub mod populate;
pub mod process;
pub mod query;
