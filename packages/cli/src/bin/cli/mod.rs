pub mod connections;
pub mod providers;
