pub mod allocator;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod grouping;
pub mod pairing;
pub mod report;
pub mod server;
pub mod store;
