pub mod aggregate;
pub mod archive;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod graph;
pub mod manifest;
pub mod model;
pub mod report;
pub mod resolver;
