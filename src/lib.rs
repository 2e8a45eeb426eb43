pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod rasterize;
pub mod recognize;
pub mod report;
pub mod scheduler;
pub mod serialize;
pub mod util;
pub mod workspace;
