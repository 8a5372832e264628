pub mod config;
pub mod credentials;
pub mod engine;
pub mod model;
pub mod runner;
pub mod youtube;
