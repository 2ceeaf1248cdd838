pub mod artifact;
pub mod assembler;
pub mod config;
pub mod document;
pub mod egress;
pub mod error;
pub mod game_logs;
pub mod http_cache;
pub mod http_client;
pub mod lineups;
pub mod outcomes;
pub mod pacing;
pub mod pipeline;
pub mod predictors;
pub mod retry;
pub mod season;
pub mod stats_fetch;
pub mod stats_table;
