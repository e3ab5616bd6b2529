pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod github;
pub mod markdown_parser;
pub mod output;
pub mod render;
pub mod run;
