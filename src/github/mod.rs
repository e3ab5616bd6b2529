pub mod client;
pub mod fetch;
pub mod issues;
pub mod rate_limit;
