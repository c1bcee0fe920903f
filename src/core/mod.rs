pub mod bootstrap;
pub mod error;
pub mod middleware;
pub mod rate_limit;
pub mod shared;
