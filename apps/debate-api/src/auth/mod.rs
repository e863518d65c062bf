pub mod middleware;
pub mod provision;
pub mod tokens;
