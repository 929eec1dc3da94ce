pub mod assistant;
pub mod http;
