pub mod elastic;

pub use elastic::{ElasticConfig, ElasticStats};
