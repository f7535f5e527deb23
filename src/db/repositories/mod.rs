pub mod cache;
pub mod kv;

pub use cache::CacheRepository;
pub use kv::KvRepository;
