pub mod reconstruct;
pub mod search;
pub mod upstream;

pub use reconstruct::Reconstructor;
pub use search::TraceSearchService;
pub use upstream::{JaegerClient, TraceQuery, TraceStore};
