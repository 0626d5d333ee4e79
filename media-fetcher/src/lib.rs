pub mod acquirer;
pub mod extension;
pub mod http;
pub mod retry;

pub use acquirer::{Acquirer, CHUNK_SIZE};
pub use extension::resolve_extension;
pub use http::{ByteStream, FetchRequest, FetchedMedia, HttpMediaSource, MediaSource};
pub use retry::{RetryConfig, RetryExecutor, RetryMetrics};
