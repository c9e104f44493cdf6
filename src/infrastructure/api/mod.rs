pub mod history;
pub mod stream;
pub mod transport;

pub use history::HistoryLoader;
pub use stream::StreamClient;
pub use stream::StreamHandle;
pub use transport::TransportClient;
