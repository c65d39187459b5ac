mod client;
mod line_buffer;
mod traits;

pub use client::HttpProxyClient;
pub use line_buffer::LineBuffer;
pub use traits::{ChatRequest, LineStream, ProxyClient};
