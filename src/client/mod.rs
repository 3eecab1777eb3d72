// HTTP client for the Oadin daemon
//
// Provides OadinClient with one method per daemon endpoint, plus the shared
// reader for line-framed streaming responses.

mod oadin_client;
pub mod streaming;

pub use oadin_client::OadinClient;
pub use streaming::{finished_flag, read_event_stream, status_sentinel, StreamEvent, StreamSummary};
