//! Control channel protocol for the Openplanet Remote Build plugin.
//!
//! This crate provides the message types, the wire codec and the TCP channel
//! used to drive a running plugin host.
//!
//! # Architecture
//!
//! - [`protocol`]: Request/Response types and route names
//! - [`transport`]: Codec for length-prefixed responses and unframed requests
//! - [`channel`]: `ControlChannel`, the socket owner
//! - [`error`]: Channel error type
//!
//! # Example
//!
//! ```no_run
//! use tmrb_rpc::{ControlChannel, Request, Route};
//!
//! # async fn example() {
//! let mut channel = ControlChannel::new("127.0.0.1", 30000);
//! if channel.connect().await && channel.send_request(Request::bare(Route::GetStatus)).await {
//!     println!("{}", channel.receive().await);
//! }
//! # }
//! ```

pub mod channel;
pub mod error;
pub mod protocol;
pub mod transport;

pub use channel::{CONNECT_TIMEOUT, ControlChannel, DEFAULT_HOST, IO_TIMEOUT, read_frame};
pub use error::ChannelError;
pub use protocol::{Payload, PluginSource, PluginType, Request, Response, Route, STATUS_ALIVE};
pub use transport::{CodecError, MAX_FRAME_SIZE, RemoteBuildCodec, encode_frame};
