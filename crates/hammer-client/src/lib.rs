//! Concrete HTTP(S) transports implementing `hammer_engine::client::HttpClient`.
//!
//! Three variants, one per [`hammer_engine::config::ClientVariant`]:
//! [`Http1Client`] and [`Http2Client`] lean on `reqwest` for TLS and
//! connection handling, while [`FastClient`] dials sockets directly for
//! exact byte accounting at some implementation cost. All three are built
//! from the same [`RequestSpec`], itself derived once from
//! `hammer_engine::config::Settings`.

mod counting;
mod error;
mod fast_client;
mod reqwest_client;
mod spec;
mod tls;

pub use error::ClientError;
pub use fast_client::FastClient;
pub use reqwest_client::{Http1Client, Http2Client};
pub use spec::RequestSpec;
