//! HTTP client for Hikvision ISAPI recorders.
//!
//! Requests are authenticated with HTTP Digest. The client learns the
//! challenge from the first `401`, answers it, and keeps answering it until
//! the device issues a new one. The same client opens the long-lived
//! `alertStream` response consumed by the stream supervisor.

mod client;
pub mod digest;
mod error;

pub use client::{paths, ClientConfig, EventStream, IsapiClient};
pub use digest::{DigestAuth, DigestChallenge};
pub use error::{ClientError, Result};

pub use reqwest::{Method, StatusCode};
