//! Conversion worker communication.
//!
//! AsciiDoc conversion is slow and synchronous, so it runs off the caller's
//! task in a worker: a child process or a dedicated thread. The
//! [`AsciidocConverter`] client sits in front of it and turns concurrent
//! `convert` calls into a strictly sequential stream of requests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 AsciidocConverter (Rust + Tokio)                │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │                 Dispatcher task                           │  │
//! │  │  - FIFO queue of pending calls                            │  │
//! │  │  - at most one request in flight                          │  │
//! │  │  - next reply settles the call in flight                  │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! │                              │                                  │
//! │          ConvertRequest      │      Reply | Error | Exit        │
//! │                              ▼                                  │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │   ProcessWorker (NDJSON over stdio)  |  ThreadWorker (channels) │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use adoc_content::worker::{AsciidocConverter, ConvertRequest};
//!
//! let converter = AsciidocConverter::spawn_with_settings(&settings).await?;
//! let mut exits = converter.subscribe_exit();
//!
//! let doc = converter.convert(ConvertRequest::new("src/blog/post.adoc")).await?;
//! println!("{}", doc.html);
//!
//! converter.terminate().await?;
//! ```

mod client;
mod error;
pub mod process;
pub mod protocol;
mod thread;
mod transport;

pub use client::{AsciidocConverter, QueueStats};
pub use error::{ConverterError, ConverterResult};
pub use process::ProcessWorker;
pub use protocol::{
    AttributeValue, ConvertReply, ConvertRequest, Heading, InitOptions, ProcessorOptions,
    WorkerMessage,
};
pub use thread::ThreadWorker;
pub use transport::{ExitEvent, WorkerEvent, WorkerTransport};
