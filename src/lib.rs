//! # adoc-content
//!
//! AsciiDoc documents as static-site content entries.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          Host pipeline (build / dev server)              │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [session]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Session: transform, entry info, include graph          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [worker]
//! ┌─────────────────────────────────────────────────────────┐
//! │   AsciidocConverter: FIFO queue, one request in flight   │
//! └─────────────────────────────────────────────────────────┘
//!                          │  NDJSON / channels
//!                          ▼ [processor]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Worker: asciidoctor, front matter, headings, includes  │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod frontmatter;
pub mod processor;
pub mod session;
pub mod telemetry;
pub mod worker;

pub use config::Settings;
pub use session::{ContentEntry, Session, SessionError, SessionMode};
pub use worker::{AsciidocConverter, ConvertReply, ConvertRequest, ConverterError};
