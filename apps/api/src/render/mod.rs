// Report rendering: markdown classification, font metrics and the PDF writer.
// Rendering is CPU-bound; async callers run it inside tokio::task::spawn_blocking.

pub mod markdown;
pub mod metrics;
pub mod writer;

use thiserror::Error;

pub use markdown::{layout_lines, LayoutInstruction};
pub use writer::{Align, DocumentWriter, PageSetup, TextStyle};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("PDF encoding failed: {0}")]
    Encode(String),

    #[error("render worker failed: {0}")]
    Worker(String),
}
