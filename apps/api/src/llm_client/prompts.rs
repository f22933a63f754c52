// Shared prompt fragments. Each feature that calls the LLM keeps its own
// prompts.rs alongside it; this file only holds cross-cutting instructions.

/// Formatting contract the Markdown Line Renderer understands.
pub const MARKDOWN_FORMAT_INSTRUCTION: &str = "\
    Output clean markdown suitable for PDF conversion: use # for the title, \
    ## for section headers, **bold** and *italics* for emphasis, '- ' for bullets \
    and '1. ' for numbered lists. Do not use tables, code blocks or HTML.";

/// Keeps model output grounded in supplied data instead of invented figures.
pub const DATA_GROUNDING_INSTRUCTION: &str = "\
    Only cite rankings, salaries and statistics that come from tool results or \
    the student's details. If data is unavailable, say so rather than guessing.";
