//! Report Assembly: lays out a finished report body as a PDF artifact.
//!
//! Layout is deterministic: the same profile, body and generation time always
//! produce byte-identical output. Only the file name varies between runs.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::profile::StudentProfile;
use crate::render::metrics::FontFace;
use crate::render::{layout_lines, Align, DocumentWriter, LayoutInstruction, PageSetup, RenderError, TextStyle};

pub const REPORT_TITLE: &str = "AI Career Counseling Report";

/// A finished report document. Ownership passes to the storage layer.
#[derive(Debug, Clone)]
pub struct ReportArtifact {
    pub file_name: String,
    pub bytes: Bytes,
    pub size: usize,
}

/// Classifies every body line. Exposed so callers can inspect the layout plan.
pub fn plan_layout(body: &str) -> Vec<LayoutInstruction> {
    layout_lines(body)
}

/// Renders title block plus body into a PDF artifact.
///
/// CPU-bound: async callers should run this inside `spawn_blocking`.
pub fn assemble(
    profile: &StudentProfile,
    owner_id: Uuid,
    body: &str,
    generated_at: DateTime<Utc>,
) -> Result<ReportArtifact, RenderError> {
    let mut writer = DocumentWriter::open(PageSetup::default());
    write_title_block(&mut writer, profile, generated_at);

    for instruction in plan_layout(body) {
        writer.write(&instruction);
    }

    let bytes = writer.close()?;
    Ok(ReportArtifact {
        file_name: artifact_file_name(owner_id, generated_at),
        size: bytes.len(),
        bytes: Bytes::from(bytes),
    })
}

fn write_title_block(writer: &mut DocumentWriter, profile: &StudentProfile, generated_at: DateTime<Utc>) {
    writer.write_text(
        REPORT_TITLE,
        TextStyle::new(FontFace::Bold, 20.0).align(Align::Center),
    );
    writer.move_down(0.5);
    writer.write_text(
        &format!("Generated for: {}", profile.name.trim()),
        TextStyle::new(FontFace::Regular, 12.0).align(Align::Center),
    );
    writer.write_text(
        &format!("Date: {}", generated_at.format("%d %B %Y")),
        TextStyle::new(FontFace::Regular, 10.0).align(Align::Center),
    );
    writer.move_down(1.0);
}

/// `report_<owner>_<unix nanos>_<random>.pdf`, unique across concurrent
/// generations for the same or different owners.
pub fn artifact_file_name(owner_id: Uuid, generated_at: DateTime<Utc>) -> String {
    let nanos = generated_at
        .timestamp_nanos_opt()
        .unwrap_or_else(|| generated_at.timestamp_micros() * 1_000);
    let nonce = Uuid::new_v4().simple().to_string();
    format!("report_{}_{}_{}.pdf", owner_id.simple(), nanos, &nonce[..8])
}
