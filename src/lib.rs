pub mod audit;
pub mod blocks;
pub mod css;
pub mod docx;
mod error;
pub mod html;
pub mod model;
pub mod package;
pub mod profile;
pub mod render;
pub mod tree;

pub use error::{Diagnostic, Error, Result};
pub use model::DocumentModel;
pub use package::Package;
pub use profile::{WordStyleProfile, extract};
pub use render::{ApplyOptions, ApplyReport, apply_render_model};
pub use tree::{Dom, MeasurementOracle, NodeRef, UnmeasuredOracle, VisualTree};

use std::path::Path;
use std::time::Instant;

/// Parse DOCX bytes into a document model. `source_name` labels logs and the profile.
pub fn parse_bytes(bytes: &[u8], source_name: &str) -> Result<DocumentModel> {
    let t0 = Instant::now();
    let package = Package::open(bytes)?;
    let t_open = t0.elapsed();
    let model = docx::build(&package, source_name)?;
    let t_total = t0.elapsed();

    log::info!(
        "Timing: open={:.1}ms, build={:.1}ms, total={:.1}ms ({} input bytes)",
        t_open.as_secs_f64() * 1000.0,
        (t_total - t_open).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        bytes.len(),
    );
    Ok(model)
}

/// Parse a DOCX file from disk.
pub fn parse_path(path: &Path) -> Result<DocumentModel> {
    let t0 = Instant::now();
    let package = Package::open_path(path)?;
    let model = docx::build(&package, &source_name(path))?;
    log::info!(
        "Timing: parse {} in {:.1}ms",
        path.display(),
        t0.elapsed().as_secs_f64() * 1000.0
    );
    Ok(model)
}

/// Parse a DOCX file with the read going through `tokio::fs`.
#[cfg(feature = "async")]
pub async fn parse_path_async(path: &Path) -> Result<DocumentModel> {
    let package = Package::open_path_async(path).await?;
    docx::build(&package, &source_name(path))
}

/// Style baseline of a DOCX file: parse and extract in one step.
pub fn extract_profile(bytes: &[u8], source_name: &str) -> Result<WordStyleProfile> {
    let model = parse_bytes(bytes, source_name)?;
    Ok(extract(&model))
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
