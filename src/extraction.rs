use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ExtractionError;
use crate::models::{AttendanceCount, LeaveTally, TimetableEntry};

/// Upload limit for a single screenshot.
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DocumentKind {
    Timetable,
    Attendance,
    Leaves,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            DocumentKind::Timetable => "timetable",
            DocumentKind::Attendance => "attendance",
            DocumentKind::Leaves => "leaves",
        };
        f.write_str(tag)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimetableExtraction {
    pub schedule: Vec<TimetableEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtractedSubject {
    pub name: String,
    #[serde(deserialize_with = "whole_count")]
    pub attended: u32,
    #[serde(deserialize_with = "whole_count")]
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AttendanceExtraction {
    pub subjects: Vec<ExtractedSubject>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct LeaveExtraction {
    #[serde(default, deserialize_with = "nullable_count")]
    pub cocurricular: u32,
    #[serde(default, deserialize_with = "nullable_count")]
    pub medical: u32,
    #[serde(default)]
    pub attendance: Option<AttendanceCount>,
}

/// Counts arrive as JSON numbers; `25.0` is accepted, `25.5` and `-1` are not.
pub fn whole_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    to_whole_count(value)
}

/// Like [`whole_count`], with `null` read as 0.
pub fn nullable_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<f64>::deserialize(deserializer)? {
        Some(value) => to_whole_count(value),
        None => Ok(0),
    }
}

fn to_whole_count<E: serde::de::Error>(value: f64) -> Result<u32, E> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= f64::from(u32::MAX) {
        Ok(value as u32)
    } else {
        Err(E::custom(format!("expected a whole non-negative count, got {value}")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Timetable(TimetableExtraction),
    Attendance(AttendanceExtraction),
    Leaves(LeaveExtraction),
}

/// A validated screenshot ready to hand to the analysis service.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub path: PathBuf,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn from_path(path: &Path) -> Result<Self, ExtractionError> {
        let mime_type = mime_type_for(path).ok_or_else(|| ExtractionError::UnsupportedImage {
            path: path.to_path_buf(),
        })?;

        let io_err = |source| ExtractionError::Io {
            path: path.to_path_buf(),
            source,
        };
        let size = std::fs::metadata(path).map_err(io_err)?.len();
        if size > MAX_IMAGE_BYTES {
            return Err(ExtractionError::ImageTooLarge {
                path: path.to_path_buf(),
                size,
                limit: MAX_IMAGE_BYTES,
            });
        }
        if size == 0 {
            return Err(ExtractionError::EmptyImage {
                path: path.to_path_buf(),
            });
        }

        let bytes = std::fs::read(path).map_err(io_err)?;
        Ok(Self {
            path: path.to_path_buf(),
            mime_type,
            bytes,
        })
    }
}

fn mime_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

/// The external image-analysis collaborator. Returns the raw JSON text.
pub trait AnalysisService {
    fn analyze(&self, kind: DocumentKind, image: &ImagePayload) -> Result<String, ExtractionError>;
}

/// Replays service responses captured beside each screenshot as `<stem>.json`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SidecarService;

impl AnalysisService for SidecarService {
    fn analyze(&self, kind: DocumentKind, image: &ImagePayload) -> Result<String, ExtractionError> {
        let response = image.path.with_extension("json");
        debug!(
            %kind,
            image = %image.path.display(),
            mime = image.mime_type,
            bytes = image.bytes.len(),
            response = %response.display(),
            "reading captured response"
        );
        std::fs::read_to_string(&response).map_err(|source| ExtractionError::Io {
            path: response,
            source,
        })
    }
}

/// Parse service output for `kind`, tolerating markdown code fences.
pub fn parse_extraction(kind: DocumentKind, text: &str) -> Result<Extraction, ExtractionError> {
    let cleaned = text.replace("```json", "").replace("```", "");
    let malformed = |reason: String| ExtractionError::Malformed { kind, reason };

    let value: Value =
        serde_json::from_str(cleaned.trim()).map_err(|e| malformed(e.to_string()))?;
    if let Some(message) = value.get("error").and_then(Value::as_str) {
        return Err(ExtractionError::ServiceFailure(message.to_string()));
    }

    let extraction = match kind {
        DocumentKind::Timetable => serde_json::from_value(value).map(Extraction::Timetable),
        DocumentKind::Attendance => serde_json::from_value(value).map(Extraction::Attendance),
        DocumentKind::Leaves => serde_json::from_value(value).map(Extraction::Leaves),
    };
    extraction.map_err(|e| malformed(e.to_string()))
}

pub fn analyze_document(
    service: &dyn AnalysisService,
    kind: DocumentKind,
    image: &ImagePayload,
) -> Result<Extraction, ExtractionError> {
    let text = service.analyze(kind, image)?;
    parse_extraction(kind, &text)
}

/// Sum leave counts; the first extraction carrying attendance wins.
pub fn fold_leaves<I>(results: I) -> LeaveTally
where
    I: IntoIterator<Item = LeaveExtraction>,
{
    results
        .into_iter()
        .fold(LeaveTally::default(), |mut tally, result| {
            tally.cocurricular = tally.cocurricular.saturating_add(result.cocurricular);
            tally.medical = tally.medical.saturating_add(result.medical);
            if tally.attendance.is_none() {
                tally.attendance = result.attendance;
            }
            tally
        })
}

/// Analyze each screenshot in turn; failed images are logged and skipped.
pub fn analyze_leaves(service: &dyn AnalysisService, images: &[PathBuf]) -> LeaveTally {
    let results = images.iter().filter_map(|path| {
        let outcome = ImagePayload::from_path(path)
            .and_then(|image| analyze_document(service, DocumentKind::Leaves, &image));
        match outcome {
            Ok(Extraction::Leaves(leaves)) => Some(leaves),
            Ok(other) => {
                warn!(path = %path.display(), ?other, "unexpected extraction kind");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping leave screenshot");
                None
            }
        }
    });
    fold_leaves(results)
}
