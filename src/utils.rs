//! Utility functions for turning notebook payloads into image files.
//!
//! Covers file naming (attachment-name sanitising, MIME subtype to extension)
//! and payload handling (fragment joining, lenient base64 decoding).

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde_json::Value;
use std::path::Path;

use crate::error::ExtractError;

/// Standard alphabet, canonical padding, tolerant of stray trailing bits.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::RequireCanonical),
);

/// Whether a MIME type denotes an image.
#[must_use]
pub fn is_image_mime(mime_type: &str) -> bool {
    mime_type.starts_with("image/")
}

/// File extension for an image MIME type.
///
/// Uses the part after the last `/`, except that `svg+xml` becomes `svg`.
#[must_use]
pub fn extension_for_mime(mime_type: &str) -> &str {
    match mime_type.rsplit('/').next().unwrap_or(mime_type) {
        "svg+xml" => "svg",
        subtype => subtype,
    }
}

/// Make an attachment name safe to use inside a file name.
///
/// Alphanumeric characters, `.` and `_` are kept; everything else becomes `_`.
#[must_use]
pub fn sanitize_attachment_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '.' || c == '_' { c } else { '_' })
        .collect()
}

/// Base name of a notebook file without its final extension.
#[must_use]
pub fn notebook_stem(notebook: &str) -> String {
    Path::new(notebook)
        .file_stem()
        .map_or_else(|| notebook.to_string(), |stem| stem.to_string_lossy().into_owned())
}

/// Output name for a markdown attachment.
///
/// `<stem>_md_cell_<cell>_<sanitized>`, plus `.<ext>` when that has no extension.
#[must_use]
pub fn attachment_file_name(stem: &str, cell_index: usize, attachment: &str, mime_type: &str) -> String {
    let name = format!("{stem}_md_cell_{cell_index}_{}", sanitize_attachment_name(attachment));
    if Path::new(&name).extension().is_some() {
        name
    } else {
        format!("{name}.{}", extension_for_mime(mime_type))
    }
}

/// Output name for a code cell output: `<stem>_code_cell_<cell>_output_<output>.<ext>`.
#[must_use]
pub fn output_file_name(stem: &str, cell_index: usize, output_index: usize, mime_type: &str) -> String {
    format!(
        "{stem}_code_cell_{cell_index}_output_{output_index}.{}",
        extension_for_mime(mime_type)
    )
}

/// Base64 text of an attachment payload, which must be a single string.
pub fn attachment_payload(mime_type: &str, payload: &Value) -> Result<String, ExtractError> {
    match payload {
        Value::String(text) => Ok(text.clone()),
        other => Err(malformed(mime_type, "a string", other)),
    }
}

/// Base64 text of a code output payload: a string, or string fragments joined in order.
pub fn output_payload(mime_type: &str, payload: &Value) -> Result<String, ExtractError> {
    match payload {
        Value::String(text) => Ok(text.clone()),
        Value::Array(fragments) => fragments
            .iter()
            .map(|fragment| match fragment {
                Value::String(text) => Ok(text.as_str()),
                other => Err(malformed(mime_type, "a string or an array of strings", other)),
            })
            .collect::<Result<String, _>>(),
        other => Err(malformed(mime_type, "a string or an array of strings", other)),
    }
}

/// Decode base64, discarding characters outside the alphabet (line breaks etc.) first.
pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, ExtractError> {
    let cleaned: String = encoded
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='))
        .collect();
    Ok(LENIENT.decode(cleaned)?)
}

fn malformed(mime_type: &str, expected: &'static str, found: &Value) -> ExtractError {
    let mut preview = found.to_string();
    if preview.len() > 100 {
        let cut = (0..=100).rev().find(|&i| preview.is_char_boundary(i)).unwrap_or(0);
        preview.truncate(cut);
        preview.push_str("...");
    }
    ExtractError::MalformedPayload {
        mime_type: mime_type.to_string(),
        expected,
        found: preview,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_extension_for_mime() {
        assert_eq!(extension_for_mime("image/png"), "png");
        assert_eq!(extension_for_mime("image/jpeg"), "jpeg");
        assert_eq!(extension_for_mime("image/svg+xml"), "svg");
    }

    #[test]
    fn test_sanitize_attachment_name() {
        assert_eq!(sanitize_attachment_name("my chart (1).png"), "my_chart__1_.png");
        assert_eq!(sanitize_attachment_name("image_2.gif"), "image_2.gif");
        assert_eq!(sanitize_attachment_name("../../etc/passwd"), ".._.._etc_passwd");
    }

    #[test]
    fn test_attachment_file_name_keeps_existing_extension() {
        let name = attachment_file_name("01_eda", 3, "plot.png", "image/jpeg");
        assert_eq!(name, "01_eda_md_cell_3_plot.png");
    }

    #[test]
    fn test_attachment_file_name_adds_extension() {
        let name = attachment_file_name("01_eda", 0, "figure one", "image/svg+xml");
        assert_eq!(name, "01_eda_md_cell_0_figure_one.svg");
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            output_file_name("02_segments", 7, 1, "image/png"),
            "02_segments_code_cell_7_output_1.png"
        );
    }

    #[test]
    fn test_notebook_stem() {
        assert_eq!(notebook_stem("05_final_summary_dashboard.ipynb"), "05_final_summary_dashboard");
        assert_eq!(notebook_stem("noext"), "noext");
    }

    #[test]
    fn test_output_payload_joins_fragments() {
        let payload = json!(["aGVs", "bG8="]);
        assert_eq!(output_payload("image/gif", &payload).unwrap(), "aGVsbG8=");
    }

    #[test]
    fn test_output_payload_rejects_numbers() {
        let err = output_payload("image/png", &json!(42)).unwrap_err();
        assert!(matches!(err, ExtractError::MalformedPayload { .. }));
        let err = output_payload("image/png", &json!(["aGVs", 1])).unwrap_err();
        assert!(matches!(err, ExtractError::MalformedPayload { .. }));
    }

    #[test]
    fn test_attachment_payload_rejects_fragments() {
        let err = attachment_payload("image/png", &json!(["aGVs", "bG8="])).unwrap_err();
        assert!(matches!(err, ExtractError::MalformedPayload { .. }));
    }

    #[test]
    fn test_decode_base64_ignores_line_breaks() {
        assert_eq!(decode_base64("aGVs\nbG8=\n").unwrap(), b"hello");
    }

    #[test]
    fn test_decode_base64_rejects_bad_padding() {
        assert!(matches!(decode_base64("aGVsbG8"), Err(ExtractError::Decode(_))));
    }

    proptest! {
        #[test]
        fn sanitized_names_only_contain_safe_chars(name in "\\PC{0,40}") {
            let sanitized = sanitize_attachment_name(&name);
            prop_assert!(sanitized.chars().all(|c| c.is_alphanumeric() || c == '.' || c == '_'));
            prop_assert_eq!(sanitized.chars().count(), name.chars().count());
        }

        #[test]
        fn sanitizing_is_idempotent(name in "\\PC{0,40}") {
            let once = sanitize_attachment_name(&name);
            prop_assert_eq!(sanitize_attachment_name(&once), once.clone());
        }
    }
}
