//! Annotation extraction and comment encoding.
//!
//! Image generation tools record their prompt and sampler settings in a PNG
//! text chunk under the `parameters` keyword. This module pulls that value
//! out of a source file and turns it into the tagged binary form EXIF uses
//! for the UserComment field, so the annotation survives the trip into the
//! AVIF container.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::codec::MetadataContainer;
use crate::error::{AvifyError, Result};

/// PNG text chunk keyword carrying the annotation.
pub const PARAMETERS_KEY: &str = "parameters";

/// Constant written into the target container's handler description field.
pub const HANDLER_DESCRIPTION: &str = "libavif";

/// EXIF UserComment character code for 7-bit ASCII payloads.
pub const ASCII_TAG: [u8; 8] = *b"ASCII\0\0\0";

/// EXIF UserComment character code for UTF-16LE payloads.
pub const UNICODE_TAG: [u8; 8] = *b"UNICODE\0";

/// Read the annotation string from a source PNG, if present.
///
/// The three text chunk kinds are tried in a fixed priority order: `tEXt`,
/// then `zTXt`, then `iTXt`. Within one kind the first chunk in file order
/// wins. Text chunks are allowed to appear after the image data, so the file
/// is read through to IEND before the chunk lists are inspected.
pub fn extract_annotation(path: &Path) -> Result<Option<String>> {
    let file = File::open(path)?;
    let decoder = png::Decoder::new(BufReader::new(file));
    let mut reader = decoder
        .read_info()
        .map_err(|e| AvifyError::Metadata(format!("{}: {}", path.display(), e)))?;
    reader
        .finish()
        .map_err(|e| AvifyError::Metadata(format!("{}: {}", path.display(), e)))?;

    let info = reader.info();

    for chunk in &info.uncompressed_latin1_text {
        if chunk.keyword == PARAMETERS_KEY {
            return Ok(Some(chunk.text.clone()));
        }
    }
    for chunk in &info.compressed_latin1_text {
        if chunk.keyword == PARAMETERS_KEY {
            let text = chunk
                .get_text()
                .map_err(|e| AvifyError::Metadata(format!("{}: {}", path.display(), e)))?;
            return Ok(Some(text));
        }
    }
    for chunk in &info.utf8_text {
        if chunk.keyword == PARAMETERS_KEY {
            let text = chunk
                .get_text()
                .map_err(|e| AvifyError::Metadata(format!("{}: {}", path.display(), e)))?;
            return Ok(Some(text));
        }
    }

    Ok(None)
}

/// Encode an annotation as a tagged UserComment blob.
///
/// The variant is a pure function of the annotation's character set: pure
/// ASCII gets the `ASCII` tag followed by the literal bytes, anything else
/// gets the `UNICODE` tag followed by UTF-16LE code units. The input is not
/// normalized; embedded null or control characters pass through unchanged.
pub fn encode_comment(annotation: &str) -> Vec<u8> {
    if annotation.is_ascii() {
        let mut out = Vec::with_capacity(ASCII_TAG.len() + annotation.len());
        out.extend_from_slice(&ASCII_TAG);
        out.extend_from_slice(annotation.as_bytes());
        out
    } else {
        let mut out = Vec::with_capacity(UNICODE_TAG.len() + annotation.len() * 2);
        out.extend_from_slice(&UNICODE_TAG);
        for unit in annotation.encode_utf16() {
            out.extend_from_slice(&unit.to_le_bytes());
        }
        out
    }
}

/// Stage the annotation into the in-memory target metadata container.
///
/// The handler description is always set; the comment field only when an
/// annotation exists. Nothing is persisted here.
pub fn embed(container: &mut MetadataContainer, annotation: Option<&str>) {
    if let Some(annotation) = annotation {
        container.set_user_comment(encode_comment(annotation));
    }
    container.set_handler_description(HANDLER_DESCRIPTION);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufWriter;
    use std::path::PathBuf;

    enum Kind {
        Text,
        Ztxt,
        Itxt,
    }

    fn make_png(dir: &Path, name: &str, chunks: &[(Kind, &str, &str)]) -> PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        let mut encoder = png::Encoder::new(BufWriter::new(file), 2, 2);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        for (kind, keyword, value) in chunks {
            match kind {
                Kind::Text => encoder
                    .add_text_chunk(keyword.to_string(), value.to_string())
                    .unwrap(),
                Kind::Ztxt => encoder
                    .add_ztxt_chunk(keyword.to_string(), value.to_string())
                    .unwrap(),
                Kind::Itxt => encoder
                    .add_itxt_chunk(keyword.to_string(), value.to_string())
                    .unwrap(),
            }
        }
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&[255u8; 16]).unwrap();
        writer.finish().unwrap();
        path
    }

    #[test]
    fn test_extract_from_each_chunk_kind() {
        let dir = tempfile::tempdir().unwrap();
        let expected = "Steps: 20, CFG scale: 7, Seed: 123";

        for (name, kind) in [
            ("text.png", Kind::Text),
            ("ztxt.png", Kind::Ztxt),
            ("itxt.png", Kind::Itxt),
        ] {
            let path = make_png(dir.path(), name, &[(kind, PARAMETERS_KEY, expected)]);
            assert_eq!(extract_annotation(&path).unwrap().as_deref(), Some(expected));
        }
    }

    #[test]
    fn test_text_chunk_takes_priority_over_itxt() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_png(
            dir.path(),
            "both.png",
            &[
                (Kind::Itxt, PARAMETERS_KEY, "from itxt"),
                (Kind::Text, PARAMETERS_KEY, "from text"),
            ],
        );
        assert_eq!(
            extract_annotation(&path).unwrap().as_deref(),
            Some("from text")
        );
    }

    #[test]
    fn test_extract_without_annotation() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_png(dir.path(), "plain.png", &[(Kind::Text, "Software", "brush")]);
        assert_eq!(extract_annotation(&path).unwrap(), None);
    }

    #[test]
    fn test_encode_ascii() {
        let value = "prompt: a cat";
        let mut expected = ASCII_TAG.to_vec();
        expected.extend_from_slice(value.as_bytes());
        assert_eq!(encode_comment(value), expected);
    }

    #[test]
    fn test_encode_unicode() {
        let value = "プロンプト: 猫";
        let mut expected = UNICODE_TAG.to_vec();
        for unit in value.encode_utf16() {
            expected.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(encode_comment(value), expected);
    }

    #[test]
    fn test_encode_passes_control_characters_through() {
        let value = "a\0b\tc";
        let encoded = encode_comment(value);
        assert_eq!(&encoded[..8], &ASCII_TAG);
        assert_eq!(&encoded[8..], value.as_bytes());
    }

    #[test]
    fn test_embed_without_annotation_sets_only_handler() {
        let mut container = MetadataContainer::new();
        embed(&mut container, None);
        assert!(container.user_comment().is_none());
        assert_eq!(container.handler_description(), Some(HANDLER_DESCRIPTION));
    }

    #[test]
    fn test_embed_with_annotation_sets_both_fields() {
        let mut container = MetadataContainer::new();
        embed(&mut container, Some("seed:1"));
        assert_eq!(
            container.user_comment(),
            Some(encode_comment("seed:1").as_slice())
        );
        assert_eq!(container.handler_description(), Some(HANDLER_DESCRIPTION));
    }
}
