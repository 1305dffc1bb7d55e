//! Minimal EXIF writer for the UserComment tag.
//!
//! Produces the payload of a HEIF `Exif` item: a four-byte
//! `exif_tiff_header_offset` of zero followed by a little-endian TIFF that
//! carries exactly one IFD0 entry (the Exif IFD pointer) and one Exif IFD
//! entry (UserComment). Nothing else is written.

const TAG_EXIF_IFD: u16 = 0x8769;
const TAG_USER_COMMENT: u16 = 0x9286;
const TYPE_LONG: u16 = 4;
const TYPE_UNDEFINED: u16 = 7;

// Offsets relative to the TIFF header:
//   0   "II*\0" + IFD0 offset
//   8   IFD0: entry count, 1 entry, next-IFD offset
//   26  Exif IFD: entry count, 1 entry, next-IFD offset
//   44  UserComment bytes when longer than 4
const IFD0_OFFSET: u32 = 8;
const EXIF_IFD_OFFSET: u32 = IFD0_OFFSET + 2 + 12 + 4;
const DATA_OFFSET: u32 = EXIF_IFD_OFFSET + 2 + 12 + 4;

/// Build the `Exif` item payload for a tagged UserComment blob.
pub fn user_comment_payload(comment: &[u8]) -> Vec<u8> {
    let mut tiff = Vec::with_capacity(DATA_OFFSET as usize + comment.len());
    tiff.extend_from_slice(b"II*\0");
    tiff.extend_from_slice(&IFD0_OFFSET.to_le_bytes());

    // IFD0: single pointer to the Exif IFD
    tiff.extend_from_slice(&1u16.to_le_bytes());
    tiff.extend_from_slice(&TAG_EXIF_IFD.to_le_bytes());
    tiff.extend_from_slice(&TYPE_LONG.to_le_bytes());
    tiff.extend_from_slice(&1u32.to_le_bytes());
    tiff.extend_from_slice(&EXIF_IFD_OFFSET.to_le_bytes());
    tiff.extend_from_slice(&0u32.to_le_bytes());

    // Exif IFD: the UserComment entry; values of four bytes or fewer are
    // stored inline in the value field, longer ones follow the IFD
    tiff.extend_from_slice(&1u16.to_le_bytes());
    tiff.extend_from_slice(&TAG_USER_COMMENT.to_le_bytes());
    tiff.extend_from_slice(&TYPE_UNDEFINED.to_le_bytes());
    tiff.extend_from_slice(&(comment.len() as u32).to_le_bytes());
    if comment.len() <= 4 {
        let mut inline = [0u8; 4];
        inline[..comment.len()].copy_from_slice(comment);
        tiff.extend_from_slice(&inline);
    } else {
        tiff.extend_from_slice(&DATA_OFFSET.to_le_bytes());
    }
    tiff.extend_from_slice(&0u32.to_le_bytes());
    if comment.len() > 4 {
        tiff.extend_from_slice(comment);
    }

    let mut payload = Vec::with_capacity(4 + tiff.len());
    payload.extend_from_slice(&0u32.to_be_bytes());
    payload.extend_from_slice(&tiff);
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_starts_with_offset_and_tiff_header() {
        let payload = user_comment_payload(b"hello");
        assert_eq!(&payload[..4], &[0, 0, 0, 0]);
        assert_eq!(&payload[4..8], b"II*\0");
    }

    #[test]
    fn test_long_comment_is_appended_after_ifds() {
        let comment = b"ASCII\0\0\0seed:1";
        let payload = user_comment_payload(comment);
        let tiff = &payload[4..];
        assert_eq!(&tiff[DATA_OFFSET as usize..], comment);
        // count field of the UserComment entry
        let count_pos = EXIF_IFD_OFFSET as usize + 2 + 4;
        let count = u32::from_le_bytes(tiff[count_pos..count_pos + 4].try_into().unwrap());
        assert_eq!(count as usize, comment.len());
    }

    #[test]
    fn test_short_comment_is_stored_inline() {
        let payload = user_comment_payload(b"ab");
        let tiff = &payload[4..];
        assert_eq!(tiff.len(), DATA_OFFSET as usize);
        let value_pos = EXIF_IFD_OFFSET as usize + 2 + 8;
        assert_eq!(&tiff[value_pos..value_pos + 4], b"ab\0\0");
    }
}
