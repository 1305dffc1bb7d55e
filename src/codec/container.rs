//! ISO-BMFF patcher that persists staged metadata into encoded AVIF bytes.
//!
//! AVIF stores its items in a `meta` box: `hdlr` names the handler, `pitm`
//! marks the primary item, `iinf`/`iloc` describe each item and where its
//! bytes live in the file. This module rewrites that structure in memory:
//! the `hdlr` name becomes the configured handler description, and when a
//! user comment is staged a new `Exif` item is added (an `infe` entry, an
//! `iloc` entry, and a `cdsc` reference to the primary item) whose payload
//! goes into a fresh `mdat` box appended at the end of the file.
//!
//! Growing the `meta` box moves every box behind it, so all `iloc` entries
//! that hold absolute file offsets are shifted by the growth.

use super::{MetadataContainer, exif};
use crate::error::{AvifyError, Result};

/// Apply the staged metadata to an encoded AVIF byte stream.
pub fn apply_metadata(avif: &[u8], metadata: &MetadataContainer) -> Result<Vec<u8>> {
    let top = parse_boxes(avif, 0, avif.len())?;
    let meta_box = top
        .iter()
        .copied()
        .find(|b| b.box_type == *b"meta")
        .ok_or_else(|| AvifyError::Metadata("no meta box in encoded output".to_string()))?;

    let exif_payload = metadata.user_comment().map(exif::user_comment_payload);

    // The rebuilt meta box has the same length whatever offset values are
    // written into it, so a first pass with placeholders yields the growth
    // needed to fix up the file offsets in the second pass.
    let probe = rebuild_meta(avif, meta_box, metadata, exif_payload.as_deref(), 0, 0)?;
    let delta = probe.len() as i64 - meta_box.size as i64;
    let exif_offset = add_signed(avif.len() as u64, delta)? + 8;
    let new_meta = rebuild_meta(
        avif,
        meta_box,
        metadata,
        exif_payload.as_deref(),
        delta,
        exif_offset,
    )?;

    let mut out = Vec::with_capacity(avif.len() + new_meta.len());
    for span in &top {
        if span.start == meta_box.start {
            out.extend_from_slice(&new_meta);
        } else {
            out.extend_from_slice(&avif[span.start..span.end()]);
        }
    }
    if let Some(payload) = &exif_payload {
        out.extend_from_slice(&((payload.len() + 8) as u32).to_be_bytes());
        out.extend_from_slice(b"mdat");
        out.extend_from_slice(payload);
    }
    Ok(out)
}

/// Placement of the new Exif item within the patched file.
struct ExifPlacement {
    item_id: u32,
    offset: u64,
    length: u64,
}

fn rebuild_meta(
    avif: &[u8],
    meta_box: BoxSpan,
    metadata: &MetadataContainer,
    exif_payload: Option<&[u8]>,
    shift: i64,
    exif_offset: u64,
) -> Result<Vec<u8>> {
    // meta is a full box; children start after the version/flags word
    let body = meta_box.payload(avif);
    if body.len() < 4 {
        return Err(truncated());
    }
    let children = parse_boxes(body, 4, body.len())?;

    // The Exif item needs an id no existing item uses and a link to the
    // primary item; both come from the original child boxes.
    let mut primary_item: Option<u32> = None;
    let mut next_item_id: u32 = 1;
    for child in &children {
        match &child.box_type {
            b"pitm" => primary_item = Some(parse_pitm(child.payload(body))?),
            b"iloc" => {
                let iloc = parse_iloc(child.payload(body))?;
                for item in &iloc.items {
                    next_item_id = next_item_id.max(item.id + 1);
                }
            }
            _ => {}
        }
    }

    let placement = exif_payload.map(|payload| ExifPlacement {
        item_id: next_item_id,
        offset: exif_offset,
        length: payload.len() as u64,
    });
    let meta_end = meta_box.end() as u64;

    let mut out_children: Vec<u8> = Vec::with_capacity(body.len());
    let mut saw_iref = false;
    for child in &children {
        let payload = child.payload(body);
        if child.box_type == *b"hdlr" {
            if let Some(description) = metadata.handler_description() {
                out_children.extend_from_slice(&boxed(b"hdlr", &rewrite_hdlr(payload, description)?));
                continue;
            }
        } else if child.box_type == *b"iloc" {
            let mut iloc = parse_iloc(payload)?;
            shift_file_offsets(&mut iloc, meta_end, shift)?;
            if let Some(placement) = &placement {
                append_exif_item(&mut iloc, placement)?;
            }
            out_children.extend_from_slice(&boxed(b"iloc", &serialize_iloc(&iloc)?));
            continue;
        } else if child.box_type == *b"iinf" {
            if let Some(placement) = &placement {
                out_children.extend_from_slice(&boxed(b"iinf", &append_infe(payload, placement.item_id)?));
                continue;
            }
        } else if child.box_type == *b"iref" {
            if let Some(placement) = &placement {
                let to = require_primary(primary_item)?;
                out_children
                    .extend_from_slice(&boxed(b"iref", &append_cdsc(payload, placement.item_id, to)?));
                saw_iref = true;
                continue;
            }
        }
        out_children.extend_from_slice(&body[child.start..child.end()]);
    }

    if let Some(placement) = &placement {
        if !saw_iref {
            let to = require_primary(primary_item)?;
            out_children.extend_from_slice(&build_iref(placement.item_id, to)?);
        }
    }

    let mut payload = Vec::with_capacity(4 + out_children.len());
    payload.extend_from_slice(&body[..4]);
    payload.extend_from_slice(&out_children);
    Ok(boxed(b"meta", &payload))
}

fn require_primary(primary_item: Option<u32>) -> Result<u32> {
    primary_item.ok_or_else(|| AvifyError::Metadata("meta box has no primary item".to_string()))
}

// --- box scanning -----------------------------------------------------------

/// Span of one box within a byte slice.
#[derive(Debug, Clone, Copy)]
struct BoxSpan {
    box_type: [u8; 4],
    /// Offset of the box header within the parsed slice.
    start: usize,
    header_len: usize,
    /// Total box size including the header.
    size: usize,
}

impl BoxSpan {
    fn end(&self) -> usize {
        self.start + self.size
    }

    fn payload<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.start + self.header_len..self.end()]
    }
}

fn parse_boxes(data: &[u8], start: usize, end: usize) -> Result<Vec<BoxSpan>> {
    let mut spans = Vec::new();
    let mut pos = start;

    while pos < end {
        if end - pos < 8 {
            return Err(truncated());
        }
        let size32 = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]);
        let box_type = [data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]];

        let (size, header_len) = if size32 == 1 {
            // 64-bit extended size
            if end - pos < 16 {
                return Err(truncated());
            }
            let size64 = u64::from_be_bytes(
                data[pos + 8..pos + 16]
                    .try_into()
                    .map_err(|_| truncated())?,
            );
            (usize::try_from(size64).map_err(|_| truncated())?, 16usize)
        } else if size32 == 0 {
            // box extends to the end of the enclosing space
            (end - pos, 8usize)
        } else {
            (size32 as usize, 8usize)
        };

        if size < header_len || pos + size > end {
            return Err(AvifyError::Metadata("malformed box size".to_string()));
        }

        spans.push(BoxSpan {
            box_type,
            start: pos,
            header_len,
            size,
        });
        pos += size;
    }

    Ok(spans)
}

fn boxed(box_type: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + payload.len());
    out.extend_from_slice(&((payload.len() + 8) as u32).to_be_bytes());
    out.extend_from_slice(box_type);
    out.extend_from_slice(payload);
    out
}

fn truncated() -> AvifyError {
    AvifyError::Metadata("truncated box data".to_string())
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.data.len() - self.pos < n {
            return Err(truncated());
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u24(&mut self) -> Result<u32> {
        let b = self.take(3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn uint(&mut self, size: u8) -> Result<u64> {
        match size {
            0 => Ok(0),
            4 => Ok(self.u32()? as u64),
            8 => {
                let b = self.take(8)?;
                Ok(u64::from_be_bytes(b.try_into().map_err(|_| truncated())?))
            }
            other => Err(AvifyError::Metadata(format!(
                "unsupported iloc field size {other}"
            ))),
        }
    }
}

fn put_uint(out: &mut Vec<u8>, value: u64, size: u8) -> Result<()> {
    match size {
        0 if value == 0 => Ok(()),
        0 => Err(AvifyError::Metadata(
            "iloc value does not fit a zero-width field".to_string(),
        )),
        4 => {
            let narrow = u32::try_from(value)
                .map_err(|_| AvifyError::Metadata("iloc value exceeds 32 bits".to_string()))?;
            out.extend_from_slice(&narrow.to_be_bytes());
            Ok(())
        }
        8 => {
            out.extend_from_slice(&value.to_be_bytes());
            Ok(())
        }
        other => Err(AvifyError::Metadata(format!(
            "unsupported iloc field size {other}"
        ))),
    }
}

// --- individual meta children ----------------------------------------------

fn parse_pitm(payload: &[u8]) -> Result<u32> {
    let mut c = Cursor::new(payload);
    let version = c.u8()?;
    c.u24()?;
    if version == 0 {
        Ok(c.u16()? as u32)
    } else {
        c.u32()
    }
}

/// Replace the handler name, keeping version, handler type and reserved words.
fn rewrite_hdlr(payload: &[u8], name: &str) -> Result<Vec<u8>> {
    // version/flags(4) + pre_defined(4) + handler_type(4) + reserved(12)
    const FIXED_LEN: usize = 24;
    if payload.len() < FIXED_LEN {
        return Err(truncated());
    }
    let mut out = payload[..FIXED_LEN].to_vec();
    out.extend_from_slice(name.as_bytes());
    out.push(0);
    Ok(out)
}

/// Bump the iinf entry count and append an `Exif` infe box.
fn append_infe(payload: &[u8], item_id: u32) -> Result<Vec<u8>> {
    let mut c = Cursor::new(payload);
    let version = c.u8()?;
    c.u24()?;
    let count = if version == 0 {
        c.u16()? as u64
    } else {
        c.u32()? as u64
    };

    let mut out = Vec::with_capacity(payload.len() + 32);
    out.extend_from_slice(&payload[..4]);
    if version == 0 {
        let bumped = u16::try_from(count + 1)
            .map_err(|_| AvifyError::Metadata("iinf entry count overflow".to_string()))?;
        out.extend_from_slice(&bumped.to_be_bytes());
    } else {
        out.extend_from_slice(&((count + 1) as u32).to_be_bytes());
    }
    out.extend_from_slice(&payload[c.pos..]);
    out.extend_from_slice(&boxed(b"infe", &infe_payload(item_id)?));
    Ok(out)
}

fn infe_payload(item_id: u32) -> Result<Vec<u8>> {
    let id = u16::try_from(item_id)
        .map_err(|_| AvifyError::Metadata("item id out of range for infe".to_string()))?;
    let mut out = vec![2, 0, 0, 0]; // version 2, flags 0
    out.extend_from_slice(&id.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes()); // item_protection_index
    out.extend_from_slice(b"Exif");
    out.push(0); // empty item name
    Ok(out)
}

fn cdsc_payload(version: u8, from: u32, to: u32) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(10);
    if version == 0 {
        let from = u16::try_from(from)
            .map_err(|_| AvifyError::Metadata("item id out of range for iref".to_string()))?;
        let to = u16::try_from(to)
            .map_err(|_| AvifyError::Metadata("item id out of range for iref".to_string()))?;
        out.extend_from_slice(&from.to_be_bytes());
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&to.to_be_bytes());
    } else {
        out.extend_from_slice(&from.to_be_bytes());
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&to.to_be_bytes());
    }
    Ok(out)
}

fn append_cdsc(payload: &[u8], from: u32, to: u32) -> Result<Vec<u8>> {
    let version = *payload.first().ok_or_else(truncated)?;
    let mut out = payload.to_vec();
    out.extend_from_slice(&boxed(b"cdsc", &cdsc_payload(version, from, to)?));
    Ok(out)
}

fn build_iref(from: u32, to: u32) -> Result<Vec<u8>> {
    let mut payload = vec![0, 0, 0, 0]; // version 0, flags 0
    payload.extend_from_slice(&boxed(b"cdsc", &cdsc_payload(0, from, to)?));
    Ok(boxed(b"iref", &payload))
}

// --- iloc -------------------------------------------------------------------

struct Iloc {
    version: u8,
    flags: u32,
    offset_size: u8,
    length_size: u8,
    base_offset_size: u8,
    index_size: u8,
    items: Vec<IlocItem>,
}

struct IlocItem {
    id: u32,
    construction_method: u16,
    data_reference_index: u16,
    base_offset: u64,
    extents: Vec<IlocExtent>,
}

struct IlocExtent {
    index: u64,
    offset: u64,
    length: u64,
}

fn parse_iloc(payload: &[u8]) -> Result<Iloc> {
    let mut c = Cursor::new(payload);
    let version = c.u8()?;
    let flags = c.u24()?;
    let sizes = c.u8()?;
    let offset_size = sizes >> 4;
    let length_size = sizes & 0x0f;
    let sizes = c.u8()?;
    let base_offset_size = sizes >> 4;
    let index_size = sizes & 0x0f;

    let item_count = if version < 2 {
        c.u16()? as u32
    } else {
        c.u32()?
    };

    let mut items = Vec::with_capacity(item_count as usize);
    for _ in 0..item_count {
        let id = if version < 2 { c.u16()? as u32 } else { c.u32()? };
        let construction_method = if version >= 1 { c.u16()? & 0x0f } else { 0 };
        let data_reference_index = c.u16()?;
        let base_offset = c.uint(base_offset_size)?;
        let extent_count = c.u16()?;
        let mut extents = Vec::with_capacity(extent_count as usize);
        for _ in 0..extent_count {
            let index = if version >= 1 && index_size > 0 {
                c.uint(index_size)?
            } else {
                0
            };
            let offset = c.uint(offset_size)?;
            let length = c.uint(length_size)?;
            extents.push(IlocExtent {
                index,
                offset,
                length,
            });
        }
        items.push(IlocItem {
            id,
            construction_method,
            data_reference_index,
            base_offset,
            extents,
        });
    }

    Ok(Iloc {
        version,
        flags,
        offset_size,
        length_size,
        base_offset_size,
        index_size,
        items,
    })
}

fn serialize_iloc(iloc: &Iloc) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.push(iloc.version);
    out.extend_from_slice(&iloc.flags.to_be_bytes()[1..]);
    out.push((iloc.offset_size << 4) | (iloc.length_size & 0x0f));
    out.push((iloc.base_offset_size << 4) | (iloc.index_size & 0x0f));

    if iloc.version < 2 {
        let count = u16::try_from(iloc.items.len())
            .map_err(|_| AvifyError::Metadata("iloc item count overflow".to_string()))?;
        out.extend_from_slice(&count.to_be_bytes());
    } else {
        out.extend_from_slice(&(iloc.items.len() as u32).to_be_bytes());
    }

    for item in &iloc.items {
        if iloc.version < 2 {
            let id = u16::try_from(item.id)
                .map_err(|_| AvifyError::Metadata("iloc item id overflow".to_string()))?;
            out.extend_from_slice(&id.to_be_bytes());
        } else {
            out.extend_from_slice(&item.id.to_be_bytes());
        }
        if iloc.version >= 1 {
            out.extend_from_slice(&item.construction_method.to_be_bytes());
        }
        out.extend_from_slice(&item.data_reference_index.to_be_bytes());
        put_uint(&mut out, item.base_offset, iloc.base_offset_size)?;
        let extent_count = u16::try_from(item.extents.len())
            .map_err(|_| AvifyError::Metadata("iloc extent count overflow".to_string()))?;
        out.extend_from_slice(&extent_count.to_be_bytes());
        for extent in &item.extents {
            if iloc.version >= 1 && iloc.index_size > 0 {
                put_uint(&mut out, extent.index, iloc.index_size)?;
            }
            put_uint(&mut out, extent.offset, iloc.offset_size)?;
            put_uint(&mut out, extent.length, iloc.length_size)?;
        }
    }

    Ok(out)
}

/// Shift absolute file offsets of items stored behind the meta box.
fn shift_file_offsets(iloc: &mut Iloc, meta_end: u64, shift: i64) -> Result<()> {
    if shift == 0 {
        return Ok(());
    }
    for item in &mut iloc.items {
        // only construction method 0 references raw file offsets
        if item.construction_method != 0 {
            continue;
        }
        if item.base_offset != 0 {
            if item.base_offset >= meta_end {
                item.base_offset = add_signed(item.base_offset, shift)?;
            }
        } else {
            for extent in &mut item.extents {
                if extent.offset >= meta_end {
                    extent.offset = add_signed(extent.offset, shift)?;
                }
            }
        }
    }
    Ok(())
}

fn append_exif_item(iloc: &mut Iloc, placement: &ExifPlacement) -> Result<()> {
    if iloc.length_size == 0 {
        return Err(AvifyError::Metadata(
            "iloc cannot carry extent lengths".to_string(),
        ));
    }
    let (base_offset, extent_offset) = if iloc.offset_size > 0 {
        (0, placement.offset)
    } else if iloc.base_offset_size > 0 {
        (placement.offset, 0)
    } else {
        return Err(AvifyError::Metadata(
            "iloc cannot carry file offsets".to_string(),
        ));
    };
    iloc.items.push(IlocItem {
        id: placement.item_id,
        construction_method: 0,
        data_reference_index: 0,
        base_offset,
        extents: vec![IlocExtent {
            index: 0,
            offset: extent_offset,
            length: placement.length,
        }],
    });
    Ok(())
}

fn add_signed(value: u64, shift: i64) -> Result<u64> {
    value
        .checked_add_signed(shift)
        .ok_or_else(|| AvifyError::Metadata("file offset overflow".to_string()))
}

// --- test support -----------------------------------------------------------

/// Build a structurally valid single-item AVIF-like file for tests: ftyp +
/// meta(hdlr, pitm, iloc, iinf) + mdat, with the item's extent pointing at
/// the mdat payload.
#[cfg(test)]
pub(crate) fn minimal_avif(pixels: &[u8]) -> Vec<u8> {
    fn assemble(pixels: &[u8], pixel_offset: u32) -> Vec<u8> {
        let mut ftyp_payload = Vec::new();
        ftyp_payload.extend_from_slice(b"avif");
        ftyp_payload.extend_from_slice(&0u32.to_be_bytes());
        ftyp_payload.extend_from_slice(b"avifmif1");
        let ftyp = boxed(b"ftyp", &ftyp_payload);

        let mut hdlr = vec![0, 0, 0, 0];
        hdlr.extend_from_slice(&0u32.to_be_bytes()); // pre_defined
        hdlr.extend_from_slice(b"pict");
        hdlr.extend_from_slice(&[0u8; 12]); // reserved
        hdlr.push(0); // empty name

        let mut pitm = vec![0, 0, 0, 0];
        pitm.extend_from_slice(&1u16.to_be_bytes());

        let mut iloc = vec![0, 0, 0, 0]; // version 0, flags 0
        iloc.push(0x44); // offset_size 4, length_size 4
        iloc.push(0x00); // base_offset_size 0, index_size 0
        iloc.extend_from_slice(&1u16.to_be_bytes()); // item count
        iloc.extend_from_slice(&1u16.to_be_bytes()); // item id
        iloc.extend_from_slice(&0u16.to_be_bytes()); // data reference index
        iloc.extend_from_slice(&1u16.to_be_bytes()); // extent count
        iloc.extend_from_slice(&pixel_offset.to_be_bytes());
        iloc.extend_from_slice(&(pixels.len() as u32).to_be_bytes());

        let mut infe = vec![2, 0, 0, 0];
        infe.extend_from_slice(&1u16.to_be_bytes());
        infe.extend_from_slice(&0u16.to_be_bytes());
        infe.extend_from_slice(b"av01");
        infe.push(0);
        let mut iinf = vec![0, 0, 0, 0];
        iinf.extend_from_slice(&1u16.to_be_bytes());
        iinf.extend_from_slice(&boxed(b"infe", &infe));

        let mut meta_payload = vec![0, 0, 0, 0];
        meta_payload.extend_from_slice(&boxed(b"hdlr", &hdlr));
        meta_payload.extend_from_slice(&boxed(b"pitm", &pitm));
        meta_payload.extend_from_slice(&boxed(b"iloc", &iloc));
        meta_payload.extend_from_slice(&boxed(b"iinf", &iinf));
        let meta = boxed(b"meta", &meta_payload);

        let mut out = Vec::new();
        out.extend_from_slice(&ftyp);
        out.extend_from_slice(&meta);
        out.extend_from_slice(&boxed(b"mdat", pixels));
        out
    }

    let probe = assemble(pixels, 0);
    let pixel_offset = (probe.len() - pixels.len()) as u32;
    assemble(pixels, pixel_offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata;

    fn staged(with_comment: bool) -> MetadataContainer {
        let mut container = MetadataContainer::new();
        metadata::embed(
            &mut container,
            if with_comment { Some("seed:1") } else { None },
        );
        container
    }

    fn find_box(data: &[u8], box_type: &[u8; 4]) -> BoxSpan {
        parse_boxes(data, 0, data.len())
            .unwrap()
            .into_iter()
            .find(|b| b.box_type == *box_type)
            .unwrap()
    }

    fn find_meta_child<'a>(data: &'a [u8], box_type: &[u8; 4]) -> (&'a [u8], BoxSpan) {
        let meta = find_box(data, b"meta");
        let body_start = meta.start + meta.header_len;
        let body = &data[body_start..meta.end()];
        let child = parse_boxes(body, 4, body.len())
            .unwrap()
            .into_iter()
            .find(|b| b.box_type == *box_type)
            .unwrap();
        (body, child)
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_patched_file_keeps_boxes_consistent() {
        let avif = minimal_avif(b"PIXELDATA");
        let out = apply_metadata(&avif, &staged(true)).unwrap();
        // every top-level box accounted for, nothing dangling
        let top = parse_boxes(&out, 0, out.len()).unwrap();
        assert_eq!(top.last().unwrap().end(), out.len());
    }

    #[test]
    fn test_existing_item_offset_is_shifted() {
        let avif = minimal_avif(b"PIXELDATA");
        let out = apply_metadata(&avif, &staged(true)).unwrap();

        let (body, iloc_span) = find_meta_child(&out, b"iloc");
        let iloc = parse_iloc(iloc_span.payload(body)).unwrap();
        assert_eq!(iloc.items.len(), 2);

        let pixel_item = &iloc.items[0];
        let offset = (pixel_item.base_offset + pixel_item.extents[0].offset) as usize;
        let length = pixel_item.extents[0].length as usize;
        assert_eq!(&out[offset..offset + length], b"PIXELDATA");
    }

    #[test]
    fn test_exif_item_points_at_appended_payload() {
        let avif = minimal_avif(b"PIXELDATA");
        let comment = metadata::encode_comment("seed:1");
        let out = apply_metadata(&avif, &staged(true)).unwrap();

        let (body, iloc_span) = find_meta_child(&out, b"iloc");
        let iloc = parse_iloc(iloc_span.payload(body)).unwrap();
        let exif_item = &iloc.items[1];
        assert_eq!(exif_item.id, 2);

        let offset = (exif_item.base_offset + exif_item.extents[0].offset) as usize;
        let length = exif_item.extents[0].length as usize;
        let payload = &out[offset..offset + length];
        assert_eq!(payload, exif::user_comment_payload(&comment).as_slice());
        assert!(contains(payload, &comment));
    }

    #[test]
    fn test_iinf_gains_exif_entry_and_iref_links_primary() {
        let avif = minimal_avif(b"PIXELDATA");
        let out = apply_metadata(&avif, &staged(true)).unwrap();

        let (body, iinf_span) = find_meta_child(&out, b"iinf");
        let iinf = iinf_span.payload(body);
        assert_eq!(u16::from_be_bytes([iinf[4], iinf[5]]), 2);
        assert!(contains(iinf, b"Exif"));

        let (body, iref_span) = find_meta_child(&out, b"iref");
        let iref = iref_span.payload(body);
        assert!(contains(iref, b"cdsc"));
    }

    #[test]
    fn test_handler_description_is_rewritten() {
        let avif = minimal_avif(b"PIXELDATA");
        let out = apply_metadata(&avif, &staged(false)).unwrap();
        assert!(contains(&out, b"libavif\0"));
    }

    #[test]
    fn test_without_comment_no_exif_item_is_added() {
        let avif = minimal_avif(b"PIXELDATA");
        let out = apply_metadata(&avif, &staged(false)).unwrap();
        assert!(!contains(&out, b"Exif"));

        let (body, iloc_span) = find_meta_child(&out, b"iloc");
        let iloc = parse_iloc(iloc_span.payload(body)).unwrap();
        assert_eq!(iloc.items.len(), 1);
        let pixel_item = &iloc.items[0];
        let offset = (pixel_item.base_offset + pixel_item.extents[0].offset) as usize;
        assert_eq!(&out[offset..offset + 9], b"PIXELDATA");
    }

    #[test]
    fn test_missing_meta_box_is_a_metadata_error() {
        let free = boxed(b"free", b"junk");
        let result = apply_metadata(&free, &staged(true));
        assert!(matches!(result, Err(AvifyError::Metadata(_))));
    }

    #[test]
    fn test_roundtrip_iloc_serialization() {
        let avif = minimal_avif(b"PIXELDATA");
        let (body, iloc_span) = find_meta_child(&avif, b"iloc");
        let original = iloc_span.payload(body);
        let reserialized = serialize_iloc(&parse_iloc(original).unwrap()).unwrap();
        assert_eq!(original, reserialized.as_slice());
    }
}
