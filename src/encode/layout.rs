//! Deterministic binary layout: every buffer view is copied into one output
//! buffer, and tightly packable views have their accessors repacked in
//! declaration order at 4-byte aligned offsets.

use std::collections::HashSet;
use std::ops::Range;

use bytes::Bytes;

use crate::container::align4;
use crate::document::{Buffer, Document};
use crate::error::{Result, VrmError};
use crate::log_debug;

/// Views that must be copied verbatim: strided, sparse storage or image data.
fn verbatim_views(document: &Document) -> HashSet<usize> {
    let mut views: HashSet<usize> = document
        .buffer_views
        .iter()
        .enumerate()
        .filter(|(_, view)| view.byte_stride.is_some())
        .map(|(index, _)| index)
        .collect();

    for accessor in &document.accessors {
        if let Some(sparse) = &accessor.sparse {
            views.insert(sparse.indices.buffer_view);
            views.insert(sparse.values.buffer_view);
            views.extend(accessor.buffer_view);
        }
    }
    views.extend(document.images.iter().filter_map(|image| image.buffer_view));
    views
}

/// Accessors of `view` in declaration order with their byte ranges, if they
/// can be repacked: each lies inside the view and none overlap.
fn packable_accessors(
    document: &Document,
    view: usize,
    byte_length: usize,
) -> Option<Vec<(usize, Range<usize>)>> {
    let accessors = document
        .accessors
        .iter()
        .enumerate()
        .filter(|(_, accessor)| accessor.buffer_view == Some(view))
        .map(|(index, accessor)| {
            let end = accessor.packed_length()?.checked_add(accessor.byte_offset)?;
            Some((index, accessor.byte_offset..end))
        })
        .collect::<Option<Vec<_>>>()?;
    if accessors.is_empty() {
        return None;
    }

    let mut ranges: Vec<&Range<usize>> = accessors.iter().map(|(_, range)| range).collect();
    ranges.sort_unstable_by_key(|range| (range.start, range.end));

    let in_bounds = ranges.iter().all(|range| range.end <= byte_length);
    let disjoint = ranges.windows(2).all(|pair| pair[0].end <= pair[1].start);
    (in_bounds && disjoint).then_some(accessors)
}

/// Lay out all buffer views into a single buffer and return the rewritten
/// document together with the BIN payload.
pub fn pack_binary(document: &Document) -> Result<(Document, Vec<u8>)> {
    let mut packed = document.clone();
    let mut bin = Vec::new();
    let verbatim = verbatim_views(document);

    for (index, view) in document.buffer_views.iter().enumerate() {
        let source = document.buffer_view_bytes(index).ok_or_else(|| {
            VrmError::encoding(
                format!("/bufferViews/{index}"),
                "buffer view data is not loaded (external or missing buffer)",
            )
        })?;

        bin.resize(align4(bin.len()), 0);
        let view_start = bin.len();

        let repack = if verbatim.contains(&index) {
            None
        } else {
            packable_accessors(document, index, view.byte_length)
        };

        let new_length = match repack {
            Some(accessors) => {
                let mut cursor = 0usize;
                for (accessor_index, range) in accessors {
                    let length = range.len();
                    let bytes = source.get(range).ok_or_else(|| {
                        VrmError::encoding(
                            format!("/accessors/{accessor_index}"),
                            "accessor lies outside its loaded buffer view",
                        )
                    })?;
                    cursor = align4(cursor);
                    bin.resize(view_start + cursor, 0);
                    bin.extend_from_slice(bytes);
                    packed.accessors[accessor_index].byte_offset = cursor;
                    cursor += length;
                }
                cursor
            }
            None => {
                log_debug!("buffer view {index} copied verbatim");
                bin.extend_from_slice(&source);
                view.byte_length
            }
        };

        let packed_view = &mut packed.buffer_views[index];
        packed_view.buffer = 0;
        packed_view.byte_offset = view_start;
        packed_view.byte_length = new_length;
    }

    packed.buffers = if document.buffer_views.is_empty() {
        Vec::new()
    } else {
        vec![Buffer {
            name: document.buffers.first().and_then(|buffer| buffer.name.clone()),
            byte_length: bin.len(),
            uri: None,
            data: Some(Bytes::copy_from_slice(&bin)),
        }]
    };

    Ok((packed, bin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Accessor, BufferView, ComponentType, ElementType};

    fn two_accessor_document() -> Document {
        let mut first = Accessor::new(ComponentType::U16, ElementType::Scalar, 3);
        first.buffer_view = Some(0);
        let mut second = Accessor::new(ComponentType::U16, ElementType::Scalar, 2);
        second.buffer_view = Some(0);
        second.byte_offset = 6;

        Document {
            accessors: vec![first, second],
            buffer_views: vec![BufferView {
                buffer: 0,
                byte_offset: 0,
                byte_length: 10,
                ..Default::default()
            }],
            buffers: vec![Buffer {
                byte_length: 10,
                data: Some(Bytes::from_static(&[1, 0, 2, 0, 3, 0, 4, 0, 5, 0])),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn given_contiguous_accessors_when_packing_then_second_starts_on_next_aligned_offset() {
        let (packed, bin) = pack_binary(&two_accessor_document()).expect("packable");

        assert_eq!(packed.accessors[0].byte_offset, 0);
        assert_eq!(packed.accessors[1].byte_offset, 8);
        assert_eq!(packed.buffer_views[0].byte_length, 12);
        assert_eq!(bin, vec![1, 0, 2, 0, 3, 0, 0, 0, 4, 0, 5, 0]);
    }

    #[test]
    fn given_packed_document_when_packing_again_then_layout_is_unchanged() {
        let (once, first_bin) = pack_binary(&two_accessor_document()).expect("first pass");
        let (twice, second_bin) = pack_binary(&once).expect("second pass");

        assert_eq!(once.accessors, twice.accessors);
        assert_eq!(once.buffer_views, twice.buffer_views);
        assert_eq!(first_bin, second_bin);
    }

    #[test]
    fn given_strided_view_when_packing_then_bytes_are_copied_verbatim() {
        let mut document = two_accessor_document();
        document.buffer_views[0].byte_stride = Some(4);

        let (packed, bin) = pack_binary(&document).expect("verbatim copy");
        assert_eq!(packed.accessors[1].byte_offset, 6);
        assert_eq!(bin.len(), 10);
    }

    #[test]
    fn given_unloaded_buffer_when_packing_then_encoding_violation_is_returned() {
        let mut document = two_accessor_document();
        document.buffers[0].data = None;
        document.buffers[0].uri = Some("external.bin".to_string());

        let err = pack_binary(&document).expect_err("external data cannot be packed");
        assert!(matches!(err, VrmError::EncodingConstraintViolation { .. }));
    }

    #[test]
    fn given_accessor_count_overflowing_usize_when_packing_then_view_is_copied_verbatim() {
        let mut document = two_accessor_document();
        document.accessors[1].count = usize::MAX / 2;

        let (packed, bin) = pack_binary(&document).expect("verbatim copy");
        assert_eq!(packed.accessors[1].byte_offset, 6);
        assert_eq!(packed.buffer_views[0].byte_length, 10);
        assert_eq!(bin.len(), 10);
    }
}
