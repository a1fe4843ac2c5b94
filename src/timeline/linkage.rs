//! Transition linkage
//!
//! The editor attaches supporting data to transitions once their neighbours
//! exist: the tail/head ranges an overlap join plays, and the generated
//! resource a fill plays. These helpers apply the same rules for headless
//! callers.

use log::debug;

use super::entry::{SourceRange, TimelineEntry, TrackRegistry, TransitionKind, TransitionLinkage};

/// Effective source range of a clip entry, if it resolves
fn clip_range(entry: &TimelineEntry, tracks: &TrackRegistry) -> Option<SourceRange> {
    let TimelineEntry::Clip {
        track_id,
        clip_id,
        custom_start,
        custom_end,
    } = entry
    else {
        return None;
    };
    let track = tracks.track(track_id)?;
    let clip = track.clip(*clip_id)?;
    let start = custom_start.unwrap_or(clip.start);
    let end = custom_end.unwrap_or(clip.end);
    (end > start).then(|| SourceRange::new(track.resource_id.clone(), start, end))
}

/// Link every overlap join to its neighbouring clips
///
/// `prev` becomes the last `duration` seconds of the preceding clip and
/// `next` the first `duration` seconds of the following clip, each clamped to
/// the clip's own range. Overlaps whose neighbours are not resolvable clips
/// lose their overlap data. A fill's `output_id` is never touched.
///
/// Returns the number of overlap joins that are fully linked afterwards.
pub fn link_transitions(entries: &mut [TimelineEntry], tracks: &TrackRegistry) -> usize {
    let ranges: Vec<Option<SourceRange>> = entries.iter().map(|e| clip_range(e, tracks)).collect();
    let mut linked = 0;

    for i in 0..entries.len() {
        let TimelineEntry::Transition {
            id,
            kind,
            duration,
            linkage,
        } = &mut entries[i]
        else {
            continue;
        };
        if !kind.is_overlapping() {
            continue;
        }

        let prev = i
            .checked_sub(1)
            .and_then(|p| ranges[p].as_ref())
            .map(|r| SourceRange::new(r.resource_id.clone(), (r.end - *duration).max(r.start), r.end));
        let next = ranges
            .get(i + 1)
            .and_then(|r| r.as_ref())
            .map(|r| SourceRange::new(r.resource_id.clone(), r.start, (r.start + *duration).min(r.end)));

        let data = linkage.get_or_insert_with(TransitionLinkage::default);
        data.prev = prev;
        data.next = next;

        if data.has_overlap() {
            linked += 1;
            debug!("[Linkage] {} '{}' linked between entries {} and {}", kind, id, i - 1, i + 1);
        } else {
            debug!("[Linkage] {} '{}' missing a neighbouring clip", kind, id);
        }
    }

    linked
}

/// Record the generated resource for a fill once its job completes
///
/// Returns false when no fill with that id exists.
pub fn attach_generated_output(entries: &mut [TimelineEntry], transition_id: &str, resource_id: &str) -> bool {
    for entry in entries.iter_mut() {
        if let TimelineEntry::Transition {
            id,
            kind: TransitionKind::Fill,
            linkage,
            ..
        } = entry
        {
            if id == transition_id {
                linkage.get_or_insert_with(TransitionLinkage::default).output_id =
                    Some(resource_id.to_string());
                debug!("[Linkage] fill '{}' resolved to {}", transition_id, resource_id);
                return true;
            }
        }
    }
    false
}

/// Ids of fills still waiting for generated audio
pub fn pending_generation(entries: &[TimelineEntry]) -> Vec<&str> {
    entries
        .iter()
        .filter_map(|entry| match entry {
            TimelineEntry::Transition {
                id,
                kind: TransitionKind::Fill,
                linkage,
                ..
            } if linkage.as_ref().and_then(|l| l.output_id.as_ref()).is_none() => Some(id.as_str()),
            _ => None,
        })
        .collect()
}
