//! Recovering images the walker missed and moving gallery blocks.
//!
//! Some front-ends render attachments and generated images outside the
//! message body, or collect them into a `**Images**` list at the bottom of
//! the answer. These passes run on the finished fragment of one message.

use std::collections::HashSet;

use crate::context::RunContext;
use crate::dom::NodeId;
use crate::markdown::{Fragment, ImageId, Piece};
use crate::patterns::CAPTION_RE;
use crate::platform::{Platform, Role};

use super::ConversionState;
use super::classify::{is_content_candidate, is_uploaded_image};
use super::discover::deep_collect;

/// Sources of every image referenced by `fragment`.
pub fn fragment_sources(fragment: &Fragment, state: &ConversionState) -> HashSet<String> {
    fragment
        .image_ids()
        .into_iter()
        .filter_map(|id| state.source(id))
        .map(str::to_string)
        .collect()
}

/// Remove `**Images**` gallery lists and re-insert their images before the
/// first caption line.
///
/// A gallery is a `**Images**` line after a line break, one blank line, then
/// one or more `- <image>` lines each ending in a line break. Images already
/// shown elsewhere in the message are dropped.
pub fn relocate_gallery_blocks(fragment: Fragment, state: &ConversionState) -> Fragment {
    let lines = fragment.lines();
    let mut gallery = Vec::new();
    let mut out = Fragment::new();
    let mut i = 0;

    while i < lines.len() {
        if i > 0
            && let Some((items, resume)) = gallery_at(&lines, i)
        {
            gallery.extend(items);
            out.push_str("\n\n");
            out.append(lines[resume].clone());
            i = resume + 1;
            continue;
        }
        if i > 0 {
            out.push_str("\n");
        }
        out.append(lines[i].clone());
        i += 1;
    }

    if gallery.is_empty() {
        return fragment;
    }
    tracing::debug!(images = gallery.len(), "relocating image gallery");

    let mut seen = fragment_sources(&out, state);
    let kept: Vec<ImageId> = gallery
        .into_iter()
        .filter(|&id| state.source(id).is_some_and(|src| seen.insert(src.to_string())))
        .collect();
    insert_near_caption(out, &kept)
}

/// Gallery starting at line `i`: its image ids and the index of the first
/// line after it.
fn gallery_at(lines: &[Fragment], i: usize) -> Option<(Vec<ImageId>, usize)> {
    if lines[i].pieces() != [Piece::Text("**Images**".to_string())] {
        return None;
    }
    if !lines.get(i + 1)?.is_empty() {
        return None;
    }

    let mut items = Vec::new();
    let mut j = i + 2;
    while j + 1 < lines.len() {
        match lines[j].pieces() {
            [Piece::Text(bullet), Piece::Image(id)] if bullet == "- " => items.push(*id),
            _ => break,
        }
        j += 1;
    }
    if items.is_empty() {
        return None;
    }

    let mut resume = j;
    while resume + 1 < lines.len() && lines[resume].is_empty() {
        resume += 1;
    }
    Some((items, resume))
}

/// Insert images as a block before the first caption line (`图示:`, `图:`,
/// `Figure:`, `Fig.:`), or at the start when there is none.
pub fn insert_near_caption(fragment: Fragment, images: &[ImageId]) -> Fragment {
    if images.is_empty() {
        return fragment;
    }
    let block = Fragment::join(images.iter().map(|&id| Fragment::image(id)), "\n").wrap("\n\n", "\n\n");

    let lines = fragment.lines();
    let caption = lines.iter().position(|line| {
        matches!(line.pieces().first(), Some(Piece::Text(text)) if CAPTION_RE.is_match(text))
    });
    let Some(at) = caption else {
        let mut out = block;
        out.append(fragment);
        return out;
    };

    let mut out = Fragment::join(lines[..at].iter().cloned(), "\n");
    if at > 0 {
        out.push_str("\n");
    }
    out.append(block);
    out.append(Fragment::join(lines[at..].iter().cloned(), "\n"));
    out
}

/// `**Attachments**` bullet list appended to a user message.
pub fn attachments_block(images: &[ImageId]) -> Fragment {
    let items = images.iter().map(|&id| Fragment::image(id).wrap("- ", ""));
    Fragment::join(items, "\n").wrap("\n\n**Attachments**\n\n", "\n")
}

/// Images appended after a message, one per paragraph.
pub fn trailing_images_block(images: &[ImageId]) -> Fragment {
    Fragment::join(images.iter().map(|&id| Fragment::image(id)), "\n\n").wrap("\n\n", "\n")
}

/// Look around a message for images the walker could not see.
///
/// Searches the content root and its parent, and for non-user messages the
/// neighboring elements too. A user message only takes uploaded images;
/// other roles take content images that are not uploads. Sources in
/// `existing` or already found are skipped. Found images are recorded in
/// `state`.
pub fn scan_for_message(
    ctx: &mut RunContext<'_>,
    platform: &dyn Platform,
    role: Role,
    content_root: NodeId,
    state: &mut ConversionState,
    existing: &HashSet<String>,
) -> Vec<ImageId> {
    let dom = ctx.dom;
    let mut roots = vec![content_root];
    roots.extend(dom.parent_element(content_root));
    if role != Role::User {
        roots.extend(dom.previous_element_sibling(content_root));
        roots.extend(dom.next_element_sibling(content_root));
    }

    let mut seen = HashSet::new();
    let mut found = Vec::new();
    for root in roots {
        for image in deep_collect(ctx, root) {
            if seen.contains(&image.source) || existing.contains(&image.source) {
                continue;
            }
            let uploaded = image
                .element
                .is_some_and(|el| is_uploaded_image(platform, dom, el, &image.source));
            let keep = match (role, image.element) {
                (Role::User, _) => uploaded,
                (_, Some(el)) => !uploaded && is_content_candidate(ctx, platform, el, &image.source),
                (_, None) => false,
            };
            if !keep {
                continue;
            }

            let alt = match image.alt.trim() {
                "" => "image",
                alt => alt,
            };
            seen.insert(image.source.clone());
            found.push(state.push(alt, image.source, image.element));
        }
    }
    if !found.is_empty() {
        tracing::debug!(role = %role, images = found.len(), "fallback scan recovered images");
    }
    found
}
