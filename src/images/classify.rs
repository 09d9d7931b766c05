//! Telling attachments, content images and UI chrome apart.

use crate::context::RunContext;
use crate::dom::{Document, NodeId};
use crate::patterns::IMAGE_URL_RE;
use crate::platform::Platform;

/// Below this in either dimension an image is an icon or avatar.
const MIN_CONTENT_SIZE: f32 = 48.0;

/// Whether `source` names an image file.
pub fn looks_like_image_url(source: &str) -> bool {
    IMAGE_URL_RE.is_match(source)
}

/// An `<img>` the user uploaded, per the platform's markup conventions.
pub fn is_uploaded_image(platform: &dyn Platform, dom: &Document, el: NodeId, source: &str) -> bool {
    dom.tag(el) == Some("img") && platform.is_uploaded_image(dom, el, source)
}

/// Whether an image belongs to the message content.
///
/// Known-small boxes are rejected first; after that licensed images, image
/// file URLs and large boxes qualify.
pub fn is_content_candidate(
    ctx: &mut RunContext<'_>,
    platform: &dyn Platform,
    el: NodeId,
    source: &str,
) -> bool {
    if let Some(g) = ctx.geometry(el)
        && (g.width < MIN_CONTENT_SIZE || g.height < MIN_CONTENT_SIZE)
    {
        return false;
    }
    platform.is_licensed_content(ctx.dom, el, source)
        || looks_like_image_url(source)
        || ctx.is_large_box(el)
}
