//! Image and attachment handling.
//!
//! The walker records every image it meets in the message's
//! [`ConversionState`] and leaves a [`Piece::Image`](crate::markdown::Piece)
//! in the fragment. After rendering, [`fallback`] may add images the walker
//! could not see, and [`embed`] decides how each referenced image is written.

pub mod classify;
pub mod discover;
pub mod embed;
pub mod fallback;

pub use classify::{is_content_candidate, is_uploaded_image, looks_like_image_url};
pub use discover::{Collected, deep_collect, img_source};
pub use embed::{EmbedError, EmbedHost, ImageData, OfflineHost, SnapshotHost, resolve_images};
pub use fallback::{
    attachments_block, fragment_sources, insert_near_caption, relocate_gallery_blocks, scan_for_message,
    trailing_images_block,
};

use crate::dom::NodeId;
use crate::markdown::ImageId;

/// An image discovered while converting one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub id: ImageId,
    pub alt: String,
    pub source: String,
    /// Element the pixels can be copied from, when there is one.
    pub origin_el: Option<NodeId>,
}

/// Per-message image accumulator.
#[derive(Debug, Default)]
pub struct ConversionState {
    images: Vec<ImageRef>,
}

impl ConversionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an image and return its id.
    pub fn push(
        &mut self,
        alt: impl Into<String>,
        source: impl Into<String>,
        origin_el: Option<NodeId>,
    ) -> ImageId {
        let id = self.images.len();
        self.images.push(ImageRef {
            id,
            alt: alt.into(),
            source: source.into(),
            origin_el,
        });
        id
    }

    pub fn get(&self, id: ImageId) -> Option<&ImageRef> {
        self.images.get(id)
    }

    pub fn source(&self, id: ImageId) -> Option<&str> {
        self.get(id).map(|img| img.source.as_str())
    }

    pub fn images(&self) -> &[ImageRef] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// `![alt](src)`
pub fn markdown_image(alt: &str, src: &str) -> String {
    format!("![{alt}]({src})")
}
