//! Rendered Markdown with deferred image references.
//!
//! The walker cannot know how an image will finally be written until the
//! whole message has been rendered: it may be embedded as a data URI, fall
//! back to its original URL, or be dropped by gallery relocation. A
//! [`Fragment`] therefore keeps images as [`Piece::Image`] references next
//! to plain text and is serialized once at the end.

/// Index of an image in its message's [`ConversionState`](crate::images::ConversionState).
pub type ImageId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    Text(String),
    Image(ImageId),
}

/// A sequence of text and image pieces.
///
/// Adjacent text pieces are always merged and empty text pieces never
/// stored, so two fragments with the same content compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pieces: Vec<Piece>,
}

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(s: impl AsRef<str>) -> Self {
        let mut f = Self::new();
        f.push_str(s.as_ref());
        f
    }

    pub fn image(id: ImageId) -> Self {
        let mut f = Self::new();
        f.push_image(id);
        f
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    pub fn push_str(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        if let Some(Piece::Text(last)) = self.pieces.last_mut() {
            last.push_str(s);
        } else {
            self.pieces.push(Piece::Text(s.to_string()));
        }
    }

    pub fn push_image(&mut self, id: ImageId) {
        self.pieces.push(Piece::Image(id));
    }

    pub fn append(&mut self, other: Fragment) {
        for piece in other.pieces {
            match piece {
                Piece::Text(s) => self.push_str(&s),
                Piece::Image(id) => self.push_image(id),
            }
        }
    }

    /// `prefix` + self + `suffix`.
    pub fn wrap(self, prefix: &str, suffix: &str) -> Self {
        let mut out = Fragment::text(prefix);
        out.append(self);
        out.push_str(suffix);
        out
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// No images and only whitespace text.
    pub fn is_blank(&self) -> bool {
        self.pieces.iter().all(|p| match p {
            Piece::Text(s) => s.trim().is_empty(),
            Piece::Image(_) => false,
        })
    }

    pub fn has_images(&self) -> bool {
        self.pieces.iter().any(|p| matches!(p, Piece::Image(_)))
    }

    /// Image references in order of appearance.
    pub fn image_ids(&self) -> Vec<ImageId> {
        self.pieces
            .iter()
            .filter_map(|p| match p {
                Piece::Image(id) => Some(*id),
                Piece::Text(_) => None,
            })
            .collect()
    }

    /// Concatenated text, ignoring images.
    pub fn plain_text(&self) -> String {
        self.pieces
            .iter()
            .filter_map(|p| match p {
                Piece::Text(s) => Some(s.as_str()),
                Piece::Image(_) => None,
            })
            .collect()
    }

    /// Strip leading and trailing whitespace.
    pub fn trim(mut self) -> Self {
        while let Some(Piece::Text(first)) = self.pieces.first_mut() {
            let trimmed = first.trim_start();
            if trimmed.is_empty() {
                self.pieces.remove(0);
            } else {
                *first = trimmed.to_string();
                break;
            }
        }
        while let Some(Piece::Text(last)) = self.pieces.last_mut() {
            let trimmed = last.trim_end();
            if trimmed.is_empty() {
                self.pieces.pop();
            } else {
                last.truncate(trimmed.len());
                break;
            }
        }
        self
    }

    /// Apply a text transformation to every text piece.
    pub fn map_text(self, mut f: impl FnMut(&str) -> String) -> Self {
        let mut out = Fragment::new();
        for piece in self.pieces {
            match piece {
                Piece::Text(s) => out.push_str(&f(&s)),
                Piece::Image(id) => out.push_image(id),
            }
        }
        out
    }

    /// Split at `\n` into lines. Always yields at least one line.
    pub fn lines(&self) -> Vec<Fragment> {
        let mut lines = vec![Fragment::new()];
        for piece in &self.pieces {
            match piece {
                Piece::Text(s) => {
                    let mut parts = s.split('\n');
                    if let Some(first) = parts.next()
                        && let Some(line) = lines.last_mut()
                    {
                        line.push_str(first);
                    }
                    for part in parts {
                        lines.push(Fragment::text(part));
                    }
                }
                Piece::Image(id) => {
                    if let Some(line) = lines.last_mut() {
                        line.push_image(*id);
                    }
                }
            }
        }
        lines
    }

    /// Join fragments with a separator.
    pub fn join(parts: impl IntoIterator<Item = Fragment>, sep: &str) -> Self {
        let mut out = Fragment::new();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                out.push_str(sep);
            }
            out.append(part);
        }
        out
    }

    /// Prefix every line; empty lines get `empty_prefix` instead.
    pub fn prefix_lines(&self, prefix: &str, empty_prefix: &str) -> Self {
        let lines = self.lines().into_iter().map(|line| {
            if line.is_empty() {
                Fragment::text(empty_prefix)
            } else {
                line.wrap(prefix, "")
            }
        });
        Fragment::join(lines, "\n")
    }

    /// Collapse runs of three or more newlines to two.
    pub fn compact_blank_lines(&self) -> Self {
        let mut run = 0;
        let mut out = Fragment::new();
        for piece in &self.pieces {
            match piece {
                Piece::Text(s) => {
                    let mut kept = String::with_capacity(s.len());
                    for c in s.chars() {
                        if c == '\n' {
                            run += 1;
                            if run > 2 {
                                continue;
                            }
                        } else {
                            run = 0;
                        }
                        kept.push(c);
                    }
                    out.push_str(&kept);
                }
                Piece::Image(id) => {
                    run = 0;
                    out.push_image(*id);
                }
            }
        }
        out
    }

    /// Serialize, writing each image with `image`.
    pub fn render(&self, mut image: impl FnMut(ImageId) -> String) -> String {
        let mut out = String::new();
        for piece in &self.pieces {
            match piece {
                Piece::Text(s) => out.push_str(s),
                Piece::Image(id) => out.push_str(&image(*id)),
            }
        }
        out
    }
}
