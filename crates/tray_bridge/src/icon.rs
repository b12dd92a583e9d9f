/// An image pushed by an item as a pixmap, already converted to RGBA32.
///
/// Equality compares the pixel data byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pixmap {
    pub width: i32,
    pub height: i32,
    pub rgba: Vec<u8>,
}

impl Pixmap {
    /// Load a pixmap from StatusNotifierItem's [Icon format].
    ///
    /// Returns `None` if the data doesn't match the given dimensions.
    ///
    /// [Icon format]: https://freedesktop.org/wiki/Specifications/StatusNotifierItem/Icons/
    pub fn from_argb(width: i32, height: i32, mut data: Vec<u8>) -> Option<Self> {
        if width <= 0 || height <= 0 || data.len() != 4 * width as usize * height as usize {
            return None;
        }

        // Convert data from ARGB32 to RGBA32, which is what renderers understand.
        for chunk in data.chunks_mut(4) {
            chunk.rotate_left(1);
        }

        Some(Self { width, height, rgba: data })
    }

    /// From a list of pixmaps, pick the largest one that is well formed.
    ///
    /// This function returns None if and only if no usable pixmaps are provided.
    pub fn largest(pixmaps: Vec<(i32, i32, Vec<u8>)>) -> Option<Self> {
        pixmaps
            .into_iter()
            .filter(|(w, h, data)| *w > 0 && *h > 0 && data.len() == 4 * *w as usize * *h as usize)
            // first of equally sized images wins
            .rev()
            .max_by_key(|(w, h, _)| i64::from(*w) * i64::from(*h))
            .and_then(|(w, h, data)| Pixmap::from_argb(w, h, data))
    }
}

/// One way of drawing an icon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconSource {
    /// A themed icon name, or an absolute path to an image file.
    Name(String),
    Pixmap(Pixmap),
}

/// Everything a renderer needs to draw an item.
///
/// Renderers are expected to prefer the named icon, looked up in the user's theme (with
/// `theme_path` as an extra search path), and only fall back to the pixmap. Overlays are drawn on
/// top of the main icon.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisplayIcon {
    pub theme_path: Option<String>,
    pub name: Option<String>,
    pub pixmap: Option<Pixmap>,
    pub overlay_name: Option<String>,
    pub overlay_pixmap: Option<Pixmap>,
}

impl DisplayIcon {
    /// Preferred source of the main icon.
    pub fn main(&self) -> Option<IconSource> {
        // "Visualizations are encouraged to prefer icon names over icon pixmaps if both are
        // available."
        match (&self.name, &self.pixmap) {
            (Some(name), _) => Some(IconSource::Name(name.clone())),
            (None, Some(pixmap)) => Some(IconSource::Pixmap(pixmap.clone())),
            (None, None) => None,
        }
    }

    /// Preferred source of the overlay icon.
    pub fn overlay(&self) -> Option<IconSource> {
        match (&self.overlay_name, &self.overlay_pixmap) {
            (Some(name), _) => Some(IconSource::Name(name.clone())),
            (None, Some(pixmap)) => Some(IconSource::Pixmap(pixmap.clone())),
            (None, None) => None,
        }
    }

    /// Whether the icon name should be read as a file path instead of a theme lookup.
    pub fn name_is_path(&self) -> bool {
        self.name.as_deref().is_some_and(|name| std::path::Path::new(name).is_absolute())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_argb_to_rgba() {
        let pixmap = Pixmap::from_argb(1, 2, vec![0xff, 1, 2, 3, 0x80, 4, 5, 6]).unwrap();
        assert_eq!(pixmap.rgba, vec![1, 2, 3, 0xff, 4, 5, 6, 0x80]);
    }

    #[test]
    fn test_pixmap_sanity_check() {
        assert_eq!(Pixmap::from_argb(2, 2, vec![0; 12]), None);
        assert_eq!(Pixmap::from_argb(0, 0, vec![]), None);
    }

    #[test]
    fn test_largest_pixmap_wins() {
        let pixmaps = vec![
            (1, 1, vec![0xff, 1, 1, 1]),
            (2, 2, vec![0xff, 2, 2, 2].repeat(4)),
            // claims to be large but the data doesn't match
            (16, 16, vec![0; 4]),
        ];
        let pixmap = Pixmap::largest(pixmaps).unwrap();
        assert_eq!((pixmap.width, pixmap.height), (2, 2));
        assert_eq!(&pixmap.rgba[..4], &[2, 2, 2, 0xff]);
    }

    #[test]
    fn test_largest_pixmap_empty() {
        assert_eq!(Pixmap::largest(vec![]), None);
    }

    #[test]
    fn test_name_preferred_over_pixmap() {
        let pixmap = Pixmap::from_argb(1, 1, vec![0xff, 0, 0, 0]).unwrap();
        let icon = DisplayIcon {
            name: Some("nm-applet".to_owned()),
            pixmap: Some(pixmap.clone()),
            overlay_pixmap: Some(pixmap.clone()),
            ..Default::default()
        };
        assert_eq!(icon.main(), Some(IconSource::Name("nm-applet".to_owned())));
        assert_eq!(icon.overlay(), Some(IconSource::Pixmap(pixmap)));
        assert!(!icon.name_is_path());
    }
}
