// Layout synchronization module
// Keeps the image display region sized to the window as the window is resized

/// Horizontal space consumed by the display region border, in pixels
pub const H_INSET: u32 = 6;

/// Vertical space consumed by the display region border, in pixels
pub const V_INSET: u32 = 6;

/// Tracks the last observed outer window size and recomputes the image
/// display region only when the size actually changed.
///
/// Compositors can deliver configure events that do not change the outer
/// dimensions (focus changes, interactive moves); those must not trigger a
/// recompute.
pub struct LayoutSync {
    last_width: u32,
    last_height: u32,
}

impl LayoutSync {
    /// Create a synchronizer primed with the initial window size
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            last_width: width,
            last_height: height,
        }
    }

    /// Last dimensions observed by the synchronizer
    pub fn last_size(&self) -> (u32, u32) {
        (self.last_width, self.last_height)
    }

    /// Handle a window resize notification.
    ///
    /// Returns the new target size for the display region, or `None` when the
    /// outer size is unchanged or no image is currently displayed. Stored
    /// dimensions are updated in either case so a later `open` sees current
    /// geometry. `chrome_height` is passed in fresh because the toolbar
    /// height itself depends on the window width.
    pub fn on_resize(
        &mut self,
        width: u32,
        height: u32,
        has_image: bool,
        chrome_height: u32,
    ) -> Option<(u32, u32)> {
        if width == self.last_width && height == self.last_height {
            return None;
        }
        self.last_width = width;
        self.last_height = height;

        if !has_image {
            return None;
        }
        Some(display_region(width, height, chrome_height))
    }
}

/// Target size of the display region for a window of the given outer size
pub fn display_region(width: u32, height: u32, chrome_height: u32) -> (u32, u32) {
    (
        width.saturating_sub(H_INSET),
        height.saturating_sub(V_INSET).saturating_sub(chrome_height),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_recomputes_region_below_chrome() {
        let mut sync = LayoutSync::new(800, 600);
        let region = sync.on_resize(1000, 700, true, 28);
        assert_eq!(region, Some((1000 - H_INSET, 700 - V_INSET - 28)));
        assert_eq!(sync.last_size(), (1000, 700));
    }

    #[test]
    fn unchanged_size_is_a_no_op() {
        let mut sync = LayoutSync::new(800, 600);
        assert_eq!(sync.on_resize(800, 600, true, 28), None);
        assert_eq!(sync.last_size(), (800, 600));
    }

    #[test]
    fn resize_without_image_updates_dimensions_only() {
        let mut sync = LayoutSync::new(800, 600);
        assert_eq!(sync.on_resize(900, 650, false, 28), None);
        // the new size was still recorded
        assert_eq!(sync.last_size(), (900, 650));
        // so the same size arriving again with an image loaded changes nothing
        assert_eq!(sync.on_resize(900, 650, true, 28), None);
    }

    #[test]
    fn chrome_height_is_read_per_call() {
        let mut sync = LayoutSync::new(800, 600);
        assert_eq!(sync.on_resize(400, 600, true, 56), Some((400 - H_INSET, 600 - V_INSET - 56)));
        assert_eq!(sync.on_resize(800, 600, true, 28), Some((800 - H_INSET, 600 - V_INSET - 28)));
    }

    #[test]
    fn tiny_windows_saturate_to_zero() {
        assert_eq!(display_region(4, 20, 28), (0, 0));
    }
}
