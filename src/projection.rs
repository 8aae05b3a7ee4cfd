//! Which filtered records are on screen, and in what order.

pub const DEFAULT_WINDOW: usize = 5;
pub const WINDOW_STEP: usize = 5;

/// "Show more" / "show less" window over the most recent records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    default: usize,
    visible: usize,
}

impl Default for Window {
    fn default() -> Self {
        Window::new(DEFAULT_WINDOW)
    }
}

impl Window {
    pub fn new(default: usize) -> Self {
        let default = default.max(1);
        Window { default, visible: default }
    }

    pub fn visible(&self) -> usize {
        self.visible
    }

    pub fn default_size(&self) -> usize {
        self.default
    }

    /// Grows by one step, never past `total` nor below the default.
    pub fn show_more(&mut self, total: usize) {
        self.visible = (self.visible + WINDOW_STEP).min(total.max(self.default));
    }

    pub fn show_less(&mut self) {
        self.visible = self.default;
    }

    pub fn can_show_more(&self, total: usize) -> bool {
        self.visible < total
    }

    pub fn can_show_less(&self) -> bool {
        self.visible > self.default
    }

    /// Without a search: the last `visible` records, newest first.
    /// With a search: every filtered record, original order.
    pub fn project<'a, T>(&self, filtered: &[&'a T], searching: bool) -> Vec<&'a T> {
        if searching {
            return filtered.to_vec();
        }
        let skip = filtered.len().saturating_sub(self.visible);
        filtered[skip..].iter().rev().copied().collect()
    }
}
