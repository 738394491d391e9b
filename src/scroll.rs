//! Scroll-follow behaviour of the chat pane.

use std::time::{Duration, Instant};

/// Minimum spacing between two smooth scroll-to-bottom triggers
pub const SMOOTH_THROTTLE: Duration = Duration::from_millis(300);

#[derive(Debug, Default)]
pub struct ScrollState {
    offset: u16,
    stick: bool,
    content_lines: u16,
    viewport_height: u16,
    /// Jump to the bottom on the next layout pass
    pin_pending: bool,
    /// A smooth scroll is closing in on the bottom, one step per tick
    animating: bool,
    last_smooth: Option<Instant>,
}

impl ScrollState {
    pub fn new(stick: bool) -> Self {
        Self {
            stick,
            ..Self::default()
        }
    }

    pub fn offset(&self) -> u16 {
        self.offset
    }

    pub fn is_stick(&self) -> bool {
        self.stick
    }

    pub fn max_offset(&self) -> u16 {
        self.content_lines.saturating_sub(self.viewport_height)
    }

    pub fn is_at_bottom(&self) -> bool {
        self.offset >= self.max_offset()
    }

    /// Turning stick on scrolls smoothly to the newest content
    pub fn set_stick(&mut self, stick: bool, now: Instant) {
        let was = self.stick;
        self.stick = stick;
        if stick && !was {
            self.smooth_to_bottom(now);
        }
    }

    pub fn toggle_stick(&mut self, now: Instant) {
        self.set_stick(!self.stick, now);
    }

    /// User scrolled towards older content; this always releases stick
    pub fn scroll_up(&mut self, lines: u16) {
        self.offset = self.offset.saturating_sub(lines);
        self.stick = false;
        self.animating = false;
        self.pin_pending = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.offset = self.offset.saturating_add(lines).min(self.max_offset());
    }

    /// Throttled smooth scroll. Returns `false` if the trigger was swallowed.
    pub fn smooth_to_bottom(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_smooth {
            if now.saturating_duration_since(last) < SMOOTH_THROTTLE {
                return false;
            }
        }
        self.last_smooth = Some(now);
        self.animating = true;
        true
    }

    pub fn instant_to_bottom(&mut self) {
        self.pin_pending = true;
        self.animating = false;
    }

    /// Re-pin after new content, if stick is on
    pub fn follow(&mut self) {
        if self.stick {
            self.instant_to_bottom();
        }
    }

    /// Called on every render with the current content and viewport size
    pub fn layout(&mut self, content_lines: u16, viewport_height: u16) {
        self.content_lines = content_lines;
        self.viewport_height = viewport_height;

        if self.pin_pending {
            self.pin_pending = false;
            self.offset = self.max_offset();
        }
        self.offset = self.offset.min(self.max_offset());
    }

    /// Advance a smooth scroll by half the remaining distance
    pub fn tick(&mut self) {
        if !self.animating {
            return;
        }
        let remaining = self.max_offset().saturating_sub(self.offset);
        if remaining == 0 {
            self.animating = false;
            return;
        }
        self.offset += remaining.div_ceil(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn laid_out(stick: bool) -> ScrollState {
        let mut scroll = ScrollState::new(stick);
        scroll.layout(100, 20);
        scroll
    }

    #[test]
    fn test_upward_scroll_clears_stick() {
        let mut scroll = laid_out(true);
        scroll.instant_to_bottom();
        scroll.layout(100, 20);
        assert_eq!(scroll.offset(), 80);

        scroll.scroll_down(3);
        assert!(scroll.is_stick());
        scroll.scroll_up(1);
        assert!(!scroll.is_stick());
        assert_eq!(scroll.offset(), 79);
    }

    #[test]
    fn test_follow_pins_only_when_stuck() {
        let mut scroll = laid_out(false);
        scroll.follow();
        scroll.layout(120, 20);
        assert_eq!(scroll.offset(), 0);

        let mut scroll = laid_out(true);
        scroll.follow();
        scroll.layout(120, 20);
        assert_eq!(scroll.offset(), 100);
    }

    #[test]
    fn test_smooth_scroll_is_throttled() {
        let mut scroll = laid_out(false);
        let start = Instant::now();

        assert!(scroll.smooth_to_bottom(start));
        assert!(!scroll.smooth_to_bottom(start + Duration::from_millis(299)));
        assert!(scroll.smooth_to_bottom(start + Duration::from_millis(300)));
    }

    #[test]
    fn test_smooth_scroll_converges_over_ticks() {
        let mut scroll = laid_out(false);
        scroll.smooth_to_bottom(Instant::now());

        scroll.tick();
        assert_eq!(scroll.offset(), 40);
        scroll.tick();
        assert_eq!(scroll.offset(), 60);
        for _ in 0..10 {
            scroll.tick();
        }
        assert!(scroll.is_at_bottom());
        assert_eq!(scroll.offset(), 80);
    }

    #[test]
    fn test_enabling_stick_starts_smooth_scroll() {
        let mut scroll = laid_out(false);
        scroll.toggle_stick(Instant::now());
        assert!(scroll.is_stick());
        scroll.tick();
        assert!(scroll.offset() > 0);
    }

    #[test]
    fn test_offset_clamped_when_content_shrinks() {
        let mut scroll = laid_out(true);
        scroll.instant_to_bottom();
        scroll.layout(100, 20);
        scroll.layout(10, 20);
        assert_eq!(scroll.offset(), 0);
    }
}
