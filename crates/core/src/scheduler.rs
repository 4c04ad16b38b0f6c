//! FIFO request queue.
//!
//! The headset has a tiny command buffer and no flow control, so commands
//! are spaced out with [`RequestTag::Noop`] ticks rather than written back to
//! back. One tag is consumed per tick of the fast trigger.

use crate::hidpp::RequestTag;
use std::collections::VecDeque;

/// Spacing ticks inserted after each lighting command.
pub const LIGHTING_SPACING_TICKS: usize = 4;

/// Pending requests, processed strictly in insertion order.
#[derive(Debug, Default)]
pub struct RequestQueue {
    queue: VecDeque<RequestTag>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tag: RequestTag) {
        self.queue.push_back(tag);
    }

    pub fn pop(&mut self) -> Option<RequestTag> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RequestTag> {
        self.queue.iter()
    }

    /// Queue the lighting program: strip command, spacing, logo command,
    /// spacing.
    pub fn push_lighting(&mut self, on: bool) {
        let (strip, logo) = if on {
            (RequestTag::LightsOn, RequestTag::LogoOn)
        } else {
            (RequestTag::LightsOff, RequestTag::LogoOff)
        };
        self.push(strip);
        self.push_spacing();
        self.push(logo);
        self.push_spacing();
    }

    fn push_spacing(&mut self) {
        self.queue
            .extend(std::iter::repeat(RequestTag::Noop).take(LIGHTING_SPACING_TICKS));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let mut q = RequestQueue::new();
        assert!(q.is_empty());
        q.push(RequestTag::Version);
        q.push(RequestTag::Voltage);
        assert!(!q.is_empty());
        assert_eq!(q.pop(), Some(RequestTag::Version));
        assert_eq!(q.pop(), Some(RequestTag::Voltage));
        assert_eq!(q.pop(), None);
        assert!(q.is_empty());
    }

    #[test]
    fn lighting_on_program() {
        let mut q = RequestQueue::new();
        q.push_lighting(true);
        let tags: Vec<_> = q.iter().copied().collect();
        use RequestTag::*;
        assert_eq!(
            tags,
            vec![LightsOn, Noop, Noop, Noop, Noop, LogoOn, Noop, Noop, Noop, Noop]
        );
    }

    #[test]
    fn lighting_off_program() {
        let mut q = RequestQueue::new();
        q.push_lighting(false);
        assert_eq!(q.len(), 10);
        assert_eq!(q.pop(), Some(RequestTag::LightsOff));
        assert_eq!(q.iter().nth(4), Some(&RequestTag::LogoOff));
    }

    #[test]
    fn lighting_program_appends_after_existing_work() {
        let mut q = RequestQueue::new();
        q.push(RequestTag::Voltage);
        q.push_lighting(true);
        assert_eq!(q.pop(), Some(RequestTag::Voltage));
        assert_eq!(q.pop(), Some(RequestTag::LightsOn));
    }
}
