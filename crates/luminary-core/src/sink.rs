//! Render sink seam between the scheduler and whatever displays the grid.

use crate::pattern::Swatch;

/// Receives one epoch's cells and commits them on [`flush`](RenderSink::flush).
pub trait RenderSink {
    /// Represent cell `index` with `swatch`. `state_key` is stable for a
    /// given directive and swatch, so sinks may skip repeats.
    fn draw_cell(&mut self, index: usize, swatch: Swatch, state_key: u32);

    /// Commit the frame for `epoch`, returning how many cells changed.
    fn flush(&mut self, epoch: u64) -> usize;
}

impl<S: RenderSink + ?Sized> RenderSink for &mut S {
    fn draw_cell(&mut self, index: usize, swatch: Swatch, state_key: u32) {
        (**self).draw_cell(index, swatch, state_key);
    }

    fn flush(&mut self, epoch: u64) -> usize {
        (**self).flush(epoch)
    }
}

/// Sink that drops everything; used while stepping without a display.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl RenderSink for DiscardSink {
    fn draw_cell(&mut self, _index: usize, _swatch: Swatch, _state_key: u32) {}

    fn flush(&mut self, _epoch: u64) -> usize {
        0
    }
}

/// In-memory frame that keeps the last swatch per cell and counts cells
/// whose state key changed since the previous flush.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    swatches: Vec<Swatch>,
    keys: Vec<Option<u32>>,
    pending: usize,
    frames: u64,
    last_epoch: Option<u64>,
}

impl FrameBuffer {
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            swatches: vec![Swatch::Black; len],
            keys: vec![None; len],
            pending: 0,
            frames: 0,
            last_epoch: None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.swatches.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.swatches.is_empty()
    }

    #[must_use]
    pub fn swatches(&self) -> &[Swatch] {
        &self.swatches
    }

    #[must_use]
    pub fn swatch(&self, index: usize) -> Swatch {
        self.swatches[index]
    }

    #[must_use]
    pub fn state_key(&self, index: usize) -> Option<u32> {
        self.keys[index]
    }

    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frames
    }

    #[must_use]
    pub const fn last_epoch(&self) -> Option<u64> {
        self.last_epoch
    }
}

impl RenderSink for FrameBuffer {
    fn draw_cell(&mut self, index: usize, swatch: Swatch, state_key: u32) {
        if self.keys[index] == Some(state_key) {
            return;
        }
        self.keys[index] = Some(state_key);
        self.swatches[index] = swatch;
        self.pending += 1;
    }

    fn flush(&mut self, epoch: u64) -> usize {
        self.frames += 1;
        self.last_epoch = Some(epoch);
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{Pattern, state_key};

    #[test]
    fn repeated_keys_are_not_dirty() {
        let mut frame = FrameBuffer::new(4);
        let swatch = Swatch::rainbow(3);
        let key = state_key(Pattern::FullRainbow.code(), swatch);
        frame.draw_cell(1, swatch, key);
        frame.draw_cell(2, swatch, key);
        assert_eq!(frame.flush(1), 2);

        frame.draw_cell(1, swatch, key);
        let dark = Swatch::dark(3);
        frame.draw_cell(2, dark, state_key(Pattern::FullRainbow.code(), dark));
        assert_eq!(frame.flush(2), 1);
        assert_eq!(frame.swatch(2), dark);
        assert_eq!(frame.frames(), 2);
        assert_eq!(frame.last_epoch(), Some(2));
    }

    #[test]
    fn forwarding_through_mutable_reference() {
        let mut frame = FrameBuffer::new(2);
        {
            let mut sink: &mut dyn RenderSink = &mut frame;
            sink.draw_cell(0, Swatch::Black, 99);
            assert_eq!(RenderSink::flush(&mut sink, 7), 1);
        }
        assert_eq!(frame.state_key(0), Some(99));
        assert_eq!(DiscardSink.flush(7), 0);
    }
}
