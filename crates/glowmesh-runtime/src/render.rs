//! Renderer interface
//!
//! The renderer reads display mode and phase; it never writes protocol
//! state. The controller flag is cosmetic only.

use glowmesh_core::{DisplayMode, NodeId, Phase};

/// Everything a renderer may look at for one frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameView {
    pub node: NodeId,
    pub mode: DisplayMode,
    pub phase: Phase,
    /// Draw the controller accent
    pub accent: bool,
}

impl FrameView {
    /// Hue on a 0-255 wheel. Connected nodes share the phase-driven hue;
    /// an isolated node spins its wheel the other way.
    pub fn hue(&self) -> u8 {
        match self.mode {
            DisplayMode::Connected => self.phase.value(),
            DisplayMode::Alone => u8::MAX - self.phase.value(),
        }
    }
}

pub trait Renderer {
    fn render(&mut self, frame: &FrameView);
}

/// Keeps the most recent frame and a frame count
#[derive(Clone, Debug, Default)]
pub struct LastFrame {
    pub frame: Option<FrameView>,
    pub frames: u64,
}

impl Renderer for LastFrame {
    fn render(&mut self, frame: &FrameView) {
        self.frame = Some(*frame);
        self.frames += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hue_follows_phase() {
        let mut frame = FrameView {
            node: NodeId::new(1),
            mode: DisplayMode::Connected,
            phase: Phase::new(40),
            accent: false,
        };
        assert_eq!(frame.hue(), 40);
        frame.mode = DisplayMode::Alone;
        assert_eq!(frame.hue(), 215);
    }

    #[test]
    fn test_last_frame_records() {
        let mut r = LastFrame::default();
        let frame = FrameView {
            node: NodeId::new(1),
            mode: DisplayMode::Alone,
            phase: Phase::ZERO,
            accent: true,
        };
        r.render(&frame);
        r.render(&frame);
        assert_eq!(r.frames, 2);
        assert_eq!(r.frame, Some(frame));
    }
}
