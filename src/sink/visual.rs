use anyhow::Result;

use super::Sink;
use crate::decision::DetectionSet;
use crate::hal::FrameWindow;
use crate::observation::VisualFrame;
use crate::overlay::annotate;
use crate::session::Shared;
use crate::shutdown::ShutdownSignal;

/// Draws detections onto the frame and presents it. Watching the window
/// for the exit key also lives here, since the window owns keyboard input.
pub struct VisualSink<W: FrameWindow> {
    window: Shared<W>,
    exit_key: char,
    shutdown: ShutdownSignal,
}

impl<W: FrameWindow> VisualSink<W> {
    pub fn new(window: Shared<W>, exit_key: char, shutdown: ShutdownSignal) -> Self {
        Self {
            window,
            exit_key,
            shutdown,
        }
    }
}

impl<W: FrameWindow> Sink<VisualFrame, DetectionSet> for VisualSink<W> {
    fn name(&self) -> &'static str {
        "window"
    }

    fn consume(&mut self, frame: &VisualFrame, detections: &DetectionSet) -> Result<()> {
        let annotated = annotate(frame, detections);
        let mut window = self.window.borrow_mut();
        let shown = window.show(&annotated);
        if window.poll_key() == Some(self.exit_key) {
            log::info!("exit key '{}' pressed", self.exit_key);
            self.shutdown.request();
        }
        shown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{BoundingBox, Detection};
    use crate::hal::HeadlessWindow;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn frame() -> VisualFrame {
        VisualFrame::new(vec![0u8; 64 * 64 * 3], 64, 64)
    }

    #[test]
    fn exit_key_requests_shutdown() {
        let window = Rc::new(RefCell::new(HeadlessWindow::new().with_key_after(2, 'q')));
        let shutdown = ShutdownSignal::new();
        let mut sink = VisualSink::new(window.clone(), 'q', shutdown.clone());

        sink.consume(&frame(), &DetectionSet::default()).unwrap();
        assert!(!shutdown.is_requested());
        sink.consume(&frame(), &DetectionSet::default()).unwrap();
        assert!(shutdown.is_requested());
        assert_eq!(window.borrow().frames_shown(), 2);
    }

    #[test]
    fn other_keys_are_ignored() {
        let window = Rc::new(RefCell::new(HeadlessWindow::new().with_key_after(0, 'x')));
        let shutdown = ShutdownSignal::new();
        let mut sink = VisualSink::new(window, 'q', shutdown.clone());
        sink.consume(&frame(), &DetectionSet::default()).unwrap();
        assert!(!shutdown.is_requested());
    }

    #[test]
    fn shown_frame_carries_the_overlay() {
        let window = Rc::new(RefCell::new(HeadlessWindow::new()));
        let mut sink = VisualSink::new(window.clone(), 'q', ShutdownSignal::new());
        let detections = DetectionSet {
            detections: vec![Detection {
                label: "dog".into(),
                confidence: 0.7,
                bbox: BoundingBox {
                    x1: 10.0,
                    y1: 20.0,
                    x2: 30.0,
                    y2: 40.0,
                },
            }],
        };
        sink.consume(&frame(), &detections).unwrap();

        let window = window.borrow();
        let shown = window.last_frame().unwrap();
        let o = (20 * 64 + 10) * 3;
        assert_eq!(&shown.pixels[o..o + 3], &[0, 255, 0]);
    }
}
