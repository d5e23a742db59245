//! Windowing boundary consumed by the RHI.

use raw_window_handle::{HandleError, HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use winit::window::Window;

use crate::types::Extent2D;

/// The only things the RHI needs from a window: its live framebuffer size, a way to let events flow
/// while waiting for a usable size, and the raw handles for surface creation.
pub trait RhiWindow {
    fn framebuffer_size(&self) -> Extent2D;

    /// Gives the windowing system a chance to process events; may block.
    fn poll_events(&self);

    fn raw_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle), HandleError>;

    /// Called right before a present is queued.
    fn pre_present(&self) {}
}

impl RhiWindow for Window {
    fn framebuffer_size(&self) -> Extent2D {
        let size = self.inner_size();
        Extent2D::new(size.width, size.height)
    }

    fn poll_events(&self) {
        // winit dispatches events from its own loop; the size is re-queried from the OS.
        std::thread::sleep(std::time::Duration::from_millis(10));
    }

    fn raw_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle), HandleError> {
        let display_handle = self.display_handle()?.as_raw();
        let window_handle = self.window_handle()?.as_raw();
        Ok((display_handle, window_handle))
    }

    fn pre_present(&self) {
        self.pre_present_notify();
    }
}
