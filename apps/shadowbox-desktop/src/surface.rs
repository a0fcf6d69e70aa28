use std::sync::Arc;

use shadowbox_common::Extent;
use shadowbox_kernel::{Surface, SurfaceError, SurfaceMode};
use winit::dpi::PhysicalSize;
use winit::window::{Fullscreen, Window};

/// The application window as a [`Surface`].
///
/// Full-screen is exclusive and needs a monitor video mode of exactly the
/// requested size.
pub struct WinitSurface {
    window: Arc<Window>,
    mode: SurfaceMode,
}

impl WinitSurface {
    pub fn new(window: Arc<Window>) -> Self {
        let size = window.inner_size();
        Self {
            mode: SurfaceMode::Windowed(Extent::new(size.width, size.height)),
            window,
        }
    }
}

impl Surface for WinitSurface {
    fn mode(&self) -> SurfaceMode {
        self.mode
    }

    fn set_mode(&mut self, mode: SurfaceMode) -> Result<Extent, SurfaceError> {
        let extent = match mode {
            SurfaceMode::Fullscreen(extent) => {
                let monitor = self
                    .window
                    .current_monitor()
                    .ok_or_else(|| SurfaceError::Platform("no current monitor".into()))?;
                let video_mode = monitor
                    .video_modes()
                    .filter(|m| m.size() == PhysicalSize::new(extent.width, extent.height))
                    .max_by_key(|m| m.refresh_rate_millihertz())
                    .ok_or(SurfaceError::ModeUnavailable(mode))?;
                self.window
                    .set_fullscreen(Some(Fullscreen::Exclusive(video_mode)));
                extent
            }
            SurfaceMode::Windowed(extent) => {
                self.window.set_fullscreen(None);
                let applied = self
                    .window
                    .request_inner_size(PhysicalSize::new(extent.width, extent.height));
                applied.map_or(extent, |size| Extent::new(size.width, size.height))
            }
        };
        self.mode = mode;
        Ok(extent)
    }
}
