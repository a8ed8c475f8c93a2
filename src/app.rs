use std::time::Instant;

use winit::dpi::PhysicalSize;

/// Device pixel ratios above this are capped when sizing the surface.
pub const MAX_PIXEL_RATIO: f64 = 2.0;

/// Aspect ratio for a window size, guarding the zero-height minimize case.
pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    if height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}

/// Render surface size for a window, with the device pixel ratio capped at
/// [`MAX_PIXEL_RATIO`]. Window sizes arrive already scaled by the full
/// ratio, so oversized ratios are rescaled down toward the cap.
pub fn surface_size(window_size: PhysicalSize<u32>, scale_factor: f64) -> PhysicalSize<u32> {
    let ratio = if scale_factor > 0.0 {
        scale_factor.min(MAX_PIXEL_RATIO) / scale_factor
    } else {
        1.0
    };
    PhysicalSize::new(
        ((f64::from(window_size.width) * ratio).round() as u32).max(1),
        ((f64::from(window_size.height) * ratio).round() as u32).max(1),
    )
}

/// Pixels per point at which the renderer draws, capped to stay consistent
/// with [`surface_size`]. Layout happens in points at the native ratio, so
/// the capped ratio maps those points exactly onto the capped surface.
pub fn render_pixel_ratio(scale_factor: f32) -> f32 {
    if scale_factor > 0.0 {
        scale_factor.min(MAX_PIXEL_RATIO as f32)
    } else {
        1.0
    }
}

/// Galaxy rotation angle around +Y after `elapsed` seconds.
pub fn galaxy_angle(elapsed: f32) -> f32 {
    elapsed / 4.0
}

/// Starfield rotation angle around +Y after `elapsed` seconds.
pub fn starfield_angle(elapsed: f32) -> f32 {
    elapsed / 20.0
}

/// Timing values for one frame, passed explicitly into the render step.
#[derive(Debug, Clone, Copy)]
pub struct FrameTiming {
    /// Seconds since the clock was started.
    pub elapsed: f32,
    /// Seconds since the previous frame.
    pub dt: f32,
}

/// Produces [`FrameTiming`] values, one per rendered frame.
pub struct FrameClock {
    started: Instant,
    last_frame: Instant,
}

impl FrameClock {
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last_frame: now,
        }
    }

    /// Advances the clock to the next frame.
    pub fn tick(&mut self) -> FrameTiming {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> FrameTiming {
        let timing = FrameTiming {
            elapsed: now.duration_since(self.started).as_secs_f32(),
            dt: now.duration_since(self.last_frame).as_secs_f32(),
        };
        self.last_frame = now;
        timing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn aspect_is_width_over_height() {
        assert_eq!(aspect_ratio(1280, 720), 1280.0 / 720.0);
        assert_eq!(aspect_ratio(1920, 1080), 1920.0 / 1080.0);
        assert_eq!(aspect_ratio(800, 0), 1.0);
    }

    #[test]
    fn surface_size_passes_ratios_up_to_the_cap() {
        let size = PhysicalSize::new(1280, 720);
        assert_eq!(surface_size(size, 1.0), size);
        assert_eq!(surface_size(size, 2.0), size);
    }

    #[test]
    fn surface_size_caps_oversized_ratios() {
        let size = PhysicalSize::new(3840, 2160);
        let capped = surface_size(size, 3.0);
        assert_eq!(capped, PhysicalSize::new(2560, 1440));
        assert_eq!(surface_size(PhysicalSize::new(1, 1), 4.0), PhysicalSize::new(1, 1));
    }

    #[test]
    fn render_pixel_ratio_tracks_the_surface_cap() {
        assert_eq!(render_pixel_ratio(1.0), 1.0);
        assert_eq!(render_pixel_ratio(2.0), 2.0);
        assert_eq!(render_pixel_ratio(3.0), 2.0);
        assert_eq!(render_pixel_ratio(0.0), 1.0);

        // On a 3x display the window spans 3840 physical pixels but only
        // 1280 points. The capped ratio has to land those points on the
        // capped surface, not the native one.
        let surface = surface_size(PhysicalSize::new(3840, 2160), 3.0);
        let points_wide = 3840.0 / 3.0;
        assert_eq!((points_wide * render_pixel_ratio(3.0)) as u32, surface.width);
    }

    #[test]
    fn rotation_schedule_matches_the_divisors() {
        assert_eq!(galaxy_angle(8.0), 2.0);
        assert_eq!(starfield_angle(10.0), 0.5);
        // The galaxy turns five times as fast as the backdrop.
        assert_eq!(galaxy_angle(1.0), 5.0 * starfield_angle(1.0));
    }

    #[test]
    fn frame_clock_reports_elapsed_and_delta() {
        let start = Instant::now();
        let mut clock = FrameClock {
            started: start,
            last_frame: start,
        };
        let first = clock.tick_at(start + Duration::from_millis(16));
        assert!((first.elapsed - 0.016).abs() < 1e-6);
        assert!((first.dt - 0.016).abs() < 1e-6);

        let second = clock.tick_at(start + Duration::from_millis(48));
        assert!((second.elapsed - 0.048).abs() < 1e-6);
        assert!((second.dt - 0.032).abs() < 1e-6);
    }
}
