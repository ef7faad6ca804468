//! Contains the FractalSpace struct, which describes the window the
//! viewer currently has onto the complex plane: a zoom scale, a pan
//! offset, and the iteration budget for the escape-time kernel.  The
//! controller mutates it between frames in response to input; the
//! workers only ever see a copied snapshot, taken once per frame
//! while the controller is known to be idle.

use num::Complex;

/// The view parameters for one frame.  `Copy` on purpose: workers
/// snapshot the whole thing at the top of each frame, so a stable
/// view for the duration of a frame costs one struct copy and no
/// locking during the pixel loop.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FractalSpace {
    /// Zoom factor.  Larger values show more of the plane.
    pub scale: f64,
    /// Horizontal pan, in (fractional) pixels.
    pub offset_x: f64,
    /// Vertical pan, in (fractional) pixels.
    pub offset_y: f64,
    /// Maximum iterations per pixel before a point is declared inside
    /// the set.
    pub iteration_limit: u32,
}

impl FractalSpace {
    /// Given the column and row of a pixel on the integral plane and
    /// the image dimensions, return the complex number at the
    /// equivalent location on the complex plane.
    pub fn pixel_to_point(&self, px: usize, py: usize, width: usize, height: usize) -> Complex<f64> {
        Complex::new(
            (px as f64 + self.offset_x) / (width as f64) * self.scale,
            (py as f64 + self.offset_y) / (height as f64) * self.scale,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space(scale: f64, offset_x: f64, offset_y: f64) -> FractalSpace {
        FractalSpace {
            scale,
            offset_x,
            offset_y,
            iteration_limit: 32,
        }
    }

    #[test]
    fn unshifted_origin_maps_to_zero() {
        let s = space(2.0, 0.0, 0.0);
        assert_eq!(s.pixel_to_point(0, 0, 4, 4), Complex::new(0.0, 0.0));
    }

    #[test]
    fn offsets_pan_the_window() {
        let s = space(2.0, -2.0, -2.0);
        assert_eq!(s.pixel_to_point(0, 0, 4, 4), Complex::new(-1.0, -1.0));
        assert_eq!(s.pixel_to_point(2, 2, 4, 4), Complex::new(0.0, 0.0));
        assert_eq!(s.pixel_to_point(4, 4, 4, 4), Complex::new(1.0, 1.0));
    }

    #[test]
    fn scale_zooms_about_the_shifted_origin() {
        let wide = space(4.0, -2.0, -2.0);
        let narrow = space(1.0, -2.0, -2.0);
        assert_eq!(wide.pixel_to_point(4, 4, 4, 4), Complex::new(2.0, 2.0));
        assert_eq!(narrow.pixel_to_point(4, 4, 4, 4), Complex::new(0.5, 0.5));
    }

    #[test]
    fn dimensions_normalize_independently() {
        let s = space(2.0, 0.0, 0.0);
        assert_eq!(s.pixel_to_point(320, 240, 640, 480), Complex::new(1.0, 1.0));
        assert_eq!(s.pixel_to_point(160, 360, 640, 480), Complex::new(0.5, 1.5));
    }
}
