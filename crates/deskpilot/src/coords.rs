//! Coordinate conversion between the model's virtual display and the
//! physical screen.
//!
//! The remote model reasons over an XGA-sized (1024x768) screenshot, so
//! every coordinate it sends has to be scaled up to the real display
//! before injection, and cursor positions scaled back down before they
//! are reported.

use crate::screenshot::{TARGET_HEIGHT, TARGET_WIDTH};

/// Which coordinate space a value originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordSource {
    /// Coordinates from the remote model (virtual 1024x768 display).
    Api,
    /// Coordinates from the physical screen.
    Screen,
}

/// Scale `(x, y)` between the API's virtual display and a physical
/// screen of `screen_w` x `screen_h` pixels.
pub fn scale_coordinates(
    source: CoordSource,
    x: u32,
    y: u32,
    screen_w: u32,
    screen_h: u32,
) -> (u32, u32) {
    match source {
        CoordSource::Api => (
            scale(x, screen_w, TARGET_WIDTH),
            scale(y, screen_h, TARGET_HEIGHT),
        ),
        CoordSource::Screen => (
            scale(x, TARGET_WIDTH, screen_w),
            scale(y, TARGET_HEIGHT, screen_h),
        ),
    }
}

fn scale(v: u32, numerator: u32, denominator: u32) -> u32 {
    if denominator == 0 {
        return 0;
    }
    ((v as f64) * (numerator as f64) / (denominator as f64)) as u32
}

/// Validate an API-space coordinate and convert it to screen space.
///
/// Returns an error message (suitable for a tool result) when the scaled
/// point falls outside the screen.
pub fn api_to_screen_checked(
    x: u32,
    y: u32,
    screen_w: u32,
    screen_h: u32,
) -> Result<(u32, u32), String> {
    let (sx, sy) = scale_coordinates(CoordSource::Api, x, y, screen_w, screen_h);
    if sx > screen_w || sy > screen_h {
        return Err(format!(
            "Scaled coordinates {sx}, {sy} are outside screen bounds ({screen_w}x{screen_h})"
        ));
    }
    Ok((sx, sy))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_coords_scale_up_to_screen() {
        // 1024x768 virtual on a 2048x1536 screen: everything doubles.
        let (x, y) = scale_coordinates(CoordSource::Api, 512, 384, 2048, 1536);
        assert_eq!((x, y), (1024, 768));
    }

    #[test]
    fn screen_coords_scale_down_to_api() {
        let (x, y) = scale_coordinates(CoordSource::Screen, 1024, 768, 2048, 1536);
        assert_eq!((x, y), (512, 384));
    }

    #[test]
    fn identity_when_screen_matches_target() {
        let (x, y) = scale_coordinates(CoordSource::Api, 100, 200, 1024, 768);
        assert_eq!((x, y), (100, 200));
    }

    #[test]
    fn round_trip_is_stable_for_even_ratios() {
        let (sx, sy) = scale_coordinates(CoordSource::Api, 300, 500, 4096, 3072);
        let (ax, ay) = scale_coordinates(CoordSource::Screen, sx, sy, 4096, 3072);
        assert_eq!((ax, ay), (300, 500));
    }

    #[test]
    fn out_of_bounds_is_rejected() {
        let err = api_to_screen_checked(5000, 10, 1920, 1080).unwrap_err();
        assert!(err.contains("outside screen bounds"));
    }

    #[test]
    fn zero_screen_does_not_divide_by_zero() {
        let (x, y) = scale_coordinates(CoordSource::Screen, 10, 10, 0, 0);
        assert_eq!((x, y), (0, 0));
    }
}
