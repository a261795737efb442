//! Display projection math.
//!
//! Maps the display's layer stack onto the encoder surface so that the whole
//! display is visible with its aspect ratio preserved, centered and
//! letterboxed or pillarboxed as needed.

use crate::models::config::VideoSize;
use crate::models::display::{DisplayGeometry, ProjectionRect, Rect, Rotation};

/// Compute the projection of `display` onto a `video` sized surface.
///
/// The destination rect is interpreted post-rotation by the compositor, so
/// when `rotate` is set the canvas is pre-rotated by swapping the video axes
/// and a 90 degree rotation is applied.
pub fn compute_projection(display: &DisplayGeometry, video: VideoSize, rotate: bool) -> ProjectionRect {
    let source = display.layer_stack_rect();
    let canvas = if rotate { video.swapped() } else { video };

    let destination = if source.width() == 0 || source.height() == 0 {
        Rect::from_size(canvas.width, canvas.height)
    } else {
        let display_aspect = source.height() as f32 / source.width() as f32;

        let (out_width, out_height) =
            if canvas.height > (canvas.width as f32 * display_aspect) as u32 {
                // limited by narrow width; reduce height
                (canvas.width, (canvas.width as f32 * display_aspect) as u32)
            } else {
                // limited by short height; restrict width
                ((canvas.height as f32 / display_aspect) as u32, canvas.height)
            };

        let off_x = (canvas.width - out_width) / 2;
        let off_y = (canvas.height - out_height) / 2;
        Rect::new(off_x, off_y, off_x + out_width, off_y + out_height)
    };

    if rotate {
        log::info!(
            "Rotated content area is {}x{} at offset x={} y={}",
            destination.height(),
            destination.width(),
            destination.top,
            destination.left
        );
    } else {
        log::info!(
            "Content area is {}x{} at offset x={} y={}",
            destination.width(),
            destination.height(),
            destination.left,
            destination.top
        );
    }

    ProjectionRect {
        source,
        destination,
        rotation: if rotate { Rotation::Rotation90 } else { Rotation::Rotation0 },
    }
}
