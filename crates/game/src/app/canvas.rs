use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture, TextureError};
use winit::window::Window;

pub(crate) const CLEAR_COLOR: [u8; 4] = [18, 20, 28, 255];
const BANNER_HEIGHT_PX: i32 = 48;
const BANNER_BORDER_COLOR: [u8; 4] = [220, 220, 230, 255];

/// Fixed-size RGBA buffer scaled onto the window surface.
pub(crate) struct PixelCanvas {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    width: u32,
    height: u32,
}

impl PixelCanvas {
    pub(crate) fn new(window: Arc<Window>, width: u32, height: u32) -> Result<Self, Error> {
        let size = window.inner_size();
        let surface = SurfaceTexture::new(size.width, size.height, Arc::clone(&window));
        let pixels = Pixels::new(width, height, surface)?;
        Ok(Self {
            window,
            pixels,
            width,
            height,
        })
    }

    pub(crate) fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub(crate) fn window(&self) -> &Window {
        &self.window
    }

    pub(crate) fn resize_surface(&mut self, width: u32, height: u32) -> Result<(), TextureError> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels.resize_surface(width, height)
    }

    pub(crate) fn frame_mut(&mut self) -> &mut [u8] {
        self.pixels.frame_mut()
    }

    pub(crate) fn present(&self) -> Result<(), Error> {
        self.pixels.render()
    }
}

pub(crate) fn fill(frame: &mut [u8], color: [u8; 4]) {
    for pixel in frame.chunks_exact_mut(4) {
        pixel.copy_from_slice(&color);
    }
}

/// Horizontal band across the vertical middle of the frame.
pub(crate) fn draw_banner(frame: &mut [u8], width: u32, height: u32, color: [u8; 4]) {
    if width == 0 || height == 0 {
        return;
    }
    let top = (height as i32 - BANNER_HEIGHT_PX) / 2;
    draw_filled_rect(frame, width, height, 0, top, width as i32, BANNER_HEIGHT_PX, color);
    draw_filled_rect(frame, width, height, 0, top, width as i32, 1, BANNER_BORDER_COLOR);
    draw_filled_rect(
        frame,
        width,
        height,
        0,
        top + BANNER_HEIGHT_PX - 1,
        width as i32,
        1,
        BANNER_BORDER_COLOR,
    );
}

fn write_pixel_rgba(frame: &mut [u8], width: usize, x: usize, y: usize, color: [u8; 4]) {
    let Some(byte_offset) = y
        .checked_mul(width)
        .and_then(|row| row.checked_add(x))
        .and_then(|pixel| pixel.checked_mul(4))
    else {
        return;
    };
    if let Some(target) = frame.get_mut(byte_offset..byte_offset.saturating_add(4)) {
        target.copy_from_slice(&color);
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn draw_filled_rect(
    frame: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    rect_width: i32,
    rect_height: i32,
    color: [u8; 4],
) {
    let start_x = x.max(0);
    let start_y = y.max(0);
    let end_x = x.saturating_add(rect_width).min(width as i32);
    let end_y = y.saturating_add(rect_height).min(height as i32);
    if end_x <= start_x || end_y <= start_y {
        return;
    }

    for py in start_y..end_y {
        for px in start_x..end_x {
            write_pixel_rgba(frame, width as usize, px as usize, py as usize, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [u8; 4] = [255, 0, 0, 255];

    fn pixel(frame: &[u8], width: u32, x: usize, y: usize) -> [u8; 4] {
        let offset = (y * width as usize + x) * 4;
        let mut out = [0; 4];
        out.copy_from_slice(&frame[offset..offset + 4]);
        out
    }

    #[test]
    fn fill_paints_every_pixel() {
        let mut frame = vec![0u8; 4 * 3 * 2];
        fill(&mut frame, CLEAR_COLOR);
        assert!(frame.chunks_exact(4).all(|px| px == CLEAR_COLOR));
    }

    #[test]
    fn rect_is_clipped_to_frame() {
        let (width, height) = (4u32, 4u32);
        let mut frame = vec![0u8; (width * height * 4) as usize];

        draw_filled_rect(&mut frame, width, height, -2, 2, 4, 10, RED);

        assert_eq!(pixel(&frame, width, 0, 2), RED);
        assert_eq!(pixel(&frame, width, 1, 3), RED);
        assert_eq!(pixel(&frame, width, 2, 2), [0; 4]);
        assert_eq!(pixel(&frame, width, 0, 1), [0; 4]);
    }

    #[test]
    fn tiny_or_short_frames_never_write_out_of_bounds() {
        for (width, height) in [(0u32, 0u32), (1, 1), (3, 2), (800, 600)] {
            let mut frame = vec![0u8; (width * height * 4) as usize];
            draw_banner(&mut frame, width, height, RED);
        }
        let mut short = vec![0u8; 8];
        draw_filled_rect(&mut short, 10, 10, 0, 0, 10, 10, RED);
        assert_eq!(short, [255, 0, 0, 255, 255, 0, 0, 255]);
    }

    #[test]
    fn banner_spans_middle_rows() {
        let (width, height) = (10u32, 100u32);
        let mut frame = vec![0u8; (width * height * 4) as usize];

        draw_banner(&mut frame, width, height, RED);

        assert_eq!(pixel(&frame, width, 5, 50), RED);
        assert_eq!(pixel(&frame, width, 5, 26), BANNER_BORDER_COLOR);
        assert_eq!(pixel(&frame, width, 5, 10), [0; 4]);
    }
}
