use bitvec::prelude::*;
#[cfg(feature = "embedded-graphics")]
use embedded_graphics::{image::ImageRaw, pixelcolor::BinaryColor};

pub const WIDTH: usize = 64;
pub const HEIGHT: usize = 32;
pub(crate) const MEM_LENGTH: usize = WIDTH * HEIGHT;
pub(crate) const PACKED_LENGTH: usize = MEM_LENGTH / 8;

/// An opaque struct holding frame of Kiwi8 display
///
/// One byte per pixel, each holding either `0` or `1`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Frame([u8; MEM_LENGTH]);

/// A shared view over a `Frame`
///
/// Rows are stored top to bottom, one byte per pixel.
/// Each row holds `WIDTH` bytes, matching the state of pixels from left to the right.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct FrameView<'a>(&'a [u8; MEM_LENGTH]);

/// Frame packed to one bit per pixel, most significant bit first
///
/// This is the layout expected by monochrome displays and by `ImageRaw<BinaryColor>`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct PackedFrame([u8; PACKED_LENGTH]);

impl<'a> FrameView<'a> {
    /// Pixel bytes, row after row
    pub fn as_raw(&self) -> &'a [u8] {
        self.0
    }

    pub fn copy_frame(self) -> Frame {
        Frame(*self.0)
    }

    /// Access frame's pixels by indexes
    pub fn get_pixel(&self, x: usize, y: usize) -> Option<bool> {
        if x < WIDTH && y < HEIGHT {
            Some(self.0[y * WIDTH + x] != 0)
        } else {
            None
        }
    }

    /// Get iterator over rows of the frame
    pub fn iter_rows(&self) -> impl Iterator<Item = &'a [u8]> {
        self.0.chunks(WIDTH)
    }

    /// Rows of pixels with every pixel repeated `scale` times in both directions
    pub fn iter_pixelwise_scaled(
        &self,
        scale: usize,
    ) -> impl Iterator<Item = impl Iterator<Item = &'a u8> + Clone> {
        self.iter_rows()
            .map(move |row| {
                row.iter()
                    .flat_map(move |pixel| core::iter::repeat(pixel).take(scale))
            })
            .flat_map(move |row| core::iter::repeat(row).take(scale))
    }

    /// Number of pixels turned on
    pub fn lit_count(&self) -> usize {
        self.0.iter().filter(|&&pixel| pixel != 0).count()
    }

    /// Pack the frame to one bit per pixel
    pub fn pack(&self) -> PackedFrame {
        let mut packed = [0u8; PACKED_LENGTH];
        let bits = packed.view_bits_mut::<Msb0>();
        for (idx, &pixel) in self.0.iter().enumerate() {
            bits.set(idx, pixel != 0);
        }
        PackedFrame(packed)
    }
}

impl PackedFrame {
    pub fn as_raw(&self) -> &[u8] {
        &self.0
    }

    /// One `WIDTH` bit slice per row
    pub fn iter_rows_as_bitslices(&self) -> impl Iterator<Item = &BitSlice<u8, Msb0>> {
        self.0.chunks(WIDTH / 8).map(|row| row.view_bits::<Msb0>())
    }

    /// 1 bpp image for embedded-graphics drawing targets
    #[cfg(feature = "embedded-graphics")]
    pub fn as_raw_image(&self) -> ImageRaw<'_, BinaryColor> {
        ImageRaw::new(self.as_raw(), WIDTH as u32, HEIGHT as u32)
    }
}

impl Frame {
    pub(crate) fn new() -> Self {
        Self([0; MEM_LENGTH])
    }

    pub fn view(&self) -> FrameView<'_> {
        FrameView(&self.0)
    }

    pub(crate) fn clear(&mut self) {
        self.0 = [0; MEM_LENGTH];
    }

    /// XOR a sprite bit into the pixel at `x`, `y`
    ///
    /// Returns `None` when the pixel lies outside the frame and nothing was
    /// written, otherwise whether a lit pixel got turned off.
    pub(crate) fn xor_pixel(&mut self, x: usize, y: usize, bit: bool) -> Option<bool> {
        if x >= WIDTH || y >= HEIGHT {
            return None;
        }
        let pixel = &mut self.0[y * WIDTH + x];
        let erased = *pixel == 1 && bit;
        *pixel ^= bit as u8;
        Some(erased)
    }
}

#[cfg(test)]
impl Frame {
    pub(crate) fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}
