/// Bytes per converted texel (`Rgba8Unorm`).
pub const BYTES_PER_PIXEL: usize = 4;

/// Converts one packed `0xAARRGGBB` pixel into `[r, g, b, a]` bytes.
///
/// Works on the integer value, so the result does not depend on host byte order.
#[inline]
pub fn argb_to_rgba(pixel: u32) -> [u8; 4] {
    pixel.rotate_left(8).to_be_bytes()
}

/// Converts `src` into `dst`, resizing `dst` to `src.len() * 4` bytes.
///
/// Pixel order is preserved (row-major in, row-major out). `dst` keeps its
/// allocation between calls, so steady-state conversion does not allocate.
pub fn argb_to_rgba_into(src: &[u32], dst: &mut Vec<u8>) {
    dst.resize(src.len() * BYTES_PER_PIXEL, 0);

    for (out, &pixel) in dst.chunks_exact_mut(BYTES_PER_PIXEL).zip(src) {
        out.copy_from_slice(&argb_to_rgba(pixel));
    }
}
