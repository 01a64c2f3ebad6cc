use anyhow::{anyhow, Result};

/// Pixel layouts a camera may hand back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    Bgr24,
    Nv12,
    Yuyv,
}

/// Convert a captured buffer to packed RGB24, the order detectors expect.
pub fn normalize_to_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    match format {
        PixelFormat::Rgb24 => {
            check_len(pixels, packed_len(width, height, 3)?, "RGB")?;
            Ok(pixels.to_vec())
        }
        PixelFormat::Bgr24 => {
            check_len(pixels, packed_len(width, height, 3)?, "BGR")?;
            let mut rgb = pixels.to_vec();
            for px in rgb.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            Ok(rgb)
        }
        PixelFormat::Nv12 => nv12_to_rgb(pixels, width, height),
        PixelFormat::Yuyv => yuyv_to_rgb(pixels, width, height),
    }
}

fn packed_len(width: u32, height: u32, bytes_per_pixel: u32) -> Result<usize> {
    width
        .checked_mul(height)
        .and_then(|v| v.checked_mul(bytes_per_pixel))
        .map(|v| v as usize)
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

fn check_len(pixels: &[u8], expected: usize, label: &str) -> Result<()> {
    if pixels.len() != expected {
        return Err(anyhow!(
            "{} frame length mismatch: expected {}, got {}",
            label,
            expected,
            pixels.len()
        ));
    }
    Ok(())
}

fn nv12_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let w = width as usize;
    let h = height as usize;
    let y_plane = packed_len(width, height, 1)?;
    // Chroma is subsampled 2x2; odd edges round up to a full UV pair.
    let uv_stride = w.div_ceil(2) * 2;
    let uv_plane = uv_stride
        .checked_mul(h.div_ceil(2))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
    check_len(pixels, y_plane + uv_plane, "NV12")?;

    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i];
            let uv_index = y_plane + (j / 2) * uv_stride + (i / 2) * 2;
            let offset = (j * w + i) * 3;
            write_yuv(
                &mut rgb[offset..offset + 3],
                y,
                pixels[uv_index],
                pixels[uv_index + 1],
            );
        }
    }
    Ok(rgb)
}

fn yuyv_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    if width % 2 != 0 {
        return Err(anyhow!("YUYV frames need an even width, got {}", width));
    }
    check_len(pixels, packed_len(width, height, 2)?, "YUYV")?;

    let mut rgb = vec![0u8; packed_len(width, height, 3)?];
    for (quad, out) in pixels.chunks_exact(4).zip(rgb.chunks_exact_mut(6)) {
        let (y0, u, y1, v) = (quad[0], quad[1], quad[2], quad[3]);
        write_yuv(&mut out[0..3], y0, u, v);
        write_yuv(&mut out[3..6], y1, u, v);
    }
    Ok(rgb)
}

fn write_yuv(out: &mut [u8], y: u8, u: u8, v: u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;
    out[0] = clamp_to_u8(y + 1.402_f32 * v);
    out[1] = clamp_to_u8(y - 0.344_136_f32 * u - 0.714_136_f32 * v);
    out[2] = clamp_to_u8(y + 1.772_f32 * u);
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgr_is_swapped_to_rgb() -> Result<()> {
        let bgr = vec![10u8, 20, 30, 40, 50, 60];
        let rgb = normalize_to_rgb(&bgr, 2, 1, PixelFormat::Bgr24)?;
        assert_eq!(rgb, vec![30, 20, 10, 60, 50, 40]);
        Ok(())
    }

    #[test]
    fn nv12_conversion_produces_gray() -> Result<()> {
        let nv12 = [vec![128u8; 4], vec![128u8; 2]].concat();
        let rgb = normalize_to_rgb(&nv12, 2, 2, PixelFormat::Nv12)?;
        assert_eq!(rgb, vec![128u8; 12]);
        Ok(())
    }

    #[test]
    fn nv12_with_odd_dimensions_rounds_chroma_up() -> Result<()> {
        // 3x2: Y plane 6 bytes, one chroma row of two UV pairs.
        let wide = [vec![90u8; 6], vec![128u8; 4]].concat();
        assert_eq!(normalize_to_rgb(&wide, 3, 2, PixelFormat::Nv12)?, vec![90u8; 18]);

        // 2x3: Y plane 6 bytes, two chroma rows of one UV pair.
        let tall = [vec![90u8; 6], vec![128u8; 4]].concat();
        assert_eq!(normalize_to_rgb(&tall, 2, 3, PixelFormat::Nv12)?, vec![90u8; 18]);
        Ok(())
    }

    #[test]
    fn nv12_with_odd_dimensions_rejects_truncated_chroma() {
        assert!(normalize_to_rgb(&[128u8; 9], 3, 2, PixelFormat::Nv12).is_err());
        assert!(normalize_to_rgb(&[128u8; 9], 2, 3, PixelFormat::Nv12).is_err());
    }

    #[test]
    fn yuyv_conversion_produces_gray() -> Result<()> {
        let yuyv = vec![100u8, 128, 100, 128];
        let rgb = normalize_to_rgb(&yuyv, 2, 1, PixelFormat::Yuyv)?;
        assert_eq!(rgb, vec![100u8; 6]);
        Ok(())
    }

    #[test]
    fn short_buffer_is_rejected() {
        assert!(normalize_to_rgb(&[0u8; 5], 2, 1, PixelFormat::Rgb24).is_err());
    }
}
