// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Encoding clear values into texel bytes.

use crate::pixel_formats::{Format, f16};

fn unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn unorm16(v: f32) -> u16 {
    (v.clamp(0.0, 1.0) * 65535.0).round() as u16
}

fn linear_to_srgb(v: f32) -> f32 {
    let v = v.clamp(0.0, 1.0);
    if v <= 0.003_130_8 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    }
}

fn halves(values: &[f32]) -> Vec<u8> {
    values
        .iter()
        .flat_map(|v| f16::from_f32(*v).to_le_bytes())
        .collect()
}

/// Encodes an RGBA color as one texel of `format`.
///
/// Returns `None` for formats the software driver cannot render to.
pub fn encode_color(format: Format, color: [f32; 4]) -> Option<Vec<u8>> {
    let [r, g, b, a] = color;
    use Format::*;
    Some(match format {
        R32G32B32A32Float => bytemuck::cast_slice(&color).to_vec(),
        R32G32B32A32Uint => bytemuck::cast_slice(&color.map(|c| c as u32)).to_vec(),
        R32G32B32A32Sint => bytemuck::cast_slice(&color.map(|c| c as i32)).to_vec(),
        R16G16B16A16Float => halves(&color),
        R16G16B16A16Unorm => bytemuck::cast_slice(&color.map(unorm16)).to_vec(),
        R16G16B16A16Uint => bytemuck::cast_slice(&color.map(|c| c as u16)).to_vec(),
        R32G32Float => bytemuck::cast_slice(&[r, g]).to_vec(),
        R10G10B10A2Unorm => {
            let c = |v: f32, max: f32| (v.clamp(0.0, 1.0) * max).round() as u32;
            let packed = c(r, 1023.0) | c(g, 1023.0) << 10 | c(b, 1023.0) << 20 | c(a, 3.0) << 30;
            packed.to_le_bytes().to_vec()
        }
        R8G8B8A8Unorm => color.map(unorm8).to_vec(),
        R8G8B8A8UnormSrgb => [
            unorm8(linear_to_srgb(r)),
            unorm8(linear_to_srgb(g)),
            unorm8(linear_to_srgb(b)),
            unorm8(a),
        ]
        .to_vec(),
        R8G8B8A8Uint => color.map(|c| c as u8).to_vec(),
        R16G16Float => halves(&[r, g]),
        R32Float => r.to_le_bytes().to_vec(),
        R32Uint => (r as u32).to_le_bytes().to_vec(),
        R32Sint => (r as i32).to_le_bytes().to_vec(),
        R8G8Unorm => vec![unorm8(r), unorm8(g)],
        R16Float => halves(&[r]),
        R16Unorm => unorm16(r).to_le_bytes().to_vec(),
        R16Uint => (r as u16).to_le_bytes().to_vec(),
        R8Unorm => vec![unorm8(r)],
        R8Uint => vec![r as u8],
        A8Unorm => vec![unorm8(a)],
        B8G8R8A8Unorm => vec![unorm8(b), unorm8(g), unorm8(r), unorm8(a)],
        B8G8R8X8Unorm => vec![unorm8(b), unorm8(g), unorm8(r), 0xFF],
        B8G8R8A8UnormSrgb => vec![
            unorm8(linear_to_srgb(b)),
            unorm8(linear_to_srgb(g)),
            unorm8(linear_to_srgb(r)),
            unorm8(a),
        ],
        _ => return None,
    })
}

/// Encodes raw unsigned values for integer unordered-access clears.
///
/// Each channel keeps the low bits of its value, as the driver does.
pub fn encode_uint(format: Format, values: [u32; 4]) -> Option<Vec<u8>> {
    use Format::*;
    let channels = match format {
        R32G32B32A32Uint | R32G32B32A32Sint | R32G32B32A32Typeless => {
            return Some(bytemuck::cast_slice(&values).to_vec());
        }
        R32Uint | R32Sint | R32Typeless | R32Float => {
            return Some(values[0].to_le_bytes().to_vec());
        }
        R16G16B16A16Uint | R16G16B16A16Typeless => {
            return Some(bytemuck::cast_slice(&values.map(|v| v as u16)).to_vec());
        }
        R16Uint | R16Typeless => return Some((values[0] as u16).to_le_bytes().to_vec()),
        R8G8B8A8Uint | R8G8B8A8Typeless | R8G8B8A8Unorm => 4,
        R8Uint | R8Typeless | R8Unorm => 1,
        _ => return None,
    };
    Some(values[..channels].iter().map(|v| *v as u8).collect())
}

/// Encodes a depth/stencil value pair; either part may be skipped.
///
/// Returns `(bytes, mask)` where `mask` selects the bytes the clear writes.
pub fn encode_depth_stencil(
    format: Format,
    depth: Option<f32>,
    stencil: Option<u8>,
) -> Option<(Vec<u8>, Vec<bool>)> {
    let d = depth.unwrap_or(0.0).clamp(0.0, 1.0);
    let s = stencil.unwrap_or(0);
    let (has_d, has_s) = (depth.is_some(), stencil.is_some());
    match format {
        Format::D32Float => Some((d.to_le_bytes().to_vec(), vec![has_d; 4])),
        Format::D16Unorm => Some((unorm16(d).to_le_bytes().to_vec(), vec![has_d; 2])),
        Format::D24UnormS8Uint => {
            let depth_bits = (d * 16_777_215.0).round() as u32;
            let packed = depth_bits | (s as u32) << 24;
            Some((packed.to_le_bytes().to_vec(), vec![has_d, has_d, has_d, has_s]))
        }
        Format::D32FloatS8X24Uint => {
            let mut bytes = d.to_le_bytes().to_vec();
            bytes.extend_from_slice(&[s, 0, 0, 0]);
            let mut mask = vec![has_d; 4];
            mask.extend_from_slice(&[has_s, false, false, false]);
            Some((bytes, mask))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_black() {
        assert_eq!(
            encode_color(Format::R8G8B8A8Unorm, [0.0, 0.0, 0.0, 1.0]),
            Some(vec![0, 0, 0, 255])
        );
    }

    #[test]
    fn bgra_swizzles() {
        assert_eq!(
            encode_color(Format::B8G8R8A8Unorm, [1.0, 0.0, 0.0, 1.0]),
            Some(vec![0, 0, 255, 255])
        );
    }

    #[test]
    fn half_float() {
        let bytes = encode_color(Format::R16Float, [1.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(bytes, f16::ONE.to_le_bytes().to_vec());
    }

    #[test]
    fn stencil_only_clear_masks_depth() {
        let (bytes, mask) = encode_depth_stencil(Format::D24UnormS8Uint, None, Some(7)).unwrap();
        assert_eq!(bytes[3], 7);
        assert_eq!(mask, vec![false, false, false, true]);
    }

    #[test]
    fn compressed_formats_are_not_renderable() {
        assert_eq!(encode_color(Format::BC1Unorm, [0.0; 4]), None);
    }
}
