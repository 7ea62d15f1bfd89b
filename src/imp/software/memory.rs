// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Host memory backing software resources.
//!
//! A resource is a list of [`Surface`]s, one per subresource, ordered `level + layer * levels`.
//! A buffer is a single surface one byte per "texel" wide.

use crate::imp::{NativeBox, NativeResourceDesc, SubresourceInit};
use crate::pixel_formats::Format;

#[derive(Debug, Clone)]
pub struct Surface {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub row_pitch: u32,
    pub depth_pitch: u32,
    pub data: Vec<u8>,
    pub mapped: bool,
}

/// Texel size and block edge for copy arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Texel {
    pub bytes: u32,
    pub block: u32,
}

impl Texel {
    pub fn of(format: Format) -> Texel {
        match format {
            Format::Unknown => Texel { bytes: 1, block: 1 },
            f if f.is_compressed() => Texel {
                bytes: f.bytes_per_block(),
                block: 4,
            },
            f => Texel {
                bytes: f.bytes_per_block(),
                block: 1,
            },
        }
    }
}

impl Surface {
    fn new(texel: Texel, width: u32, height: u32, depth: u32) -> Surface {
        let row_pitch = width.div_ceil(texel.block) * texel.bytes;
        let depth_pitch = row_pitch * height.div_ceil(texel.block);
        Surface {
            width,
            height,
            depth,
            row_pitch,
            depth_pitch,
            data: vec![0; depth_pitch as usize * depth as usize],
            mapped: false,
        }
    }

    /// Copies rows from `src` laid out with the given pitches into this surface.
    pub fn write_region(
        &mut self,
        texel: Texel,
        dst: &NativeBox,
        src: &[u8],
        src_row_pitch: u32,
        src_depth_pitch: u32,
    ) {
        let row_bytes = (dst.right - dst.left).div_ceil(texel.block) as usize * texel.bytes as usize;
        let rows = (dst.bottom - dst.top).div_ceil(texel.block) as usize;
        for z in 0..(dst.back - dst.front) as usize {
            for y in 0..rows {
                let s = z * src_depth_pitch as usize + y * src_row_pitch as usize;
                let d = self.offset(texel, dst.left, dst.top, dst.front) + z * self.depth_pitch as usize
                    + y * self.row_pitch as usize;
                let (Some(from), Some(to)) = (src.get(s..s + row_bytes), self.data.get_mut(d..d + row_bytes))
                else {
                    return;
                };
                to.copy_from_slice(from);
            }
        }
    }

    fn offset(&self, texel: Texel, x: u32, y: u32, z: u32) -> usize {
        z as usize * self.depth_pitch as usize
            + (y / texel.block) as usize * self.row_pitch as usize
            + (x / texel.block) as usize * texel.bytes as usize
    }

    /// The bytes of `region`, tightly packed.
    pub fn read_region(&self, texel: Texel, region: &NativeBox) -> Vec<u8> {
        let row_bytes = (region.right - region.left).div_ceil(texel.block) as usize * texel.bytes as usize;
        let rows = (region.bottom - region.top).div_ceil(texel.block) as usize;
        let mut out = Vec::with_capacity(row_bytes * rows * (region.back - region.front) as usize);
        for z in region.front..region.back {
            for y in 0..rows {
                let s = self.offset(texel, region.left, region.top, z) + y * self.row_pitch as usize;
                if let Some(row) = self.data.get(s..s + row_bytes) {
                    out.extend_from_slice(row);
                }
            }
        }
        out
    }

    /// Writes `pattern` to every texel of the surface, honoring `mask` per byte.
    pub fn fill(&mut self, pattern: &[u8], mask: Option<&[bool]>) {
        if pattern.is_empty() {
            return;
        }
        let row_bytes = self.width as usize * pattern.len();
        for z in 0..self.depth as usize {
            for y in 0..self.height as usize {
                let start = z * self.depth_pitch as usize + y * self.row_pitch as usize;
                let Some(row) = self.data.get_mut(start..start + row_bytes) else {
                    return;
                };
                for texel in row.chunks_exact_mut(pattern.len()) {
                    match mask {
                        None => texel.copy_from_slice(pattern),
                        Some(mask) => {
                            for ((t, p), m) in texel.iter_mut().zip(pattern).zip(mask) {
                                if *m {
                                    *t = *p;
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    pub fn full_box(&self) -> NativeBox {
        NativeBox {
            left: 0,
            top: 0,
            front: 0,
            right: self.width,
            bottom: self.height,
            back: self.depth,
        }
    }
}

/// A resource's subresources together with its creation parameters.
#[derive(Debug, Clone)]
pub struct Memory {
    pub desc: NativeResourceDesc,
    pub levels: u32,
    pub surfaces: Vec<Surface>,
}

impl Memory {
    pub fn new(desc: NativeResourceDesc) -> Memory {
        let (format, width, height, depth, levels, layers) = match desc {
            NativeResourceDesc::Buffer(d) => (Format::Unknown, d.byte_width, 1, 1, 1, 1),
            NativeResourceDesc::Texture1d(d) => (d.format, d.width, 1, 1, d.mip_levels, d.array_size),
            NativeResourceDesc::Texture2d(d) => {
                (d.format, d.width, d.height, 1, d.mip_levels, d.array_size)
            }
            NativeResourceDesc::Texture3d(d) => (d.format, d.width, d.height, d.depth, d.mip_levels, 1),
        };
        let texel = Texel::of(format);
        let mut surfaces = Vec::with_capacity((levels * layers) as usize);
        for _layer in 0..layers {
            for level in 0..levels {
                surfaces.push(Surface::new(
                    texel,
                    (width >> level).max(1),
                    (height >> level).max(1),
                    (depth >> level).max(1),
                ));
            }
        }
        Memory {
            desc,
            levels,
            surfaces,
        }
    }

    pub fn texel(&self) -> Texel {
        Texel::of(self.desc.format())
    }

    pub fn byte_size(&self) -> usize {
        self.surfaces.iter().map(|s| s.data.len()).sum()
    }

    pub fn initialize(&mut self, initial: &[SubresourceInit<'_>]) {
        let texel = self.texel();
        for (surface, init) in self.surfaces.iter_mut().zip(initial) {
            let region = surface.full_box();
            let row_pitch = if init.row_pitch == 0 { surface.row_pitch } else { init.row_pitch };
            let depth_pitch = if init.slice_pitch == 0 { surface.depth_pitch } else { init.slice_pitch };
            surface.write_region(texel, &region, init.data, row_pitch, depth_pitch);
        }
    }

    /// Point-samples subresource `index - 1` into subresource `index`.
    ///
    /// Block-compressed and buffer resources are left alone.
    pub fn downsample(&mut self, index: usize) {
        let texel = self.texel();
        if texel.block != 1 || index == 0 || index >= self.surfaces.len() {
            return;
        }
        let (before, after) = self.surfaces.split_at_mut(index);
        let (src, dst) = (&before[index - 1], &mut after[0]);
        let bytes = texel.bytes as usize;
        for z in 0..dst.depth {
            for y in 0..dst.height {
                for x in 0..dst.width {
                    let s = src.offset(
                        texel,
                        (x * 2).min(src.width - 1),
                        (y * 2).min(src.height - 1),
                        (z * 2).min(src.depth - 1),
                    );
                    let d = dst.offset(texel, x, y, z);
                    dst.data[d..d + bytes].copy_from_slice(&src.data[s..s + bytes]);
                }
            }
        }
    }

    /// Whether `other` can be copied into this resource wholesale.
    pub fn same_shape(&self, other: &Memory) -> bool {
        self.surfaces.len() == other.surfaces.len()
            && self.texel() == other.texel()
            && self
                .surfaces
                .iter()
                .zip(&other.surfaces)
                .all(|(a, b)| a.data.len() == b.data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imp::{BindFlags, CpuAccessFlags, MiscFlags, Texture2dDesc, Usage};

    fn texture(width: u32, height: u32, levels: u32, layers: u32) -> Memory {
        Memory::new(NativeResourceDesc::Texture2d(Texture2dDesc {
            width,
            height,
            mip_levels: levels,
            array_size: layers,
            format: Format::R8G8B8A8Unorm,
            sample_count: 1,
            sample_quality: 0,
            usage: Usage::Default,
            bind_flags: BindFlags::SHADER_RESOURCE,
            cpu_access_flags: CpuAccessFlags::empty(),
            misc_flags: MiscFlags::empty(),
        }))
    }

    #[test]
    fn subresources_are_level_major_within_layer() {
        let memory = texture(8, 4, 3, 2);
        assert_eq!(memory.surfaces.len(), 6);
        assert_eq!(memory.surfaces[1].width, 4);
        assert_eq!(memory.surfaces[3].width, 8);
        assert_eq!(memory.surfaces[2].height, 1);
    }

    #[test]
    fn region_round_trip_through_pitched_source() {
        let mut memory = texture(4, 4, 1, 1);
        let texel = memory.texel();
        let region = NativeBox {
            left: 1,
            top: 1,
            front: 0,
            right: 3,
            bottom: 2,
            back: 1,
        };
        // 8 bytes of payload per row, padded to 12
        let src: Vec<u8> = (0..12).collect();
        memory.surfaces[0].write_region(texel, &region, &src, 12, 12);
        assert_eq!(memory.surfaces[0].read_region(texel, &region), (0..8).collect::<Vec<u8>>());
        assert_eq!(&memory.surfaces[0].data[..4], &[0; 4]);
    }

    #[test]
    fn masked_fill() {
        let mut memory = texture(2, 1, 1, 1);
        memory.surfaces[0].fill(&[1, 2, 3, 4], Some(&[true, false, false, true]));
        assert_eq!(memory.surfaces[0].data, vec![1, 0, 0, 4, 1, 0, 0, 4]);
    }
}
