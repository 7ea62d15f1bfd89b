// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Push constants, emulated with one dynamic constant buffer per context.
//!
//! Every push discards the buffer, so words outside the pushed range read as zero.  The buffer
//! is shared by all stages and layouts of the context.

use crate::device::Device;
use crate::imp::{
    BindFlags, BufferDesc, CpuAccessFlags, MapType, MiscFlags, NativeContext, NativeObject, Usage,
};
use logwise::privacy::LogIt;

/// Constant buffers are allocated in 16-byte units.
const WORDS_PER_REGISTER: u32 = 4;

#[derive(Debug, Default)]
pub(super) struct PushConstantBuffer {
    buffer: Option<NativeObject>,
    /// Capacity in 32-bit words.
    words: u32,
}

impl PushConstantBuffer {
    /// Writes `values` at word `first` of a freshly discarded buffer.
    ///
    /// Returns the buffer to bind, or `None` if nothing was written.
    pub fn write(
        &mut self,
        device: &Device,
        ctx: &mut dyn NativeContext,
        first: u32,
        values: &[u32],
    ) -> Option<NativeObject> {
        let end = u32::try_from(values.len())
            .ok()
            .and_then(|len| first.checked_add(len))
            .filter(|end| *end <= device.config().max_push_constant_words);
        let Some(end) = end else {
            logwise::error_sync!(
                "Dropping push of {count} constants at {first}: exceeds {max} words",
                count = values.len(),
                first = first,
                max = device.config().max_push_constant_words
            );
            return None;
        };
        let buffer = self.reserve(device, end)?;
        let mapped = match ctx.map(buffer, 0, MapType::WriteDiscard) {
            Ok(mapped) => mapped,
            Err(e) => {
                logwise::error_sync!(
                    "Could not map the push-constant buffer: {error}",
                    error = LogIt(&e)
                );
                return None;
            }
        };
        // SAFETY: the buffer is mapped for writing until the unmap below and nothing else
        // aliases the mapping.
        let bytes = unsafe { std::slice::from_raw_parts_mut(mapped.data, mapped.len) };
        bytes.fill(0);
        let start = first as usize * 4;
        if let Some(dst) = bytes.get_mut(start..start + values.len() * 4) {
            dst.copy_from_slice(bytemuck::cast_slice(values));
        }
        ctx.unmap(buffer, 0);
        Some(buffer)
    }

    /// Grows the buffer to hold at least `words` words.
    fn reserve(&mut self, device: &Device, words: u32) -> Option<NativeObject> {
        if let Some(buffer) = self.buffer.filter(|_| self.words >= words) {
            return Some(buffer);
        }
        let words = words.max(1).next_multiple_of(WORDS_PER_REGISTER);
        let desc = BufferDesc {
            byte_width: words * 4,
            usage: Usage::Dynamic,
            bind_flags: BindFlags::CONSTANT_BUFFER,
            cpu_access_flags: CpuAccessFlags::WRITE,
            misc_flags: MiscFlags::empty(),
            structure_byte_stride: 0,
        };
        match device.native().create_buffer(&desc, None) {
            Ok(buffer) => {
                self.release(device);
                logwise::trace_sync!("Push-constant buffer grown to {words} words", words = words);
                self.buffer = Some(buffer);
                self.words = words;
                Some(buffer)
            }
            Err(e) => {
                logwise::error_sync!(
                    "Could not create a {words}-word push-constant buffer: {error}",
                    words = words,
                    error = LogIt(&e)
                );
                None
            }
        }
    }

    pub fn release(&mut self, device: &Device) {
        if let Some(buffer) = self.buffer.take() {
            device.native().release(buffer);
        }
        self.words = 0;
    }
}
