//! Per-block unit of work handed to modules.
//!
//! Audio buffers are planar: all channels live in one slice, channel `i`
//! starting at `i * stride`. A [`BufferSet`] is a view on such a slice that
//! exposes each channel as a `len`-sample sub-slice, so no per-block array of
//! channel pointers has to be built.

use crate::event::ParamEvent;

/// Read-only view on planar channel buffers.
#[derive(Debug, Clone, Copy)]
pub struct BufferSet<'a> {
    data: &'a [f32],
    stride: usize,
    len: usize,
}

impl<'a> BufferSet<'a> {
    /// Views `data` as channels of `stride` samples, `len` of which are used.
    /// `len` is capped to `stride`.
    pub fn new(data: &'a [f32], stride: usize, len: usize) -> Self {
        Self {
            data,
            stride,
            len: len.min(stride),
        }
    }

    /// View with no channel.
    pub const fn empty() -> Self {
        Self {
            data: &[],
            stride: 0,
            len: 0,
        }
    }

    /// Number of channels.
    #[inline]
    pub fn nbr_chn(&self) -> usize {
        if self.stride == 0 {
            0
        } else {
            self.data.len() / self.stride
        }
    }

    /// Used samples per channel.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if channels hold no sample.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Samples of channel `chn`.
    ///
    /// # Panics
    ///
    /// Panics if `chn >= nbr_chn()`.
    #[inline]
    pub fn channel(&self, chn: usize) -> &'a [f32] {
        let start = chn * self.stride;
        &self.data[start..start + self.len]
    }
}

/// Mutable view on planar channel buffers.
#[derive(Debug)]
pub struct BufferSetMut<'a> {
    data: &'a mut [f32],
    stride: usize,
    len: usize,
}

impl<'a> BufferSetMut<'a> {
    /// Views `data` as channels of `stride` samples, `len` of which are used.
    /// `len` is capped to `stride`.
    pub fn new(data: &'a mut [f32], stride: usize, len: usize) -> Self {
        Self {
            data,
            stride,
            len: len.min(stride),
        }
    }

    /// Number of channels.
    #[inline]
    pub fn nbr_chn(&self) -> usize {
        if self.stride == 0 {
            0
        } else {
            self.data.len() / self.stride
        }
    }

    /// Used samples per channel.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if channels hold no sample.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Samples of channel `chn`.
    #[inline]
    pub fn channel(&self, chn: usize) -> &[f32] {
        let start = chn * self.stride;
        &self.data[start..start + self.len]
    }

    /// Mutable samples of channel `chn`.
    ///
    /// # Panics
    ///
    /// Panics if `chn >= nbr_chn()`.
    #[inline]
    pub fn channel_mut(&mut self, chn: usize) -> &mut [f32] {
        let start = chn * self.stride;
        &mut self.data[start..start + self.len]
    }

    /// Copies channel `src` into channel `dst`.
    pub fn copy_channel(&mut self, src: usize, dst: usize) {
        if src != dst {
            let len = self.len;
            self.data
                .copy_within(src * self.stride..src * self.stride + len, dst * self.stride);
        }
    }

    /// Zeroes the used part of every channel.
    pub fn clear(&mut self) {
        for chn in 0..self.nbr_chn() {
            self.channel_mut(chn).fill(0.0);
        }
    }

    /// Read-only view on the same channels.
    pub fn as_view(&self) -> BufferSet<'_> {
        BufferSet::new(&*self.data, self.stride, self.len)
    }
}

/// Everything a module needs to render one block.
#[derive(Debug)]
pub struct ProcInfo<'a> {
    /// Input channels.
    pub inputs: BufferSet<'a>,
    /// Output channels. Modules write the channels they produce, starting
    /// at channel 0.
    pub outputs: BufferSetMut<'a>,
    /// Block length in samples.
    pub nbr_spl: usize,
    /// Events addressed to this module, in arrival order. They have already
    /// been applied to the parameter set when the module sees them.
    pub events: &'a [ParamEvent],
}
