// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::core::row_major_strides;

/// Output buffer cursor moved in lockstep with the window center.
#[derive(Debug, Clone)]
struct OutputCursor<const N: usize> {
    strides: [usize; N],
    begin: [usize; N],
    offset: isize,
    wrap: [isize; N],
}

/// A fixed-radius hyper-rectangular window over a dense row-major grid.
///
/// The window keeps one signed linear offset per cell of the
/// `(2 * radius + 1)` per-axis neighborhood around its center, in raster
/// order (last axis fastest). Offsets are plain arithmetic on the grid
/// strides: nothing is bounds checked, and slots of a window centered near
/// the grid border point past it. Callers keep the window inside a valid
/// (typically padded) domain.
///
/// Besides [`reposition`](Self::reposition) the center can be stepped through
/// an iteration region in raster order with [`advance`](Self::advance) and
/// [`retreat`](Self::retreat), which update every slot in O(1) amortized time.
/// An optional output cursor tracks the matching cell of a second buffer of a
/// different shape.
#[derive(Debug, Clone)]
pub struct GridWindow<const N: usize> {
    radius: [usize; N],
    extent: [usize; N],
    strides: [usize; N],
    window_strides: [usize; N],
    slots: Vec<isize>,
    begin: [usize; N],
    end: [usize; N],
    position: [usize; N],
    wrap: [isize; N],
    output: Option<OutputCursor<N>>,
}

/// Per-axis offset correction applied when the center wraps from the end of
/// `axis` back to its start.
fn wrap_offsets<const N: usize>(
    strides: &[usize; N],
    begin: &[usize; N],
    end: &[usize; N],
) -> [isize; N] {
    let mut wrap = [0isize; N];
    for axis in 1..N {
        let len = (end[axis] - begin[axis]) as isize;
        wrap[axis] = strides[axis - 1] as isize - strides[axis] as isize * len;
    }
    wrap
}

impl<const N: usize> GridWindow<N> {
    /// Create a window over a grid of the given shape. The iteration region
    /// defaults to the whole grid.
    pub fn new(shape: [usize; N], radius: [usize; N]) -> Self {
        let strides = row_major_strides(shape);
        let extent = radius.map(|r| 2 * r + 1);
        let window_strides = row_major_strides(extent);
        let len: usize = extent.iter().product();
        let begin = [0usize; N];
        GridWindow {
            radius,
            extent,
            strides,
            window_strides,
            slots: vec![0; len],
            begin,
            end: shape,
            position: begin,
            wrap: wrap_offsets(&strides, &begin, &shape),
            output: None,
        }
    }

    /// Restrict center iteration to the half-open box `begin..end`.
    pub fn with_region(mut self, begin: [usize; N], end: [usize; N]) -> Self {
        debug_assert!(begin.iter().zip(end.iter()).all(|(b, e)| b < e));
        self.begin = begin;
        self.end = end;
        self.wrap = wrap_offsets(&self.strides, &begin, &end);
        self
    }

    /// Attach an output buffer of shape `out_shape`. The region start maps to
    /// `out_begin` in the output; its extent must fit inside `out_shape`.
    pub fn with_output(mut self, out_shape: [usize; N], out_begin: [usize; N]) -> Self {
        let strides = row_major_strides(out_shape);
        let mut out_end = [0usize; N];
        for d in 0..N {
            out_end[d] = out_begin[d] + (self.end[d] - self.begin[d]);
        }
        self.output = Some(OutputCursor {
            strides,
            begin: out_begin,
            offset: 0,
            wrap: wrap_offsets(&strides, &out_begin, &out_end),
        });
        self
    }

    /// Move the window center to `center`, recomputing every slot.
    pub fn reposition(&mut self, center: [usize; N]) {
        self.position = center;

        let mut base = 0isize;
        for d in 0..N {
            base += center[d] as isize * self.strides[d] as isize;
            base -= self.radius[d] as isize * self.strides[d] as isize;
        }

        let mut counter = [0usize; N];
        let mut pos = base;
        for slot in self.slots.iter_mut() {
            *slot = pos;
            pos += 1;
            let mut axis = N - 1;
            counter[axis] += 1;
            while axis > 0 && counter[axis] == self.extent[axis] {
                counter[axis] = 0;
                pos += self.strides[axis - 1] as isize
                    - (self.strides[axis] * self.extent[axis]) as isize;
                axis -= 1;
                counter[axis] += 1;
            }
        }

        if let Some(out) = self.output.as_mut() {
            let mut offset = 0isize;
            for d in 0..N {
                let rel = center[d] as isize - self.begin[d] as isize;
                offset += (out.begin[d] as isize + rel) * out.strides[d] as isize;
            }
            out.offset = offset;
        }
    }

    /// Move the center to the first cell of the iteration region.
    pub fn go_to_begin(&mut self) {
        self.reposition(self.begin);
    }

    /// Step the center to the next cell of the iteration region in raster
    /// order.
    pub fn advance(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot += 1;
        }
        if let Some(out) = self.output.as_mut() {
            out.offset += 1;
        }

        let mut axis = N - 1;
        self.position[axis] += 1;
        while axis > 0 && self.position[axis] == self.end[axis] {
            self.position[axis] = self.begin[axis];
            let wrap = self.wrap[axis];
            for slot in self.slots.iter_mut() {
                *slot += wrap;
            }
            if let Some(out) = self.output.as_mut() {
                out.offset += out.wrap[axis];
            }
            axis -= 1;
            self.position[axis] += 1;
        }
    }

    /// Step the center to the previous cell of the iteration region in raster
    /// order. Retreating from the first cell leaves the window at the reverse
    /// end (see [`is_at_reverse_end`](Self::is_at_reverse_end)).
    pub fn retreat(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot -= 1;
        }
        if let Some(out) = self.output.as_mut() {
            out.offset -= 1;
        }

        let mut axis = N - 1;
        while axis > 0 && self.position[axis] == self.begin[axis] {
            self.position[axis] = self.end[axis] - 1;
            let wrap = self.wrap[axis];
            for slot in self.slots.iter_mut() {
                *slot -= wrap;
            }
            if let Some(out) = self.output.as_mut() {
                out.offset -= out.wrap[axis];
            }
            axis -= 1;
        }
        self.position[axis] = self.position[axis].wrapping_sub(1);
    }

    /// True once [`advance`](Self::advance) has moved past the last cell of
    /// the region.
    pub fn is_at_end(&self) -> bool {
        self.position[0] >= self.end[0]
    }

    /// True once [`retreat`](Self::retreat) has moved before the first cell
    /// of the region.
    pub fn is_at_reverse_end(&self) -> bool {
        self.position[0] == self.begin[0].wrapping_sub(1)
    }

    /// Last cell of the iteration region in raster order.
    pub fn region_last(&self) -> [usize; N] {
        self.end.map(|e| e - 1)
    }

    /// Current center coordinate.
    pub fn position(&self) -> [usize; N] {
        self.position
    }

    /// Number of window slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the window has no slots (never true: every window holds at
    /// least its center).
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Linear offset of the given slot.
    #[inline]
    pub fn offset(&self, slot: usize) -> isize {
        self.slots[slot]
    }

    /// All slot offsets in raster order.
    pub fn offsets(&self) -> &[isize] {
        &self.slots
    }

    /// Slot index of the window center.
    pub fn center_slot(&self) -> usize {
        let mut slot = 0;
        for d in 0..N {
            slot += self.radius[d] * self.window_strides[d];
        }
        slot
    }

    /// Linear offset of the window center.
    #[inline]
    pub fn center_offset(&self) -> isize {
        self.slots[self.center_slot()]
    }

    /// Slot index of the face neighbor one step along `axis`, forward
    /// (`+1`) or backward (`-1`). Requires a radius of at least one on that
    /// axis.
    #[inline]
    pub fn face_slot(&self, axis: usize, forward: bool) -> usize {
        debug_assert!(self.radius[axis] >= 1);
        let center = self.center_slot();
        if forward {
            center + self.window_strides[axis]
        } else {
            center - self.window_strides[axis]
        }
    }

    /// Linear distance between neighboring cells along `axis`.
    pub fn axis_step(&self, axis: usize) -> usize {
        self.strides[axis]
    }

    /// Linear offset of the output cursor, if an output is attached.
    #[inline]
    pub fn output_offset(&self) -> Option<isize> {
        self.output.as_ref().map(|o| o.offset)
    }
}

/// Copy the box of size `extent` starting at `src_begin` in `src` to the box
/// starting at `dst_begin` in `dst`.
pub fn copy_region<T: Copy, const N: usize>(
    src: &[T],
    src_shape: [usize; N],
    src_begin: [usize; N],
    dst: &mut [T],
    dst_shape: [usize; N],
    dst_begin: [usize; N],
    extent: [usize; N],
) {
    if extent.iter().any(|&e| e == 0) {
        return;
    }
    let mut src_end = [0usize; N];
    for d in 0..N {
        src_end[d] = src_begin[d] + extent[d];
    }
    let mut window = GridWindow::new(src_shape, [0; N])
        .with_region(src_begin, src_end)
        .with_output(dst_shape, dst_begin);
    window.go_to_begin();
    while !window.is_at_end() {
        if let Some(out) = window.output_offset() {
            dst[out as usize] = src[window.center_offset() as usize];
        }
        window.advance();
    }
}

/// Set every cell of the box of size `extent` starting at `begin` to `value`.
pub fn fill_region<T: Copy, const N: usize>(
    dst: &mut [T],
    shape: [usize; N],
    begin: [usize; N],
    extent: [usize; N],
    value: T,
) {
    if extent.iter().any(|&e| e == 0) {
        return;
    }
    let mut end = [0usize; N];
    for d in 0..N {
        end[d] = begin[d] + extent[d];
    }
    let mut window = GridWindow::new(shape, [0; N]).with_region(begin, end);
    window.go_to_begin();
    while !window.is_at_end() {
        dst[window.center_offset() as usize] = value;
        window.advance();
    }
}
