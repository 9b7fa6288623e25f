//! Bilinear resize on HWC `f32` arrays.
//!
//! The `image` crate's own resize clamps float pixels to `[0, 1]`, which would
//! erase the high-pass overshoot, so resizing is done on the array directly.

use ndarray::{Array3, ArrayView3, Axis, Zip};

use crate::image::NormalizedImage;

/// Neighbouring source indices and the weight of the second one.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn bilinear_taps(dst: usize, scale: f32, src_len: usize) -> (usize, usize, f32) {
    let pos = (dst as f32 + 0.5).mul_add(scale, -0.5);
    if pos <= 0.0 {
        return (0, 0, 0.0);
    }
    let last = src_len - 1;
    let floor = pos.floor();
    let i0 = floor as usize;
    if i0 >= last {
        return (last, last, 0.0);
    }
    (i0, i0 + 1, pos - floor)
}

/// Bilinear resize to `new_width` x `new_height` using pixel-center alignment.
///
/// Values are interpolated but never clamped.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn resize_bilinear(
    image: ArrayView3<'_, f32>,
    new_width: usize,
    new_height: usize,
) -> NormalizedImage {
    let (height, width, channels) = image.dim();
    let mut output = Array3::<f32>::zeros((new_height, new_width, channels));
    if height == 0 || width == 0 {
        return output;
    }

    let scale_x = width as f32 / new_width as f32;
    let scale_y = height as f32 / new_height as f32;
    let x_taps: Vec<_> = (0..new_width)
        .map(|x| bilinear_taps(x, scale_x, width))
        .collect();

    Zip::indexed(output.axis_iter_mut(Axis(0))).par_for_each(|y, mut out_row| {
        let (y0, y1, fy) = bilinear_taps(y, scale_y, height);
        for (x, &(x0, x1, fx)) in x_taps.iter().enumerate() {
            for c in 0..channels {
                let (a, b) = (image[[y0, x0, c]], image[[y0, x1, c]]);
                let top = (b - a).mul_add(fx, a);
                let (a, b) = (image[[y1, x0, c]], image[[y1, x1, c]]);
                let bottom = (b - a).mul_add(fx, a);
                out_row[[x, c]] = (bottom - top).mul_add(fy, top);
            }
        }
    });

    output
}
