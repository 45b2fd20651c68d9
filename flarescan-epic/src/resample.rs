//! Raster resampling: rotation, resizing and padding.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::similar_names
)]

use flarescan_core::RotationCanvas;
use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Tolerance used when deciding whether a sample point lies on the raster.
const EDGE_EPSILON: f64 = 1e-9;

/// Bilinear sample that returns zero for points off the raster.
///
/// No interpolation happens past the outermost pixel centres.
fn sample_clipped(src: &ArrayView2<'_, f64>, r: f64, c: f64) -> f64 {
    let (rows, cols) = src.dim();
    if rows == 0 || cols == 0 {
        return 0.0;
    }
    let max_r = (rows - 1) as f64;
    let max_c = (cols - 1) as f64;
    if r < -EDGE_EPSILON || c < -EDGE_EPSILON || r > max_r + EDGE_EPSILON || c > max_c + EDGE_EPSILON
    {
        return 0.0;
    }
    let r = r.clamp(0.0, max_r);
    let c = c.clamp(0.0, max_c);
    let r0 = r.floor() as usize;
    let c0 = c.floor() as usize;
    let r1 = (r0 + 1).min(rows - 1);
    let c1 = (c0 + 1).min(cols - 1);
    let fr = r - r0 as f64;
    let fc = c - c0 as f64;

    let top = src[[r0, c0]] * (1.0 - fc) + src[[r0, c1]] * fc;
    let bottom = src[[r1, c0]] * (1.0 - fc) + src[[r1, c1]] * fc;
    top * (1.0 - fr) + bottom * fr
}

/// Bilinear sample where pixels off the raster count as zero.
///
/// Points just beyond the edge blend towards zero instead of being cut.
fn sample_blended(src: &ArrayView2<'_, f64>, r: f64, c: f64) -> f64 {
    let (rows, cols) = src.dim();
    let r0 = r.floor();
    let c0 = c.floor();
    let fr = r - r0;
    let fc = c - c0;
    let value = |ri: f64, ci: f64| -> f64 {
        if ri < 0.0 || ci < 0.0 || ri >= rows as f64 || ci >= cols as f64 {
            0.0
        } else {
            src[[ri as usize, ci as usize]]
        }
    };

    let top = value(r0, c0) * (1.0 - fc) + value(r0, c0 + 1.0) * fc;
    let bottom = value(r0 + 1.0, c0) * (1.0 - fc) + value(r0 + 1.0, c0 + 1.0) * fc;
    top * (1.0 - fr) + bottom * fr
}

/// Rotates a raster by `angle` degrees about its centre.
///
/// Output pixel `o` samples the input at `R · o + offset` with
/// `R = [[cos, sin], [-sin, cos]]`, the offset chosen so the raster
/// centres coincide. With [`RotationCanvas::Expand`] the output grows to
/// the rotated bounding box; with [`RotationCanvas::Fixed`] it keeps the
/// input shape.
#[must_use]
pub fn rotate(src: &ArrayView2<'_, f64>, angle: f64, canvas: RotationCanvas) -> Array2<f64> {
    let (rows, cols) = src.dim();
    let theta = angle.to_radians();
    let (sin, cos) = theta.sin_cos();

    let out_shape = match canvas {
        RotationCanvas::Fixed => (rows, cols),
        RotationCanvas::Expand => {
            let (iy, ix) = (rows as f64, cols as f64);
            let corners = [(0.0, 0.0), (0.0, ix), (iy, 0.0), (iy, ix)];
            let (mut r_min, mut r_max) = (f64::INFINITY, f64::NEG_INFINITY);
            let (mut c_min, mut c_max) = (f64::INFINITY, f64::NEG_INFINITY);
            for (y, x) in corners {
                let r = cos * y + sin * x;
                let c = -sin * y + cos * x;
                r_min = r_min.min(r);
                r_max = r_max.max(r);
                c_min = c_min.min(c);
                c_max = c_max.max(c);
            }
            (
                (r_max - r_min + 0.5).floor() as usize,
                (c_max - c_min + 0.5).floor() as usize,
            )
        }
    };

    let out_center_r = (out_shape.0 as f64 - 1.0) / 2.0;
    let out_center_c = (out_shape.1 as f64 - 1.0) / 2.0;
    let in_center_r = (rows as f64 - 1.0) / 2.0;
    let in_center_c = (cols as f64 - 1.0) / 2.0;
    let offset_r = in_center_r - (cos * out_center_r + sin * out_center_c);
    let offset_c = in_center_c - (-sin * out_center_r + cos * out_center_c);

    Array2::from_shape_fn(out_shape, |(r, c)| {
        let (r, c) = (r as f64, c as f64);
        let in_r = cos * r + sin * c + offset_r;
        let in_c = -sin * r + cos * c + offset_c;
        sample_clipped(src, in_r, in_c)
    })
}

/// Normalised 1-D Gaussian kernel truncated at four sigma.
fn gaussian_kernel(sigma: f64) -> Array1<f64> {
    let radius = (4.0 * sigma + 0.5) as usize;
    let mut kernel = Array1::from_shape_fn(2 * radius + 1, |i| {
        let x = i as f64 - radius as f64;
        (-0.5 * (x / sigma).powi(2)).exp()
    });
    let total = kernel.sum();
    kernel /= total;
    kernel
}

/// Zero-padded Gaussian smoothing along one axis.
fn smooth_axis(src: &Array2<f64>, axis: Axis, sigma: f64) -> Array2<f64> {
    if sigma <= 0.0 {
        return src.clone();
    }
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;
    let mut out = Array2::zeros(src.dim());
    for (src_lane, mut out_lane) in src.lanes(axis).into_iter().zip(out.lanes_mut(axis)) {
        let n = src_lane.len() as isize;
        for i in 0..n {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let j = i + k as isize - radius;
                if (0..n).contains(&j) {
                    acc += weight * src_lane[j as usize];
                }
            }
            out_lane[i as usize] = acc;
        }
    }
    out
}

/// Resizes a raster with bilinear interpolation.
///
/// Pixel centres are aligned (`in = (out + 0.5) · scale − 0.5`). When an
/// axis shrinks, the raster is first smoothed with a Gaussian of
/// `sigma = (scale − 1) / 2` along it to limit aliasing.
#[must_use]
pub fn resize(src: &ArrayView2<'_, f64>, shape: (usize, usize)) -> Array2<f64> {
    let (rows, cols) = src.dim();
    if shape.0 == 0 || shape.1 == 0 || rows == 0 || cols == 0 {
        return Array2::zeros(shape);
    }
    let scale_r = rows as f64 / shape.0 as f64;
    let scale_c = cols as f64 / shape.1 as f64;

    let mut smoothed = src.to_owned();
    if scale_r > 1.0 {
        smoothed = smooth_axis(&smoothed, Axis(0), (scale_r - 1.0) / 2.0);
    }
    if scale_c > 1.0 {
        smoothed = smooth_axis(&smoothed, Axis(1), (scale_c - 1.0) / 2.0);
    }
    let view = smoothed.view();

    Array2::from_shape_fn(shape, |(r, c)| {
        let in_r = (r as f64 + 0.5) * scale_r - 0.5;
        let in_c = (c as f64 + 0.5) * scale_c - 0.5;
        sample_blended(&view, in_r, in_c)
    })
}

/// Surrounds a raster with zeros: `rows` before/after along axis 0 and
/// `cols` before/after along axis 1.
#[must_use]
pub fn pad(src: &ArrayView2<'_, f64>, rows: (usize, usize), cols: (usize, usize)) -> Array2<f64> {
    let (h, w) = src.dim();
    let mut out = Array2::zeros((rows.0 + h + rows.1, cols.0 + w + cols.1));
    out.slice_mut(ndarray::s![rows.0..rows.0 + h, cols.0..cols.0 + w])
        .assign(src);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, s};

    fn ramp(rows: usize, cols: usize) -> Array2<f64> {
        Array2::from_shape_fn((rows, cols), |(r, c)| (r * cols + c) as f64)
    }

    #[test]
    fn test_zero_rotation_is_identity() {
        let src = ramp(5, 7);
        for canvas in [RotationCanvas::Expand, RotationCanvas::Fixed] {
            let out = rotate(&src.view(), 0.0, canvas);
            assert_eq!(out.dim(), (5, 7));
            for (a, b) in out.iter().zip(src.iter()) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_quarter_turn_expands_canvas() {
        let src = ramp(4, 6);
        let out = rotate(&src.view(), 90.0, RotationCanvas::Expand);
        assert_eq!(out.dim(), (6, 4));

        // A quarter turn is a transpose followed by a row flip.
        let expected = src.t().slice(s![..;-1, ..]).to_owned();
        for (a, b) in out.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_fixed_canvas_keeps_shape() {
        let src = ramp(8, 12);
        let out = rotate(&src.view(), 33.0, RotationCanvas::Fixed);
        assert_eq!(out.dim(), (8, 12));
        let expanded = rotate(&src.view(), 33.0, RotationCanvas::Expand);
        assert!(expanded.dim().0 > 8 && expanded.dim().1 > 12);
    }

    #[test]
    fn test_resize_constant_interior() {
        let src = Array2::from_elem((10, 10), 2.0);
        let out = resize(&src.view(), (20, 20));
        assert_eq!(out.dim(), (20, 20));
        assert_abs_diff_eq!(out[[10, 10]], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_resize_identity_shape() {
        let src = ramp(6, 9);
        let out = resize(&src.view(), (6, 9));
        for (a, b) in out.iter().zip(src.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_downsample_preserves_mean_of_flat_field() {
        let src = Array2::from_elem((40, 40), 1.0);
        let out = resize(&src.view(), (10, 10));
        assert_abs_diff_eq!(out[[5, 5]], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_pad() {
        let src = array![[1.0, 2.0], [3.0, 4.0]];
        let out = pad(&src.view(), (1, 2), (3, 0));
        assert_eq!(out.dim(), (5, 5));
        assert_abs_diff_eq!(out[[1, 3]], 1.0);
        assert_abs_diff_eq!(out[[2, 4]], 4.0);
        assert_abs_diff_eq!(out.sum(), 10.0);
    }
}
