//! Default engine implementation built on the `image` crate.

use async_trait::async_trait;
use image::{imageops, DynamicImage, GrayImage, ImageFormat, Luma};
use serde_json::Value;
use std::io::Cursor;
use std::path::Path;

use super::error::EngineError;
use super::registry;
use super::traits::ImageEngine;
use super::types::MetricMap;

/// PSNR is unbounded for identical images; report this cap instead.
const PSNR_CAP: f64 = 99.0;

/// In-process image engine.
///
/// All pixel work runs on the blocking pool so the async scheduler only ever
/// sees short suspension points.
pub struct OpsEngine {
    preview_max_width: u32,
}

impl OpsEngine {
    pub fn new(preview_max_width: u32) -> Self {
        Self { preview_max_width }
    }

    pub fn with_defaults() -> Self {
        Self::new(640)
    }

    pub fn preview_max_width(&self) -> u32 {
        self.preview_max_width
    }

    /// Downscale then apply, for the fast preview path.
    pub async fn preview(
        &self,
        image: DynamicImage,
        operation: &str,
        params: &Value,
        target: Option<DynamicImage>,
    ) -> Result<(DynamicImage, MetricMap), EngineError> {
        let max_width = self.preview_max_width;
        let image = if image.width() > max_width {
            let ratio = max_width as f64 / image.width() as f64;
            let height = (image.height() as f64 * ratio).round().max(1.0) as u32;
            image.resize_exact(max_width, height, imageops::FilterType::Triangle)
        } else {
            image
        };
        self.apply_operation(image, operation, params, target).await
    }
}

#[async_trait]
impl ImageEngine for OpsEngine {
    fn name(&self) -> &str {
        "ops"
    }

    async fn load_image(&self, path: &Path) -> Result<DynamicImage, EngineError> {
        let path = path.to_path_buf();
        let result = tokio::task::spawn_blocking(move || {
            image::open(&path).map_err(|source| EngineError::LoadFailed { path, source })
        })
        .await;
        match result {
            Ok(inner) => inner,
            Err(e) => Err(EngineError::OperationFailed {
                reason: format!("image load task failed: {e}"),
            }),
        }
    }

    async fn apply_operation(
        &self,
        image: DynamicImage,
        operation: &str,
        params: &Value,
        target: Option<DynamicImage>,
    ) -> Result<(DynamicImage, MetricMap), EngineError> {
        let operation = registry::canonical_operation_id(operation)?;
        if registry::requires_reference(operation) && target.is_none() {
            return Err(EngineError::ReferenceRequired(operation.to_string()));
        }

        let params = params.clone();
        let result = tokio::task::spawn_blocking(move || {
            apply_sync(image, operation, &params, target)
        })
        .await;
        match result {
            Ok(inner) => inner,
            Err(e) => Err(EngineError::OperationFailed {
                reason: format!("operation task failed: {e}"),
            }),
        }
    }

    async fn comparison_metrics(
        &self,
        original: &DynamicImage,
        processed: &DynamicImage,
    ) -> MetricMap {
        let original = original.to_luma8();
        let processed = processed.to_luma8();
        let result =
            tokio::task::spawn_blocking(move || comparison_metrics_gray(&original, &processed))
                .await;
        result.unwrap_or_default()
    }

    fn encode_png(&self, image: &DynamicImage) -> Result<Vec<u8>, EngineError> {
        let mut buf = Cursor::new(Vec::new());
        image
            .write_to(&mut buf, ImageFormat::Png)
            .map_err(|source| EngineError::EncodeFailed { source })?;
        Ok(buf.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

fn apply_sync(
    image: DynamicImage,
    operation: &str,
    params: &Value,
    target: Option<DynamicImage>,
) -> Result<(DynamicImage, MetricMap), EngineError> {
    let mut metrics = MetricMap::new();
    let out = match operation {
        "negative" => op_negative(&image),
        "log" => op_log(&image, param_f64(params, "gain", 1.0)),
        "gamma" => op_gamma(
            &image,
            param_f64(params, "gamma", 1.0),
            param_f64(params, "gain", 1.0),
        ),
        "histogram" => op_equalize(&image),
        "histogram_match" => {
            let target = target.ok_or_else(|| {
                EngineError::ReferenceRequired("histogram_match".to_string())
            })?;
            op_histogram_match(&image, &target, &param_str(params, "mode", "rgb"))
        }
        "gaussian" => image.blur(param_f64(params, "sigma", 1.0) as f32),
        "median" => op_median(&image, force_odd(param_i64(params, "kernel", 3)) as u32),
        "sharpen" => op_sharpen(
            &image,
            param_f64(params, "amount", 1.0),
            param_f64(params, "radius", 1.0),
        ),
        "edge" => op_edge(&image, &param_str(params, "method", "sobel")),
        "threshold_global" => {
            let threshold = param_i64(params, "threshold", 128) as u8;
            metrics.insert("threshold".to_string(), threshold as f64);
            op_threshold(&image, threshold, param_i64(params, "max_value", 255) as u8)
        }
        "threshold_adaptive" => match param_str(params, "mode", "mean").as_str() {
            "otsu" => {
                let gray = image.to_luma8();
                let threshold = otsu_threshold(&gray);
                metrics.insert("otsu_threshold".to_string(), threshold as f64);
                op_threshold(&image, threshold, 255)
            }
            _ => op_adaptive_mean(
                &image,
                force_odd(param_i64(params, "block_size", 11)) as u32,
                param_i64(params, "constant", 2) as i32,
            ),
        },
        "brightness" => image.brighten(param_i64(params, "value", 0) as i32),
        "contrast" => image.adjust_contrast(param_f64(params, "amount", 0.0) as f32),
        "grayscale" => DynamicImage::ImageLuma8(image.to_luma8()),
        "rotate" => match param_str(params, "degrees", "90").as_str() {
            "180" => image.rotate180(),
            "270" => image.rotate270(),
            _ => image.rotate90(),
        },
        other => return Err(EngineError::UnknownOperation(other.to_string())),
    };
    Ok((out, metrics))
}

// ---------------------------------------------------------------------------
// Param readers (params are pre-validated by the registry)
// ---------------------------------------------------------------------------

fn param_f64(params: &Value, name: &str, default: f64) -> f64 {
    params.get(name).and_then(Value::as_f64).unwrap_or(default)
}

fn param_i64(params: &Value, name: &str, default: i64) -> i64 {
    params.get(name).and_then(Value::as_i64).unwrap_or(default)
}

fn param_str(params: &Value, name: &str, default: &str) -> String {
    params
        .get(name)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

fn force_odd(value: i64) -> i64 {
    if value % 2 == 0 {
        value + 1
    } else {
        value
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

fn op_negative(image: &DynamicImage) -> DynamicImage {
    let mut rgba = image.to_rgba8();
    for pixel in rgba.pixels_mut() {
        pixel.0[0] = 255 - pixel.0[0];
        pixel.0[1] = 255 - pixel.0[1];
        pixel.0[2] = 255 - pixel.0[2];
    }
    DynamicImage::ImageRgba8(rgba)
}

fn op_log(image: &DynamicImage, gain: f64) -> DynamicImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut values = vec![0f64; (width * height * 3) as usize];
    let mut min = f64::MAX;
    let mut max = f64::MIN;
    for (i, pixel) in rgba.pixels().enumerate() {
        for c in 0..3 {
            let v = gain * (1.0 + pixel.0[c] as f64 / 255.0).ln();
            values[i * 3 + c] = v;
            min = min.min(v);
            max = max.max(v);
        }
    }

    let range = (max - min).max(f64::EPSILON);
    let mut out = rgba.clone();
    for (i, pixel) in out.pixels_mut().enumerate() {
        for c in 0..3 {
            let v = (values[i * 3 + c] - min) / range * 255.0;
            pixel.0[c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    DynamicImage::ImageRgba8(out)
}

fn op_gamma(image: &DynamicImage, gamma: f64, gain: f64) -> DynamicImage {
    let inv_gamma = 1.0 / gamma.max(0.01);
    let mut table = [0u8; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        let v = gain * (i as f64 / 255.0).powf(inv_gamma) * 255.0;
        *entry = v.round().clamp(0.0, 255.0) as u8;
    }

    let mut rgba = image.to_rgba8();
    for pixel in rgba.pixels_mut() {
        pixel.0[0] = table[pixel.0[0] as usize];
        pixel.0[1] = table[pixel.0[1] as usize];
        pixel.0[2] = table[pixel.0[2] as usize];
    }
    DynamicImage::ImageRgba8(rgba)
}

fn op_equalize(image: &DynamicImage) -> DynamicImage {
    let gray = image.to_luma8();
    let total = (gray.width() * gray.height()) as u64;
    if total == 0 {
        return DynamicImage::ImageLuma8(gray);
    }

    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    // Standard CDF equalization, anchored at the first occupied bin.
    let mut cdf = [0u64; 256];
    let mut cumulative = 0u64;
    for (i, count) in histogram.iter().enumerate() {
        cumulative += count;
        cdf[i] = cumulative;
    }
    let cdf_min = cdf.iter().copied().find(|&c| c > 0).unwrap_or(0);
    let denom = (total - cdf_min).max(1) as f64;

    let mut table = [0u8; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        let v = (cdf[i].saturating_sub(cdf_min)) as f64 / denom * 255.0;
        *entry = v.round().clamp(0.0, 255.0) as u8;
    }

    let mut out = gray;
    for pixel in out.pixels_mut() {
        pixel.0[0] = table[pixel.0[0] as usize];
    }
    DynamicImage::ImageLuma8(out)
}

fn op_histogram_match(
    image: &DynamicImage,
    target: &DynamicImage,
    mode: &str,
) -> DynamicImage {
    if mode == "grayscale" {
        let source = image.to_luma8();
        let reference = target.to_luma8();
        let table = match_table(&channel_histogram(source.as_raw(), 1, 0), &channel_histogram(reference.as_raw(), 1, 0));
        let mut out = source;
        for pixel in out.pixels_mut() {
            pixel.0[0] = table[pixel.0[0] as usize];
        }
        return DynamicImage::ImageLuma8(out);
    }

    let mut source = image.to_rgba8();
    let reference = target.to_rgba8();
    for c in 0..3 {
        let table = match_table(
            &channel_histogram(source.as_raw(), 4, c),
            &channel_histogram(reference.as_raw(), 4, c),
        );
        for pixel in source.pixels_mut() {
            pixel.0[c] = table[pixel.0[c] as usize];
        }
    }
    DynamicImage::ImageRgba8(source)
}

fn channel_histogram(raw: &[u8], stride: usize, channel: usize) -> [u64; 256] {
    let mut histogram = [0u64; 256];
    for chunk in raw.chunks_exact(stride) {
        histogram[chunk[channel] as usize] += 1;
    }
    histogram
}

/// Quantile mapping: send each source level to the target level whose CDF
/// first reaches the source's.
fn match_table(source: &[u64; 256], reference: &[u64; 256]) -> [u8; 256] {
    let source_total: u64 = source.iter().sum::<u64>().max(1);
    let reference_total: u64 = reference.iter().sum::<u64>().max(1);

    let mut source_cdf = [0f64; 256];
    let mut reference_cdf = [0f64; 256];
    let mut acc = 0u64;
    for i in 0..256 {
        acc += source[i];
        source_cdf[i] = acc as f64 / source_total as f64;
    }
    acc = 0;
    for i in 0..256 {
        acc += reference[i];
        reference_cdf[i] = acc as f64 / reference_total as f64;
    }

    let mut table = [0u8; 256];
    let mut j = 0usize;
    for i in 0..256 {
        while j < 255 && reference_cdf[j] < source_cdf[i] {
            j += 1;
        }
        table[i] = j as u8;
    }
    table
}

fn op_median(image: &DynamicImage, kernel: u32) -> DynamicImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let radius = (kernel / 2) as i64;
    let mut out = rgba.clone();

    let mut window = Vec::with_capacity((kernel * kernel) as usize);
    for y in 0..height {
        for x in 0..width {
            for c in 0..3 {
                window.clear();
                for dy in -radius..=radius {
                    for dx in -radius..=radius {
                        let ny = (y as i64 + dy).clamp(0, height as i64 - 1) as u32;
                        let nx = (x as i64 + dx).clamp(0, width as i64 - 1) as u32;
                        window.push(rgba.get_pixel(nx, ny).0[c]);
                    }
                }
                window.sort_unstable();
                out.get_pixel_mut(x, y).0[c] = window[window.len() / 2];
            }
        }
    }
    DynamicImage::ImageRgba8(out)
}

fn op_sharpen(image: &DynamicImage, amount: f64, radius: f64) -> DynamicImage {
    let original = image.to_rgba8();
    let blurred = image.blur(radius.max(0.1) as f32).to_rgba8();
    let mut out = original.clone();
    for (pixel, (orig, blur)) in out
        .pixels_mut()
        .zip(original.pixels().zip(blurred.pixels()))
    {
        for c in 0..3 {
            let sharp = orig.0[c] as f64 + amount * (orig.0[c] as f64 - blur.0[c] as f64);
            pixel.0[c] = sharp.round().clamp(0.0, 255.0) as u8;
        }
    }
    DynamicImage::ImageRgba8(out)
}

fn op_edge(image: &DynamicImage, method: &str) -> DynamicImage {
    let gray = image.to_luma8();
    let (width, height) = gray.dimensions();

    let (kx, ky): ([i32; 9], [i32; 9]) = if method == "prewitt" {
        (
            [-1, 0, 1, -1, 0, 1, -1, 0, 1],
            [1, 1, 1, 0, 0, 0, -1, -1, -1],
        )
    } else {
        (
            [-1, 0, 1, -2, 0, 2, -1, 0, 1],
            [1, 2, 1, 0, 0, 0, -1, -2, -1],
        )
    };

    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let mut gx = 0i32;
            let mut gy = 0i32;
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let ny = (y as i64 + dy).clamp(0, height as i64 - 1) as u32;
                    let nx = (x as i64 + dx).clamp(0, width as i64 - 1) as u32;
                    let v = gray.get_pixel(nx, ny).0[0] as i32;
                    let idx = ((dy + 1) * 3 + (dx + 1)) as usize;
                    gx += kx[idx] * v;
                    gy += ky[idx] * v;
                }
            }
            let magnitude = ((gx * gx + gy * gy) as f64).sqrt();
            out.put_pixel(x, y, Luma([magnitude.round().clamp(0.0, 255.0) as u8]));
        }
    }
    DynamicImage::ImageLuma8(out)
}

fn op_threshold(image: &DynamicImage, threshold: u8, max_value: u8) -> DynamicImage {
    let mut gray = image.to_luma8();
    for pixel in gray.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > threshold { max_value } else { 0 };
    }
    DynamicImage::ImageLuma8(gray)
}

fn op_adaptive_mean(image: &DynamicImage, block_size: u32, constant: i32) -> DynamicImage {
    let gray = image.to_luma8();
    let (width, height) = gray.dimensions();
    let radius = (block_size / 2) as i64;

    // Integral image keeps the local mean O(1) per pixel.
    let w = width as usize + 1;
    let h = height as usize + 1;
    let mut integral = vec![0u64; w * h];
    for y in 0..height as usize {
        let mut row_sum = 0u64;
        for x in 0..width as usize {
            row_sum += gray.get_pixel(x as u32, y as u32).0[0] as u64;
            integral[(y + 1) * w + x + 1] = integral[y * w + x + 1] + row_sum;
        }
    }

    let mut out = GrayImage::new(width, height);
    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let x0 = (x - radius).max(0) as usize;
            let y0 = (y - radius).max(0) as usize;
            let x1 = (x + radius + 1).min(width as i64) as usize;
            let y1 = (y + radius + 1).min(height as i64) as usize;
            let count = ((x1 - x0) * (y1 - y0)) as u64;
            let sum = integral[y1 * w + x1] + integral[y0 * w + x0]
                - integral[y0 * w + x1]
                - integral[y1 * w + x0];
            let mean = (sum / count.max(1)) as i32;
            let v = gray.get_pixel(x as u32, y as u32).0[0] as i32;
            let value = if v > mean - constant { 255 } else { 0 };
            out.put_pixel(x as u32, y as u32, Luma([value]));
        }
    }
    DynamicImage::ImageLuma8(out)
}

/// Otsu's method: threshold maximizing between-class variance.
fn otsu_threshold(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }
    let total = (gray.width() * gray.height()) as f64;
    if total == 0.0 {
        return 128;
    }

    let global_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();

    let mut best_threshold = 0u8;
    let mut best_variance = 0.0f64;
    let mut weight_bg = 0.0f64;
    let mut sum_bg = 0.0f64;

    for t in 0..256usize {
        weight_bg += histogram[t] as f64;
        if weight_bg == 0.0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0.0 {
            break;
        }
        sum_bg += t as f64 * histogram[t] as f64;
        let mean_bg = sum_bg / weight_bg;
        let mean_fg = (global_sum - sum_bg) / weight_fg;
        let variance = weight_bg * weight_fg * (mean_bg - mean_fg).powi(2);
        if variance > best_variance {
            best_variance = variance;
            best_threshold = t as u8;
        }
    }
    best_threshold
}

// ---------------------------------------------------------------------------
// Comparison metrics
// ---------------------------------------------------------------------------

fn comparison_metrics_gray(original: &GrayImage, processed: &GrayImage) -> MetricMap {
    let mut metrics = MetricMap::new();
    if original.dimensions() != processed.dimensions() {
        return metrics;
    }
    let count = (original.width() * original.height()) as f64;
    if count == 0.0 {
        return metrics;
    }

    let mut mse = 0.0f64;
    for (a, b) in original.pixels().zip(processed.pixels()) {
        let diff = a.0[0] as f64 - b.0[0] as f64;
        mse += diff * diff;
    }
    mse /= count;

    let psnr = if mse == 0.0 {
        PSNR_CAP
    } else {
        (10.0 * (255.0f64 * 255.0 / mse).log10()).min(PSNR_CAP)
    };

    metrics.insert("mse".to_string(), mse);
    metrics.insert("psnr".to_string(), psnr);
    metrics.insert("ssim".to_string(), ssim_global(original, processed, count));
    metrics
}

/// Global (single-window) SSIM over the full image.
fn ssim_global(original: &GrayImage, processed: &GrayImage, count: f64) -> f64 {
    let c1 = (0.01f64 * 255.0).powi(2);
    let c2 = (0.03f64 * 255.0).powi(2);

    let mean_a: f64 = original.pixels().map(|p| p.0[0] as f64).sum::<f64>() / count;
    let mean_b: f64 = processed.pixels().map(|p| p.0[0] as f64).sum::<f64>() / count;

    let mut var_a = 0.0f64;
    let mut var_b = 0.0f64;
    let mut covar = 0.0f64;
    for (a, b) in original.pixels().zip(processed.pixels()) {
        let da = a.0[0] as f64 - mean_a;
        let db = b.0[0] as f64 - mean_b;
        var_a += da * da;
        var_b += db * db;
        covar += da * db;
    }
    var_a /= count;
    var_b /= count;
    covar /= count;

    ((2.0 * mean_a * mean_b + c1) * (2.0 * covar + c2))
        / ((mean_a * mean_a + mean_b * mean_b + c1) * (var_a + var_b + c2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use serde_json::json;

    fn uniform_image(width: u32, height: u32, value: u8) -> DynamicImage {
        let mut img = RgbaImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = Rgba([value, value, value, 255]);
        }
        DynamicImage::ImageRgba8(img)
    }

    #[tokio::test]
    async fn test_negative_inverts_pixels() {
        let engine = OpsEngine::with_defaults();
        let img = uniform_image(8, 8, 100);
        let (out, metrics) = engine
            .apply_operation(img, "negative", &json!({}), None)
            .await
            .unwrap();
        assert_eq!(out.to_rgba8().get_pixel(0, 0).0[0], 155);
        assert!(metrics.is_empty());
    }

    #[tokio::test]
    async fn test_negative_preserves_alpha() {
        let engine = OpsEngine::with_defaults();
        let mut img = RgbaImage::new(2, 2);
        for pixel in img.pixels_mut() {
            *pixel = Rgba([10, 20, 30, 77]);
        }
        let (out, _) = engine
            .apply_operation(DynamicImage::ImageRgba8(img), "negative", &json!({}), None)
            .await
            .unwrap();
        assert_eq!(out.to_rgba8().get_pixel(0, 0).0, [245, 235, 225, 77]);
    }

    #[tokio::test]
    async fn test_gamma_identity_is_noop() {
        let engine = OpsEngine::with_defaults();
        let img = uniform_image(4, 4, 120);
        let (out, _) = engine
            .apply_operation(img, "gamma", &json!({"gamma": 1.0, "gain": 1.0}), None)
            .await
            .unwrap();
        assert_eq!(out.to_rgba8().get_pixel(0, 0).0[0], 120);
    }

    #[tokio::test]
    async fn test_threshold_global() {
        let engine = OpsEngine::with_defaults();
        let img = uniform_image(4, 4, 200);
        let (out, metrics) = engine
            .apply_operation(
                img,
                "threshold_global",
                &json!({"threshold": 128, "max_value": 255}),
                None,
            )
            .await
            .unwrap();
        assert_eq!(out.to_luma8().get_pixel(0, 0).0[0], 255);
        assert_eq!(metrics.get("threshold"), Some(&128.0));
    }

    #[tokio::test]
    async fn test_otsu_reports_threshold_metric() {
        let engine = OpsEngine::with_defaults();
        // Bimodal image: left half dark, right half bright.
        let mut img = RgbaImage::new(8, 8);
        for (x, _y, pixel) in img.enumerate_pixels_mut() {
            let v = if x < 4 { 20 } else { 220 };
            *pixel = Rgba([v, v, v, 255]);
        }
        let (out, metrics) = engine
            .apply_operation(
                DynamicImage::ImageRgba8(img),
                "threshold_adaptive",
                &json!({"mode": "otsu", "block_size": 11, "constant": 2}),
                None,
            )
            .await
            .unwrap();
        let threshold = metrics["otsu_threshold"];
        assert!(threshold >= 20.0 && threshold < 220.0);
        let binary = out.to_luma8();
        assert_eq!(binary.get_pixel(0, 0).0[0], 0);
        assert_eq!(binary.get_pixel(7, 0).0[0], 255);
    }

    #[tokio::test]
    async fn test_histogram_match_requires_target() {
        let engine = OpsEngine::with_defaults();
        let img = uniform_image(4, 4, 100);
        let result = engine
            .apply_operation(img, "histogram_match", &json!({"mode": "rgb"}), None)
            .await;
        assert!(matches!(result, Err(EngineError::ReferenceRequired(_))));
    }

    #[tokio::test]
    async fn test_histogram_match_shifts_toward_reference() {
        let engine = OpsEngine::with_defaults();
        let source = uniform_image(8, 8, 50);
        let reference = uniform_image(8, 8, 200);
        let (out, _) = engine
            .apply_operation(
                source,
                "histogram_match",
                &json!({"mode": "rgb"}),
                Some(reference),
            )
            .await
            .unwrap();
        assert_eq!(out.to_rgba8().get_pixel(0, 0).0[0], 200);
    }

    #[tokio::test]
    async fn test_edge_on_flat_image_is_black() {
        let engine = OpsEngine::with_defaults();
        let img = uniform_image(8, 8, 128);
        let (out, _) = engine
            .apply_operation(img, "edge", &json!({"method": "sobel"}), None)
            .await
            .unwrap();
        assert!(out.to_luma8().pixels().all(|p| p.0[0] == 0));
    }

    #[tokio::test]
    async fn test_rotate_swaps_dimensions() {
        let engine = OpsEngine::with_defaults();
        let img = uniform_image(6, 3, 10);
        let (out, _) = engine
            .apply_operation(img, "rotate", &json!({"degrees": "90"}), None)
            .await
            .unwrap();
        assert_eq!((out.width(), out.height()), (3, 6));
    }

    #[tokio::test]
    async fn test_comparison_metrics_identical_images() {
        let engine = OpsEngine::with_defaults();
        let a = uniform_image(16, 16, 90);
        let b = uniform_image(16, 16, 90);
        let metrics = engine.comparison_metrics(&a, &b).await;
        assert_eq!(metrics["mse"], 0.0);
        assert_eq!(metrics["psnr"], PSNR_CAP);
        assert!(metrics["ssim"] > 0.99);
    }

    #[tokio::test]
    async fn test_comparison_metrics_dimension_mismatch_is_empty() {
        let engine = OpsEngine::with_defaults();
        let a = uniform_image(16, 16, 90);
        let b = uniform_image(8, 8, 90);
        let metrics = engine.comparison_metrics(&a, &b).await;
        assert!(metrics.is_empty());
    }

    #[tokio::test]
    async fn test_preview_downscales_wide_images() {
        let engine = OpsEngine::new(32);
        let img = uniform_image(100, 50, 60);
        let (out, _) = engine
            .preview(img, "negative", &json!({}), None)
            .await
            .unwrap();
        assert_eq!(out.width(), 32);
        assert_eq!(out.height(), 16);
    }

    #[tokio::test]
    async fn test_unknown_operation_rejected() {
        let engine = OpsEngine::with_defaults();
        let img = uniform_image(4, 4, 10);
        let result = engine.apply_operation(img, "emboss", &json!({}), None).await;
        assert!(matches!(result, Err(EngineError::UnknownOperation(_))));
    }

    #[test]
    fn test_encode_png_roundtrip() {
        let engine = OpsEngine::with_defaults();
        let img = uniform_image(4, 4, 10);
        let bytes = engine.encode_png(&img).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 4);
    }
}
