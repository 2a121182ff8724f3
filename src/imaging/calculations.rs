//! Pure calculation functions for resize geometry and progress.
//!
//! All functions here are pure and testable without any I/O or images.
//! Integer arithmetic is used throughout so results are exactly
//! reproducible across platforms.

/// Calculate the size of the scaled image for fit/fill letterboxing.
///
/// Scales `source` by `min(target_w / src_w, target_h / src_h)` so that it
/// fits entirely within `target`. The limiting axis matches the target
/// exactly; the other axis is rounded to the nearest pixel and clamped to
/// `[1, target]`.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target` - Canvas dimensions (width, height)
///
/// # Examples
/// ```
/// # use bulk_resize::imaging::calculate_fit_dimensions;
/// // 200x100 landscape into a 100x100 square → 100x50
/// assert_eq!(calculate_fit_dimensions((200, 100), (100, 100)), (100, 50));
///
/// // Upscaling is allowed: 10x20 into 100x100 → 50x100
/// assert_eq!(calculate_fit_dimensions((10, 20), (100, 100)), (50, 100));
/// ```
pub fn calculate_fit_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = (source.0.max(1) as u64, source.1.max(1) as u64);
    let (tgt_w, tgt_h) = (target.0 as u64, target.1 as u64);

    // Compare tgt_w / src_w against tgt_h / src_h without division.
    if tgt_w * src_h <= tgt_h * src_w {
        // Width is the limiting axis
        let h = round_div(src_h * tgt_w, src_w).clamp(1, tgt_h);
        (tgt_w as u32, h as u32)
    } else {
        // Height is the limiting axis
        let w = round_div(src_w * tgt_h, src_h).clamp(1, tgt_w);
        (w as u32, tgt_h as u32)
    }
}

/// Top-left offset that centers `inner` inside `outer`.
///
/// Odd leftover space is split with floor division, so the left/top margin
/// is never larger than the right/bottom one.
pub fn calculate_centered_offset(inner: (u32, u32), outer: (u32, u32)) -> (u32, u32) {
    (
        outer.0.saturating_sub(inner.0) / 2,
        outer.1.saturating_sub(inner.1) / 2,
    )
}

/// Aggregate task progress as a whole percentage: `round(100 * completed / total)`.
///
/// Halves round up. A task with no items reports 0.
pub fn calculate_progress(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total) as u64;
    round_div(100 * completed, total as u64) as u8
}

/// `round(numerator / denominator)` with halves rounding up.
fn round_div(numerator: u64, denominator: u64) -> u64 {
    (2 * numerator + denominator) / (2 * denominator)
}
