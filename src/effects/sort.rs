use crate::error::Result;
use crate::render::frame::Frame;

/// Sort horizontal runs of dark pixels by luminance.
///
/// The luminance limit is `multiplier` times the median pixel luminance (capped
/// at 255). Pixels darker than `limit * signal` form runs along each row; every
/// run is sorted by luminance, brightest first when `reverse` is set.
pub fn pixel_sort(frame: &Frame, signal: f32, multiplier: f32, reverse: bool) -> Result<Frame> {
    frame.ensure_rgb("pixel_sort")?;

    let (width, height) = (frame.width as usize, frame.height as usize);
    if width == 0 || height == 0 {
        return Ok(frame.clone());
    }

    let mut lums: Vec<u32> = frame.data.chunks_exact(3).map(luminance).collect();
    let mid = lums.len() / 2;
    let median = if lums.len() % 2 == 1 {
        *lums.select_nth_unstable(mid).1 as f32
    } else {
        let hi = *lums.select_nth_unstable(mid).1;
        let lo = *lums[..mid].iter().max().unwrap_or(&hi);
        (lo + hi) as f32 / 2.0
    };
    let limit = (multiplier * median).abs().min(255.0);
    let threshold = limit * signal;

    let mut out = frame.clone();
    let stride = frame.row_bytes();
    for y in 0..height {
        let row = &mut out.data[y * stride..(y + 1) * stride];
        let mut x = 0;
        while x < width {
            if (mask_luma(&row[x * 3..x * 3 + 3]) as f32) >= threshold {
                x += 1;
                continue;
            }
            let start = x;
            while x < width && (mask_luma(&row[x * 3..x * 3 + 3]) as f32) < threshold {
                x += 1;
            }
            sort_run(&mut row[start * 3..x * 3], reverse);
        }
    }
    Ok(out)
}

fn sort_run(run: &mut [u8], reverse: bool) {
    let mut pixels: Vec<[u8; 3]> = run.chunks_exact(3).map(|p| [p[0], p[1], p[2]]).collect();
    if reverse {
        pixels.sort_by(|a, b| luminance(b).cmp(&luminance(a)));
    } else {
        pixels.sort_by_key(|p| luminance(p));
    }
    for (dst, p) in run.chunks_exact_mut(3).zip(pixels) {
        dst.copy_from_slice(&p);
    }
}

/// Rec. 709 luminance used for ordering.
fn luminance(p: &[u8]) -> u32 {
    (0.2126 * p[0] as f32 + 0.7152 * p[1] as f32 + 0.0722 * p[2] as f32) as u32
}

/// ITU-R 601 luma used for the sort mask.
fn mask_luma(p: &[u8]) -> u32 {
    (p[0] as u32 * 299 + p[1] as u32 * 587 + p[2] as u32 * 114) / 1000
}
