use rayon::prelude::*;

/// Frames closer than this many steps (including the frame itself) are never linked.
const WIDTH: usize = 1;

/// A frame's nearest neighbours: `(frame index, affinity)`.
pub type Links = Vec<(usize, f32)>;

/// Affinity-weighted k-nearest-neighbour recurrence graph under cosine distance.
///
/// `k = 2 * ceil(sqrt(t - 2 * WIDTH + 1))`. Distances are turned into affinities
/// with `exp(-d / bandwidth)`, where the bandwidth is the median over frames of
/// the largest distance at which that frame was chosen as a neighbour.
pub fn recurrence_affinity(frames: &[Vec<f32>]) -> Vec<Links> {
    let t = frames.len();
    if t < 2 {
        return vec![Vec::new(); t];
    }

    let k = if t > 2 * WIDTH + 1 {
        2 * ((t - 2 * WIDTH + 1) as f64).sqrt().ceil() as usize
    } else {
        2
    };

    let unit: Vec<Vec<f32>> = frames.iter().map(|f| unit_vector(f)).collect();

    let neighbours: Vec<Vec<(usize, f32)>> = (0..t)
        .into_par_iter()
        .map(|i| {
            let mut candidates: Vec<(usize, f32)> = (0..t)
                .filter(|&j| i.abs_diff(j) >= WIDTH)
                .map(|j| (j, cosine_distance(&unit[i], &unit[j])))
                .collect();
            candidates.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
            candidates.truncate(k);
            candidates
        })
        .collect();

    // Largest distance at which each frame was picked by anyone.
    let mut picked_max = vec![0.0f32; t];
    for links in &neighbours {
        for &(j, d) in links {
            picked_max[j] = picked_max[j].max(d);
        }
    }
    let mut positive: Vec<f32> = picked_max.into_iter().filter(|&d| d > 0.0).collect();
    let bandwidth = if positive.is_empty() {
        1.0
    } else {
        positive.sort_by(|a, b| a.total_cmp(b));
        median_sorted(&positive)
    };

    log::debug!("Recurrence: {} frames, k={}, bandwidth={:.4}", t, k, bandwidth);

    neighbours
        .into_iter()
        .map(|links| {
            links
                .into_iter()
                .map(|(j, d)| (j, (-d / bandwidth).exp()))
                .collect()
        })
        .collect()
}

/// Replace every frame by the affinity-weighted average of its neighbours.
/// Frames without neighbours are kept as they are.
pub fn nn_filter(frames: &[Vec<f32>], links: &[Links]) -> Vec<Vec<f32>> {
    frames
        .par_iter()
        .zip(links.par_iter())
        .map(|(frame, links)| {
            let total: f32 = links.iter().map(|(_, a)| a).sum();
            if links.is_empty() || total <= 0.0 {
                return frame.clone();
            }
            let mut out = vec![0.0f32; frame.len()];
            for &(j, a) in links {
                for (o, v) in out.iter_mut().zip(&frames[j]) {
                    *o += a * v;
                }
            }
            out.iter_mut().for_each(|o| *o /= total);
            out
        })
        .collect()
}

/// Recurrence smoothing in one step.
pub fn smooth(frames: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let links = recurrence_affinity(frames);
    nn_filter(frames, &links)
}

fn unit_vector(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        vec![0.0; v.len()]
    }
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    (1.0 - dot).max(0.0)
}

fn median_sorted(sorted: &[f32]) -> f32 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_exclude_self_and_prefer_similar_frames() {
        // Alternating two spectral shapes: neighbours should share a shape.
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 0.0, 1.0];
        let frames: Vec<Vec<f32>> = (0..30).map(|i| if i % 2 == 0 { a.clone() } else { b.clone() }).collect();
        let links = recurrence_affinity(&frames);

        assert_eq!(links.len(), 30);
        for (i, l) in links.iter().enumerate() {
            assert!(!l.is_empty());
            assert!(l.iter().all(|&(j, _)| j != i));
            assert!(l.iter().all(|&(j, _)| j % 2 == i % 2), "frame {} linked across shapes", i);
            assert!(l.iter().all(|&(_, aff)| aff > 0.0 && aff <= 1.0));
        }
    }

    #[test]
    fn filter_suppresses_one_off_transient() {
        let mut frames: Vec<Vec<f32>> = (0..20).map(|_| vec![1.0, 1.0, 0.0]).collect();
        frames[7] = vec![1.0, 1.0, 5.0];
        let out = smooth(&frames);
        assert_eq!(out.len(), 20);
        assert!(out[7][2] < 1.0);
        assert!((out[3][0] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn tiny_inputs() {
        assert!(smooth(&[]).is_empty());
        let one = vec![vec![0.5, 0.25]];
        assert_eq!(smooth(&one), one);
    }

    #[test]
    fn silent_frames_stay_silent() {
        let frames = vec![vec![0.0f32; 8]; 10];
        let out = smooth(&frames);
        assert!(out.iter().flatten().all(|&v| v == 0.0));
    }
}
