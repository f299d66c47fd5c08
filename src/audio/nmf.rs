//! Two-factor non-negative matrix factorisation of a spectrogram.
//!
//! The spectrogram is laid out frame-major (`frames[t][f]`) and factorised as
//! `X ≈ W · H` with `W` (frames × r) the activations and `H` (r × bins) the
//! spectral components. Frobenius loss, multiplicative updates, NNDSVD-style
//! initialisation with zeros filled by the mean of `X`.

const MAX_ITER: usize = 200;
const TOL: f32 = 1e-4;
const EPS: f32 = 1e-10;
const POWER_ITERS: usize = 100;

/// Result of `decompose`: one component and one activation series per factor,
/// sorted by the frequency bin at which each component peaks.
#[derive(Clone, Debug)]
pub struct Decomposition {
    /// `components[c][f]`
    pub components: Vec<Vec<f32>>,
    /// `activations[c][t]`
    pub activations: Vec<Vec<f32>>,
}

pub fn decompose(frames: &[Vec<f32>], n_components: usize) -> Decomposition {
    let t = frames.len();
    let f = frames.first().map_or(0, |fr| fr.len());

    let total: f32 = frames.iter().flatten().sum();
    if t == 0 || f == 0 || total <= 0.0 {
        return Decomposition {
            components: vec![vec![0.0; f]; n_components],
            activations: vec![vec![0.0; t]; n_components],
        };
    }

    let (mut w, mut h) = initialize(frames, n_components);

    let initial_error = frobenius_error(frames, &w, &h);
    let mut previous_error = initial_error;

    for iter in 0..MAX_ITER {
        update_h(frames, &w, &mut h);
        update_w(frames, &mut w, &h);

        if (iter + 1) % 10 == 0 {
            let error = frobenius_error(frames, &w, &h);
            if initial_error > 0.0 && (previous_error - error) / initial_error < TOL {
                log::debug!("NMF converged after {} iterations (error {:.4})", iter + 1, error);
                break;
            }
            previous_error = error;
        }
    }

    // Order components by where their spectral peak sits.
    let peak_bin = |c: usize| -> usize {
        h[c].iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map_or(0, |(i, _)| i)
    };
    let mut order: Vec<usize> = (0..n_components).collect();
    order.sort_by_key(|&c| peak_bin(c));

    Decomposition {
        components: order.iter().map(|&c| h[c].clone()).collect(),
        activations: order
            .iter()
            .map(|&c| w.iter().map(|row| row[c]).collect())
            .collect(),
    }
}

fn initialize(x: &[Vec<f32>], r: usize) -> (Vec<Vec<f32>>, Vec<Vec<f32>>) {
    let t = x.len();
    let f = x[0].len();
    let mean = x.iter().flatten().sum::<f32>() / (t * f) as f32;

    let (singular, left, right) = truncated_svd(x, r);

    let mut w = vec![vec![0.0f32; r]; t];
    let mut h = vec![vec![0.0f32; f]; r];

    for c in 0..r {
        let s = singular[c];
        if s <= 0.0 {
            continue;
        }
        let (u, v, sigma) = if c == 0 {
            (
                left[c].iter().map(|x| x.abs()).collect::<Vec<_>>(),
                right[c].iter().map(|x| x.abs()).collect::<Vec<_>>(),
                1.0,
            )
        } else {
            dominant_sign_part(&left[c], &right[c])
        };
        let lambda = (s * sigma).sqrt();
        for i in 0..t {
            w[i][c] = lambda * u[i];
        }
        for j in 0..f {
            h[c][j] = lambda * v[j];
        }
    }

    for v in w.iter_mut().flatten().chain(h.iter_mut().flatten()) {
        if *v < 1e-6 {
            *v = mean;
        }
    }
    (w, h)
}

/// Pick whichever of the positive or negative halves of a singular pair carries
/// more weight, normalised, along with that weight.
fn dominant_sign_part(x: &[f32], y: &[f32]) -> (Vec<f32>, Vec<f32>, f32) {
    let pos = |v: &[f32]| v.iter().map(|a| a.max(0.0)).collect::<Vec<_>>();
    let neg = |v: &[f32]| v.iter().map(|a| (-a).max(0.0)).collect::<Vec<_>>();
    let norm = |v: &[f32]| v.iter().map(|a| a * a).sum::<f32>().sqrt();

    let (xp, yp, xn, yn) = (pos(x), pos(y), neg(x), neg(y));
    let (xp_n, yp_n, xn_n, yn_n) = (norm(&xp), norm(&yp), norm(&xn), norm(&yn));
    let m_p = xp_n * yp_n;
    let m_n = xn_n * yn_n;

    let scale = |v: Vec<f32>, n: f32| -> Vec<f32> {
        if n > 0.0 {
            v.into_iter().map(|a| a / n).collect()
        } else {
            v
        }
    };

    if m_p > m_n {
        (scale(xp, xp_n), scale(yp, yp_n), m_p)
    } else {
        (scale(xn, xn_n), scale(yn, yn_n), m_n)
    }
}

/// Top-`r` singular triplets of `x` (t × f) by power iteration on `XᵀX`.
/// Returns (singular values, left vectors over t, right vectors over f).
fn truncated_svd(x: &[Vec<f32>], r: usize) -> (Vec<f32>, Vec<Vec<f32>>, Vec<Vec<f32>>) {
    let f = x[0].len();

    let mut gram = vec![vec![0.0f64; f]; f];
    for row in x {
        for a in 0..f {
            let ra = row[a] as f64;
            if ra == 0.0 {
                continue;
            }
            for b in 0..f {
                gram[a][b] += ra * row[b] as f64;
            }
        }
    }

    let mut singular = Vec::with_capacity(r);
    let mut lefts = Vec::with_capacity(r);
    let mut rights = Vec::with_capacity(r);

    for c in 0..r {
        // Deterministic start that is not orthogonal to typical spectra.
        let mut v: Vec<f64> = (0..f).map(|j| 1.0 + (j as f64 * 0.618 + c as f64).sin() * 0.5).collect();
        let mut eigenvalue = 0.0f64;
        for _ in 0..POWER_ITERS {
            let mut next: Vec<f64> = gram
                .iter()
                .map(|row| row.iter().zip(&v).map(|(g, vi)| g * vi).sum())
                .collect();
            let n = next.iter().map(|a| a * a).sum::<f64>().sqrt();
            if n <= f64::MIN_POSITIVE {
                eigenvalue = 0.0;
                break;
            }
            next.iter_mut().for_each(|a| *a /= n);
            eigenvalue = n;
            v = next;
        }

        // Deflate so the next pass finds the following pair.
        for a in 0..f {
            for b in 0..f {
                gram[a][b] -= eigenvalue * v[a] * v[b];
            }
        }

        let s = eigenvalue.max(0.0).sqrt();
        let u: Vec<f32> = x
            .iter()
            .map(|row| {
                let dot: f64 = row.iter().zip(&v).map(|(a, b)| *a as f64 * b).sum();
                if s > 0.0 {
                    (dot / s) as f32
                } else {
                    0.0
                }
            })
            .collect();

        singular.push(s as f32);
        lefts.push(u);
        rights.push(v.iter().map(|&a| a as f32).collect());
    }

    (singular, lefts, rights)
}

fn update_h(x: &[Vec<f32>], w: &[Vec<f32>], h: &mut [Vec<f32>]) {
    let r = h.len();
    let f = h[0].len();

    // WᵀX (r × f) and WᵀW (r × r)
    let mut wtx = vec![vec![0.0f32; f]; r];
    let mut wtw = vec![vec![0.0f32; r]; r];
    for (row_x, row_w) in x.iter().zip(w) {
        for a in 0..r {
            for j in 0..f {
                wtx[a][j] += row_w[a] * row_x[j];
            }
            for b in 0..r {
                wtw[a][b] += row_w[a] * row_w[b];
            }
        }
    }

    for a in 0..r {
        for j in 0..f {
            let denom: f32 = (0..r).map(|b| wtw[a][b] * h[b][j]).sum();
            h[a][j] *= wtx[a][j] / (denom + EPS);
        }
    }
}

fn update_w(x: &[Vec<f32>], w: &mut [Vec<f32>], h: &[Vec<f32>]) {
    let r = h.len();

    let mut hht = vec![vec![0.0f32; r]; r];
    for a in 0..r {
        for b in 0..r {
            hht[a][b] = h[a].iter().zip(&h[b]).map(|(p, q)| p * q).sum();
        }
    }

    for (row_x, row_w) in x.iter().zip(w.iter_mut()) {
        let xht: Vec<f32> = (0..r)
            .map(|a| row_x.iter().zip(&h[a]).map(|(p, q)| p * q).sum())
            .collect();
        let current = row_w.clone();
        for a in 0..r {
            let denom: f32 = (0..r).map(|b| current[b] * hht[b][a]).sum();
            row_w[a] *= xht[a] / (denom + EPS);
        }
    }
}

fn frobenius_error(x: &[Vec<f32>], w: &[Vec<f32>], h: &[Vec<f32>]) -> f32 {
    let mut sum = 0.0f64;
    for (row_x, row_w) in x.iter().zip(w) {
        for (j, &xv) in row_x.iter().enumerate() {
            let approx: f32 = row_w.iter().zip(h).map(|(wa, ha)| wa * ha[j]).sum();
            let d = (xv - approx) as f64;
            sum += d * d;
        }
    }
    sum.sqrt() as f32
}
