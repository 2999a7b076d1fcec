use serde::Serialize;

/// Minimum enclosing circle of one saturated blob, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BlobCircle {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

const EPS: f64 = 1e-7;

impl BlobCircle {
    fn around(p: (f64, f64)) -> Self {
        Self {
            x: p.0,
            y: p.1,
            radius: 0.0,
        }
    }

    fn contains(&self, p: (f64, f64)) -> bool {
        let (dx, dy) = (p.0 - self.x, p.1 - self.y);
        (dx * dx + dy * dy).sqrt() <= self.radius + EPS * (1.0 + self.radius)
    }

    fn diameter(a: (f64, f64), b: (f64, f64)) -> Self {
        let (x, y) = ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0);
        let radius = ((a.0 - x).powi(2) + (a.1 - y).powi(2)).sqrt();
        Self { x, y, radius }
    }

    /// Circumcircle of three points. Collinear triples fall back to the
    /// widest two-point circle.
    fn through(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Self {
        let (bx, by) = (b.0 - a.0, b.1 - a.1);
        let (cx, cy) = (c.0 - a.0, c.1 - a.1);
        let d = 2.0 * (bx * cy - by * cx);
        if d.abs() < EPS {
            return [Self::diameter(a, b), Self::diameter(a, c), Self::diameter(b, c)]
                .into_iter()
                .fold(Self::around(a), |best, cand| {
                    if cand.radius > best.radius {
                        cand
                    } else {
                        best
                    }
                });
        }
        let b2 = bx * bx + by * by;
        let c2 = cx * cx + cy * cy;
        let ux = (cy * b2 - by * c2) / d;
        let uy = (bx * c2 - cx * b2) / d;
        Self {
            x: a.0 + ux,
            y: a.1 + uy,
            radius: (ux * ux + uy * uy).sqrt(),
        }
    }
}

/// Smallest circle containing every point, or `None` for an empty set.
///
/// Incremental Welzl construction over a fixed pseudo-random permutation
/// of the input, so the expected cost is linear and the result depends
/// only on the points.
pub fn min_enclosing_circle(points: &[(f64, f64)]) -> Option<BlobCircle> {
    if points.is_empty() {
        return None;
    }
    let pts = shuffled(points);

    let mut circle = BlobCircle::around(pts[0]);
    for i in 0..pts.len() {
        if circle.contains(pts[i]) {
            continue;
        }
        circle = BlobCircle::around(pts[i]);
        for j in 0..i {
            if circle.contains(pts[j]) {
                continue;
            }
            circle = BlobCircle::diameter(pts[i], pts[j]);
            for k in 0..j {
                if !circle.contains(pts[k]) {
                    circle = BlobCircle::through(pts[i], pts[j], pts[k]);
                }
            }
        }
    }
    Some(circle)
}

// Fisher-Yates with a fixed xorshift seed.
fn shuffled(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut pts = points.to_vec();
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    for i in (1..pts.len()).rev() {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let j = (state % (i as u64 + 1)) as usize;
        pts.swap(i, j);
    }
    pts
}
