//! Bilinear weights shared by source injection and receiver sampling.
//!
//! Using one weighting for both directions keeps source/receiver
//! reciprocity exact up to round-off.

/// The four nodes surrounding a fractional position and their weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bilinear {
    i0: isize,
    k0: isize,
    fx: f64,
    fz: f64,
    shape: (usize, usize),
}

impl Bilinear {
    /// `x` and `z` are in the target field's own index coordinates.
    pub fn new(x: f64, z: f64, shape: (usize, usize)) -> Self {
        let (i0, fx) = split(x, shape.0);
        let (k0, fz) = split(z, shape.1);
        Bilinear {
            i0,
            k0,
            fx,
            fz,
            shape,
        }
    }

    /// Nodes inside the field with their weights. Weights of all four
    /// corners sum to one; corners that fall outside the field are skipped.
    pub fn nodes(&self) -> impl Iterator<Item = ((usize, usize), f64)> + '_ {
        let corners = [
            (0, 0, (1.0 - self.fx) * (1.0 - self.fz)),
            (1, 0, self.fx * (1.0 - self.fz)),
            (0, 1, (1.0 - self.fx) * self.fz),
            (1, 1, self.fx * self.fz),
        ];
        corners.into_iter().filter_map(move |(di, dk, w)| {
            let i = self.i0 + di;
            let k = self.k0 + dk;
            let inside = i >= 0
                && k >= 0
                && (i as usize) < self.shape.0
                && (k as usize) < self.shape.1;
            (inside && w != 0.0).then_some(((i as usize, k as usize), w))
        })
    }
}

// Lower corner index and fractional offset. A coordinate exactly on the
// last node pairs with the one before it so both stay inside the field.
fn split(x: f64, n: usize) -> (isize, f64) {
    let last = n as isize - 1;
    let mut i0 = x.floor() as isize;
    if i0 == last && x == last as f64 && n >= 2 {
        i0 -= 1;
    }
    (i0, x - i0 as f64)
}
