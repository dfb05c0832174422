use serde::{Deserialize, Serialize};

use crate::staggered::{StaggeredField, Staggering};

/// Spatial accuracy of the staggered first-derivative operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SpaceOrder {
    #[default]
    Second,
    Fourth,
}

const SECOND_ORDER: [f64; 1] = [1.0];
const FOURTH_ORDER: [f64; 2] = [9.0 / 8.0, -1.0 / 24.0];

impl SpaceOrder {
    /// Staggered-grid coefficients c_m multiplying
    /// `f(i + m + 1/2) - f(i - m - 1/2)`.
    pub fn coefficients(self) -> &'static [f64] {
        match self {
            SpaceOrder::Second => &SECOND_ORDER,
            SpaceOrder::Fourth => &FOURTH_ORDER,
        }
    }

    /// Stability constant C in `dt <= C * min(dx, dz) / max(V)` for the 2-D
    /// leapfrog scheme: `1 / (sqrt(2) * sum |c_m|)`.
    pub fn cfl_constant(self) -> f64 {
        let sum: f64 = self.coefficients().iter().map(|c| c.abs()).sum();
        1.0 / (std::f64::consts::SQRT_2 * sum)
    }

    pub fn as_u8(self) -> u8 {
        match self {
            SpaceOrder::Second => 2,
            SpaceOrder::Fourth => 4,
        }
    }
}

impl TryFrom<u8> for SpaceOrder {
    type Error = String;

    fn try_from(order: u8) -> Result<Self, Self::Error> {
        match order {
            2 => Ok(SpaceOrder::Second),
            4 => Ok(SpaceOrder::Fourth),
            other => Err(format!("unsupported space order {other} (expected 2 or 4)")),
        }
    }
}

impl From<SpaceOrder> for u8 {
    fn from(order: SpaceOrder) -> u8 {
        order.as_u8()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Z,
}

impl Axis {
    #[inline]
    fn step(self, i: isize, k: isize, m: isize) -> (isize, isize) {
        match self {
            Axis::X => (i + m, k),
            Axis::Z => (i, k + m),
        }
    }
}

/// Undivided difference of `f` evaluated half a cell *after* node (i, k)
/// along `axis`: takes a field on one family to the next family over
/// (pressure to velocity).
#[inline]
pub fn forward<L: Staggering>(
    f: &StaggeredField<L>,
    axis: Axis,
    i: usize,
    k: usize,
    coefficients: &[f64],
) -> f64 {
    let (i, k) = (i as isize, k as isize);
    let mut acc = 0.0;
    for (m, c) in coefficients.iter().enumerate() {
        let m = m as isize;
        let (ia, ka) = axis.step(i, k, m + 1);
        let (ib, kb) = axis.step(i, k, -m);
        acc += c * (f.get(ia, ka) - f.get(ib, kb));
    }
    acc
}

/// Undivided difference of `f` evaluated half a cell *before* node (i, k):
/// the adjoint (up to sign) of [`forward`], taking velocities back to
/// pressure nodes.
#[inline]
pub fn backward<L: Staggering>(
    f: &StaggeredField<L>,
    axis: Axis,
    i: usize,
    k: usize,
    coefficients: &[f64],
) -> f64 {
    let (i, k) = (i as isize, k as isize);
    let mut acc = 0.0;
    for (m, c) in coefficients.iter().enumerate() {
        let m = m as isize;
        let (ia, ka) = axis.step(i, k, m);
        let (ib, kb) = axis.step(i, k, -m - 1);
        acc += c * (f.get(ia, ka) - f.get(ib, kb));
    }
    acc
}
