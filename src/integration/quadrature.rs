/// Fixed quadrature rules over the unit interval, as `(position, weight)` pairs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QuadratureRule {
    /// The mid-point rule
    OnePoint,
    /// Two equally weighted points at the quarter positions
    TwoPoint,
}

const ONE_POINT: [(f64, f64); 1] = [(0.5, 1.0)];
const TWO_POINT: [(f64, f64); 2] = [(0.25, 0.5), (0.75, 0.5)];

impl QuadratureRule {
    pub fn points(&self) -> &'static [(f64, f64)] {
        match self {
            Self::OnePoint => &ONE_POINT,
            Self::TwoPoint => &TWO_POINT,
        }
    }

    /// Approximate the integral of `f` over [0, 1]
    pub fn integrate<F>(&self, mut f: F) -> f64
    where
        F: FnMut(f64) -> f64,
    {
        self.points().iter().map(|(x, w)| f(*x) * w).sum()
    }
}

impl Default for QuadratureRule {
    fn default() -> Self {
        Self::TwoPoint
    }
}
