//! Median-of-three spike rejection followed by exponential smoothing.

/// Median of three values.
#[inline]
pub fn median_of_three(mut a: f64, mut b: f64, mut c: f64) -> f64 {
    if a > b {
        std::mem::swap(&mut a, &mut b);
    }
    if b > c {
        std::mem::swap(&mut b, &mut c);
    }
    if a > b {
        std::mem::swap(&mut a, &mut b);
    }
    b
}

/// Three-slot ring that passes samples through until it is full, then yields
/// the median of the last three.
#[derive(Debug, Clone, Default)]
pub struct MedianOfThree {
    buf: [f64; 3],
    idx: usize,
    count: usize,
}

impl MedianOfThree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, x: f64) -> f64 {
        self.buf[self.idx] = x;
        self.idx = (self.idx + 1) % self.buf.len();
        if self.count < self.buf.len() {
            self.count += 1;
        }
        if self.count < self.buf.len() {
            return x;
        }
        median_of_three(self.buf[0], self.buf[1], self.buf[2])
    }

    pub fn is_full(&self) -> bool {
        self.count == self.buf.len()
    }

    pub fn reset(&mut self) {
        self.idx = 0;
        self.count = 0;
    }
}

/// Exponential moving average; the first sample after construction or
/// [`Ema::invalidate`] seeds the accumulator.
#[derive(Debug, Clone)]
pub struct Ema {
    alpha: f64,
    value: Option<f64>,
}

impl Ema {
    pub fn new(alpha: f64) -> Self {
        Self { alpha, value: None }
    }

    pub fn update(&mut self, x: f64) -> f64 {
        let next = match self.value {
            None => x,
            Some(prev) => self.alpha * x + (1.0 - self.alpha) * prev,
        };
        self.value = Some(next);
        next
    }

    /// Force the accumulator to `x`.
    pub fn seed(&mut self, x: f64) {
        self.value = Some(x);
    }

    pub fn invalidate(&mut self) {
        self.value = None;
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}
