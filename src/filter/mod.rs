pub mod design;
pub mod resampling;

use std::collections::VecDeque;

use crate::scan::Scanner;

/// Fixed-capacity sample history. Once full, pushing evicts the oldest
/// sample.
#[derive(Clone, Debug)]
pub struct DelayLine<S> {
    buffer: VecDeque<S>,
    capacity: usize,
}

impl<S> DelayLine<S> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: S) -> Option<S> {
        let evicted = if self.buffer.len() == self.capacity {
            self.buffer.pop_back()
        }
        else {
            None
        };
        self.buffer.push_front(sample);
        evicted
    }

    /// Sample pushed `age` calls ago. `get(0)` is the most recent.
    #[inline]
    pub fn get(&self, age: usize) -> Option<&S> {
        self.buffer.get(age)
    }

    /// Newest to oldest.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &S> {
        self.buffer.iter()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.buffer.len() == self.capacity
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[derive(Clone, Debug)]
pub struct FirFilter<S, C> {
    coefficients: Vec<C>,
    delayed: VecDeque<S>,
}

impl<S, C> FirFilter<S, C> {
    #[inline]
    pub fn new(coefficients: Vec<C>) -> Self {
        assert!(coefficients.len() > 1);

        let delayed = VecDeque::with_capacity(coefficients.len() - 1);

        Self {
            coefficients,
            delayed,
        }
    }

    pub fn clear(&mut self) {
        self.delayed.clear();
    }
}

impl<S, C> Scanner<S> for FirFilter<S, C>
where
    S: Copy + std::ops::Mul<C, Output = S> + std::ops::Add<S, Output = S>,
    C: Copy,
{
    type Output = S;

    fn scan(&mut self, sample: S) -> Self::Output {
        debug_assert!(self.delayed.len() < self.coefficients.len());

        let mut output = sample * self.coefficients[0];
        for (delayed, coeff) in self.delayed.iter().zip(&self.coefficients[1..]) {
            output = output + *delayed * *coeff;
        }

        if self.delayed.len() == self.coefficients.len() - 1 {
            self.delayed.pop_back();
        }
        self.delayed.push_front(sample);

        output
    }
}

/// Running median over a short window, used to knock single-sample
/// glitches out of the frequency stream before it reaches a state
/// machine.
#[derive(Clone, Debug)]
pub struct MedianFilter {
    window: VecDeque<f64>,
    size: usize,
}

impl MedianFilter {
    pub fn new(size: usize) -> Self {
        assert!(size > 0);
        Self {
            window: VecDeque::with_capacity(size),
            size,
        }
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }
}

impl Scanner<f64> for MedianFilter {
    type Output = f64;

    fn scan(&mut self, sample: f64) -> f64 {
        if self.window.len() == self.size {
            self.window.pop_front();
        }
        self.window.push_back(sample);

        let mut sorted = self.window.iter().copied().collect::<Vec<f64>>();
        sorted.sort_by(|a, b| a.total_cmp(b));
        sorted[sorted.len() / 2]
    }
}
