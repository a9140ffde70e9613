/*
 * Copyright 2019 The Regents of the University of California
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 *
 */

use crate::types::Float;

/// Sliding-window sigma-test peak detector
///
/// Maintains a ring buffer of the last `size` samples and their running
/// sum. Once the ring has filled, each new sample is tested against
/// `thres` standard deviations of the buffer's mean before being folded in.
#[derive(Debug, Clone)]
pub struct PeakDetector {
    history: Vec<Float>,
    size: usize,
    p: usize,
    count: usize,
    accum: Float,
    inv_size: Float,
    thr2: Float,
}

impl PeakDetector {
    /// Creates a detector over a `size`-sample window with a `thres`-sigma
    /// threshold
    pub fn new(size: usize, thres: Float) -> Self {
        PeakDetector {
            history: vec![0.0; size.max(1)],
            size: size.max(1),
            p: 0,
            count: 0,
            accum: 0.0,
            inv_size: 1.0 / size.max(1) as Float,
            thr2: thres * thres,
        }
    }

    /// Feeds one sample. Returns `1` if `x` is a peak above the mean, `-1`
    /// if it is a peak below the mean, `0` otherwise (including while the
    /// window is still filling).
    pub fn feed(&mut self, x: Float) -> i32 {
        if self.count < self.size {
            self.history[self.count] = x;
            self.count += 1;
            self.accum += x;
            return 0;
        }

        let mean = self.inv_size * self.accum;
        let variance = self
            .history
            .iter()
            .map(|&h| (h - mean) * (h - mean))
            .sum::<Float>()
            * self.inv_size;

        let dist2 = (x - mean) * (x - mean);
        let peak = if dist2 > self.thr2 * variance {
            if x > mean {
                1
            } else {
                -1
            }
        } else {
            0
        };

        self.accum -= self.history[self.p];
        self.history[self.p] = x;
        self.p += 1;
        if self.p == self.size {
            self.p = 0;
        }
        self.accum += x;

        peak
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn stays_quiet_while_filling() {
        let mut pd = PeakDetector::new(8, 2.0);
        for _ in 0..8 {
            assert_eq!(pd.feed(0.0), 0);
        }
    }

    #[test]
    fn flags_an_upward_outlier() {
        let mut pd = PeakDetector::new(16, 2.0);
        for i in 0..16 {
            pd.feed(if i % 2 == 0 { -0.01 } else { 0.01 });
        }
        assert_eq!(pd.feed(50.0), 1);
    }

    #[test]
    fn flags_a_downward_outlier() {
        let mut pd = PeakDetector::new(16, 2.0);
        for i in 0..16 {
            pd.feed(if i % 2 == 0 { -0.01 } else { 0.01 });
        }
        assert_eq!(pd.feed(-50.0), -1);
    }
}
