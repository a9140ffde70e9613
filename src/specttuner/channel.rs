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

//! A single channel of a [`super::SpectralTuner`]

use crate::error::{Error, Result};
use crate::fft::FftPlan;
use crate::ncqo::Ncqo;
use crate::types::{Complex, Float, TWO_PI};
use crate::windows::WindowFunction;
use num_traits::Zero;

/// Whether a channel wants overlap-add time-domain samples or raw
/// frequency-domain slices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// Deliver inverse-FFT, overlap-added time-domain samples
    Time,
    /// Deliver raw frequency-domain bins, once every two parent passes
    Frequency,
}

/// Parameters used to open a channel on a [`super::SpectralTuner`]
#[derive(Debug, Clone, Copy)]
pub struct ChannelParams {
    /// Carrier center, angular, `[0, 2*pi)`
    pub f0: Float,
    /// Fine frequency offset, angular
    pub delta_f: Float,
    /// Channel bandwidth, angular, `(0, 2*pi]`
    pub bw: Float,
    /// Extra decimation margin, `>= 1`
    pub guard: Float,
    /// If true, compensate bin-snap error with a time-domain NCQO
    pub precise: bool,
    /// Time or frequency domain output
    pub domain: Domain,
}

impl ChannelParams {
    fn validate(&self) -> Result<()> {
        if self.guard < 1.0 {
            return Err(Error::InvalidArgument("channel: guard must be >= 1"));
        }
        if !(self.bw > 0.0 && self.bw <= TWO_PI) {
            return Err(Error::InvalidArgument("channel: bw must be in (0, 2*pi]"));
        }
        let f = self.f0 + self.delta_f;
        if !(0.0..TWO_PI).contains(&f) {
            return Err(Error::InvalidArgument(
                "channel: f0 + delta_f must be in [0, 2*pi)",
            ));
        }
        Ok(())
    }
}

fn next_pow2(n: usize) -> usize {
    let mut p = 1usize;
    while p < n {
        p <<= 1;
    }
    p.max(1)
}

/// Builds the channel's brickwall-ish shaping filter of parent size `p`
/// with passband half-width `halfw`, following: fill the ideal response,
/// IFFT, recenter, apply a Blackman-Harris taper, recenter back, FFT.
fn build_filter(p: usize, halfw: usize) -> Vec<Complex> {
    let mut freq = vec![Complex::zero(); p];
    for i in 0..halfw.min(p) {
        freq[i] = Complex::new(1.0, 0.0);
        freq[(p - 1 - i) % p] = Complex::new(1.0, 0.0);
    }

    let mut plan = FftPlan::new(p);
    let mut time = vec![Complex::zero(); p];
    plan.inverse(&freq, &mut time);

    // Recenter (fftshift): swap the two halves so the impulse response,
    // currently split across the start and end of the array, is centered.
    let half = p / 2;
    time.rotate_left(half);

    let window = WindowFunction::BlackmanHarris.generate(p);
    for (sample, &w) in time.iter_mut().zip(window.iter()) {
        *sample = *sample * w;
    }

    time.rotate_right(half);

    let mut h = vec![Complex::zero(); p];
    plan.forward(&time, &mut h);
    // The FFT scales by `p`; we only use `h` as a relative shaping weight,
    // so normalize by its own DC-ish magnitude rather than `p` directly.
    let norm = h.iter().map(|c| c.norm()).fold(0.0 as Float, Float::max);
    if norm > Float::EPSILON {
        for v in h.iter_mut() {
            *v = *v * (1.0 / norm);
        }
    }
    h
}

fn sign_for_center(center: usize) -> Float {
    if center & 2 != 0 {
        -1.0
    } else {
        1.0
    }
}

/// A single extracted channel of a [`super::SpectralTuner`]
pub struct SpectralTunerChannel {
    params: ChannelParams,
    parent_size: usize,
    size: usize,
    decimation: usize,
    width: usize,
    halfw: usize,
    halfsz: usize,
    center: usize,
    last_center: usize,
    k: Float,
    h: Vec<Complex>,
    fft: Vec<Complex>,
    ifft_plan: FftPlan,
    /// Ping-pong IFFT output buffers, indexed `[even, odd]`
    ifft: [Vec<Complex>; 2],
    window: Vec<Float>,
    lo: Option<Ncqo>,
    old_lo: Option<Ncqo>,
    changing_freqs: bool,
    pending: Option<(Float, Float)>,
    ready: bool,
}

impl SpectralTunerChannel {
    pub(crate) fn new(parent_size: usize, params: ChannelParams) -> Result<Self> {
        params.validate()?;

        let actual_bw = params.bw * params.guard;
        let k_guarded = actual_bw / TWO_PI;
        let min_size = (k_guarded * parent_size as Float).ceil() as usize;
        let size = next_pow2(min_size.max(1)).min(parent_size);
        let decimation = (parent_size / size).max(1);
        let k = 1.0 / (decimation as Float * size as Float);

        let k_bw = params.bw / TWO_PI;
        let width = ((k_bw * parent_size as Float).ceil() as usize).max(2).min(size);
        let halfw = (width / 2).max(1);
        let halfsz = size / 2;

        let f = params.f0 + params.delta_f;
        let center = snap_center(f, parent_size);

        let (lo, old_lo) = if params.precise {
            let off = center as Float * TWO_PI / parent_size as Float - f;
            let fnor = crate::types::omega_to_fnor(off * decimation as Float);
            (Some(Ncqo::new(fnor)), Some(Ncqo::new(fnor)))
        } else {
            (None, None)
        };

        let h = build_filter(parent_size, halfw);

        Ok(SpectralTunerChannel {
            params,
            parent_size,
            size,
            decimation,
            width,
            halfw,
            halfsz,
            center,
            last_center: center,
            k,
            h,
            fft: vec![Complex::zero(); size],
            ifft_plan: FftPlan::new(size),
            ifft: [vec![Complex::zero(); size], vec![Complex::zero(); size]],
            window: sin2_window(size),
            lo,
            old_lo,
            changing_freqs: false,
            pending: None,
            ready: false,
        })
    }

    /// Whether this channel has produced new output since the last
    /// `ack_data` call
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Acknowledges the channel's last delivered output, clearing
    /// `is_ready` until the next completed analysis pass
    pub fn ack_data(&mut self) {
        self.ready = false;
    }

    /// The channel's per-channel IFFT length
    pub fn size(&self) -> usize {
        self.size
    }

    /// The input decimation factor (`parent_size / size`)
    pub fn decimation(&self) -> usize {
        self.decimation
    }

    /// The currently snapped, even-indexed parent FFT bin
    pub fn center(&self) -> usize {
        self.center
    }

    /// Records a pending carrier-center change, applied at the next
    /// odd-state FFT boundary
    pub fn set_freq(&mut self, f0: Float) {
        self.pending = Some((f0, self.params.delta_f));
    }

    /// Records a pending fine-offset change, applied at the next odd-state
    /// FFT boundary
    pub fn set_delta_f(&mut self, delta_f: Float) {
        let f0 = self.pending.map(|(f0, _)| f0).unwrap_or(self.params.f0);
        self.pending = Some((f0, delta_f));
    }

    /// Updates the channel bandwidth immediately and rebuilds the shaping
    /// filter. Fails if `width` would fall outside `(1, size]`.
    pub fn set_bandwidth(&mut self, bw: Float) -> Result<()> {
        if !(bw > 0.0 && bw <= TWO_PI) {
            return Err(Error::InvalidArgument("channel: bw must be in (0, 2*pi]"));
        }
        let k_bw = bw / TWO_PI;
        let width = ((k_bw * self.parent_size as Float).ceil() as usize).max(2);
        if width <= 1 || width > self.size {
            return Err(Error::InvalidArgument(
                "channel: requested width is out of (1, size]",
            ));
        }
        self.params.bw = bw;
        self.width = width;
        self.halfw = (width / 2).max(1);
        self.h = build_filter(self.parent_size, self.halfw);
        Ok(())
    }

    fn apply_pending_if_boundary(&mut self, state_is_even: bool) {
        if state_is_even {
            return;
        }
        if let Some((f0, delta_f)) = self.pending.take() {
            self.old_lo = self.lo.clone();
            self.last_center = self.center;
            self.params.f0 = f0;
            self.params.delta_f = delta_f;
            let f = f0 + delta_f;
            self.center = snap_center(f, self.parent_size);
            if self.params.precise {
                let off =
                    self.center as Float * TWO_PI / self.parent_size as Float - f;
                let fnor = crate::types::omega_to_fnor(off * self.decimation as Float);
                self.lo = Some(Ncqo::new(fnor));
            }
            self.changing_freqs = true;
        }
    }

    /// Runs one parent FFT pass's worth of extraction for this channel.
    ///
    /// `state_is_even` is the state of the parent FFT that just completed.
    /// `on_data` is called with the channel's output for this pass
    /// (`halfsz` time-domain samples, or `width` frequency-domain bins,
    /// every other pass); if it returns `false` the failure is reported to
    /// the caller as [`Error::CallbackRejection`] but extraction for other
    /// channels continues.
    pub fn feed_pass(
        &mut self,
        parent_fft: &[Complex],
        state_is_even: bool,
        mut on_data: impl FnMut(&[Complex]) -> bool,
    ) -> Result<()> {
        debug_assert_eq!(parent_fft.len(), self.parent_size);
        self.apply_pending_if_boundary(state_is_even);

        let p = self.parent_size;
        for v in self.fft.iter_mut() {
            *v = Complex::zero();
        }

        for i in 0..self.halfw {
            let src = (self.center + i) % p;
            self.fft[i] = parent_fft[src];
        }
        for i in 0..self.halfw {
            let src = (self.center + p - self.halfw + i) % p;
            let dst = self.size - self.halfw + i;
            self.fft[dst] = parent_fft[src];
        }

        if self.params.domain == Domain::Frequency {
            // Frequency-domain channels skip the shaping filter entirely and
            // only need a single contiguous `[0..width)` slice, so the lower
            // sideband (currently at `[size-halfw..size)`) is rotated down
            // next to the upper one before the plain `k` rescale.
            self.last_center = self.center;
            self.changing_freqs = false;
            if !state_is_even {
                return Ok(());
            }
            let lower = self.fft[self.size - self.halfw..self.size].to_vec();
            self.fft[self.halfw..self.halfw + self.halfw].copy_from_slice(&lower);
            for v in self.fft[..self.width].iter_mut() {
                *v = *v * self.k;
            }
            self.ready = true;
            if !on_data(&self.fft[..self.width]) {
                return Err(crate::error::logged(Error::CallbackRejection));
            }
            return Ok(());
        }

        for i in 0..self.halfsz {
            self.fft[i] = self.fft[i] * (self.k * self.h[i]);
            let mirror = self.size - i - 1;
            let h_mirror = self.h[p - i - 1];
            self.fft[mirror] = self.fft[mirror] * (self.k * h_mirror);
        }

        let cur_idx = if state_is_even { 0 } else { 1 };
        let prev_idx = 1 - cur_idx;

        let fft_snapshot = self.fft.clone();
        self.ifft_plan.inverse(&fft_snapshot, &mut self.ifft[cur_idx]);

        let a_sign = sign_for_center(self.center);
        let b_sign = sign_for_center(self.last_center);

        let mut out = vec![Complex::zero(); self.halfsz];
        for i in 0..self.halfsz {
            let curr = self.ifft[cur_idx][i] * a_sign;
            let prev = self.ifft[prev_idx][i + self.halfsz] * b_sign;

            let mut combined = curr * self.window[i] + prev * self.window[i + self.halfsz];

            if let Some(lo) = self.lo.as_mut() {
                if self.changing_freqs {
                    let old_lo = self.old_lo.as_mut().expect("old_lo set when changing");
                    let prev_rot = prev * old_lo.read();
                    let curr_rot = curr * lo.read();
                    combined = curr_rot * self.window[i] + prev_rot * self.window[i + self.halfsz];
                } else {
                    combined = combined * lo.read();
                }
            }

            out[i] = combined;
        }

        self.ready = true;
        self.last_center = self.center;
        self.changing_freqs = false;

        if !on_data(&out) {
            return Err(crate::error::logged(Error::CallbackRejection));
        }
        Ok(())
    }
}

fn snap_center(f: Float, parent_size: usize) -> usize {
    let bin = f * parent_size as Float / TWO_PI;
    let snapped = 2.0 * (bin / 2.0 + 1e-9).round();
    let snapped = snapped.rem_euclid(parent_size as Float);
    snapped as usize
}

fn sin2_window(size: usize) -> Vec<Float> {
    (0..size)
        .map(|i| {
            let x = std::f64::consts::PI * i as f64 / size as f64;
            x.sin().powi(2) as Float
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sin2_window_sums_to_unity_gain() {
        let size = 64;
        let halfsz = size / 2;
        let w = sin2_window(size);
        for i in 0..halfsz {
            assert!((w[i] + w[i + halfsz] - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn center_snap_is_always_even() {
        for millis in 0..6283 {
            let f = millis as Float / 1000.0;
            let c = snap_center(f, 2048);
            assert_eq!(c % 2, 0);
        }
    }

    #[test]
    fn rejects_bad_bandwidth() {
        let params = ChannelParams {
            f0: 0.0,
            delta_f: 0.0,
            bw: -1.0,
            guard: 1.0,
            precise: false,
            domain: Domain::Time,
        };
        assert!(SpectralTunerChannel::new(2048, params).is_err());
    }

    #[test]
    fn rejects_guard_below_one() {
        let params = ChannelParams {
            f0: 0.0,
            delta_f: 0.0,
            bw: 0.1,
            guard: 0.5,
            precise: false,
            domain: Domain::Time,
        };
        assert!(SpectralTunerChannel::new(2048, params).is_err());
    }

    #[test]
    fn frequency_domain_emit_rotates_lower_sideband_next_to_upper() {
        let parent_size = 256;
        let params = ChannelParams {
            f0: 0.0,
            delta_f: 0.0,
            bw: TWO_PI * 0.1,
            guard: 2.0,
            precise: false,
            domain: Domain::Frequency,
        };
        let mut ch = SpectralTunerChannel::new(parent_size, params).unwrap();
        assert!(ch.size < parent_size, "test assumes size < parent_size");

        let parent_fft: Vec<Complex> = (0..parent_size)
            .map(|i| Complex::new(i as Float + 1.0, 0.0))
            .collect();

        let mut delivered: Vec<Complex> = Vec::new();
        ch.feed_pass(&parent_fft, true, |data| {
            delivered = data.to_vec();
            true
        })
        .unwrap();

        assert_eq!(delivered.len(), ch.width);

        // Lower sideband bins (copied from parent[p-halfw..p)) must show up
        // immediately after the upper sideband, not as zeros.
        for i in 0..ch.halfw {
            let src = (parent_size - ch.halfw + i) % parent_size;
            let expected = parent_fft[src] * ch.k;
            assert!(
                (delivered[ch.halfw + i] - expected).norm() < 1e-6,
                "bin {} should carry the lower sideband, not a zero gap",
                ch.halfw + i
            );
        }
    }
}
