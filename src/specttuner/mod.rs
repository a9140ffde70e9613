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

//! Multi-channel frequency-domain extractor built over an overlap-save
//! analysis window.
//!
//! A [`SpectralTuner`] holds one shared forward FFT of size `P` (the
//! window size) over the most recent `P` input samples, re-executed every
//! `P/2` new samples with alternating EVEN/ODD phase. Each open
//! [`SpectralTunerChannel`] reuses that one FFT to extract, shape, and
//! (usually) decimate-and-inverse-FFT its own narrowband slice, overlapping
//! consecutive passes 50% to stay alias-free.

mod channel;

pub use self::channel::{ChannelParams, Domain, SpectralTunerChannel};

use crate::error::{Error, Result};
use crate::fft::FftPlan;
use crate::types::Complex;
use crate::windows::WindowFunction;
use num_traits::Zero;
use std::collections::VecDeque;

/// Opaque handle to a channel opened on a [`SpectralTuner`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(usize);

/// A shared-FFT multi-channel extractor
pub struct SpectralTuner {
    p: usize,
    h: usize,
    history: VecDeque<Complex>,
    since_last_fft: usize,
    state_even: bool,
    fft_plan: FftPlan,
    fft_buf: Vec<Complex>,
    early_window: Option<Vec<crate::types::Float>>,
    channels: Vec<Option<SpectralTunerChannel>>,
}

impl SpectralTuner {
    /// Creates a tuner with analysis window size `window_size` (must be
    /// even and positive). If `early_windowing` is set, the analysis frame
    /// is tapered by a Hann (`sin^2`) window before the shared forward FFT,
    /// trading frequency selectivity for a softer passband edge on every
    /// channel.
    pub fn new(window_size: usize, early_windowing: bool) -> Result<Self> {
        if window_size == 0 || window_size % 2 != 0 {
            return Err(Error::InvalidArgument(
                "specttuner: window_size must be even and positive",
            ));
        }
        let early_window = if early_windowing {
            Some(WindowFunction::Hann.generate(window_size))
        } else {
            None
        };
        Ok(SpectralTuner {
            p: window_size,
            h: window_size / 2,
            history: VecDeque::with_capacity(window_size),
            since_last_fft: 0,
            state_even: true,
            fft_plan: FftPlan::new(window_size),
            fft_buf: vec![Complex::zero(); window_size],
            early_window,
            channels: Vec::new(),
        })
    }

    /// The analysis window size `P`
    pub fn window_size(&self) -> usize {
        self.p
    }

    /// Opens a new channel, returning a handle used to feed it freqency or
    /// bandwidth changes and to close it later.
    pub fn open_channel(&mut self, params: ChannelParams) -> Result<ChannelId> {
        let ch = SpectralTunerChannel::new(self.p, params)?;
        for (i, slot) in self.channels.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(ch);
                return Ok(ChannelId(i));
            }
        }
        self.channels.push(Some(ch));
        Ok(ChannelId(self.channels.len() - 1))
    }

    /// Tears down a channel. The slot is reused by a later `open_channel`.
    pub fn close_channel(&mut self, id: ChannelId) -> Result<()> {
        match self.channels.get_mut(id.0) {
            Some(slot @ Some(_)) => {
                *slot = None;
                Ok(())
            }
            _ => Err(Error::InvalidArgument("specttuner: unknown channel id")),
        }
    }

    fn channel_mut(&mut self, id: ChannelId) -> Result<&mut SpectralTunerChannel> {
        self.channels
            .get_mut(id.0)
            .and_then(|slot| slot.as_mut())
            .ok_or(Error::InvalidArgument("specttuner: unknown channel id"))
    }

    /// Schedules a carrier-center change on `id`, applied at the next
    /// odd-state FFT boundary
    pub fn set_channel_freq(&mut self, id: ChannelId, f0: crate::types::Float) -> Result<()> {
        self.channel_mut(id)?.set_freq(f0);
        Ok(())
    }

    /// Schedules a fine-offset change on `id`, applied at the next
    /// odd-state FFT boundary
    pub fn set_channel_delta_f(&mut self, id: ChannelId, delta_f: crate::types::Float) -> Result<()> {
        self.channel_mut(id)?.set_delta_f(delta_f);
        Ok(())
    }

    /// Changes `id`'s bandwidth immediately, rebuilding its shaping filter
    pub fn set_channel_bandwidth(&mut self, id: ChannelId, bw: crate::types::Float) -> Result<()> {
        self.channel_mut(id)?.set_bandwidth(bw)
    }

    /// Whether `id` has produced new output since its last `ack_data`
    pub fn is_ready(&self, id: ChannelId) -> Result<bool> {
        self.channels
            .get(id.0)
            .and_then(|slot| slot.as_ref())
            .map(|ch| ch.is_ready())
            .ok_or(Error::InvalidArgument("specttuner: unknown channel id"))
    }

    /// Acknowledges `id`'s last delivered output, clearing `is_ready` until
    /// the next completed analysis pass
    pub fn ack_data(&mut self, id: ChannelId) -> Result<()> {
        self.channel_mut(id)?.ack_data();
        Ok(())
    }

    /// Feeds one sample. Returns `true` if a new analysis pass (and
    /// therefore possibly new channel output, delivered through a prior
    /// `feed_bulk` callback) was triggered.
    fn push_sample(&mut self, sample: Complex) -> bool {
        if self.history.len() == self.p {
            self.history.pop_front();
        }
        self.history.push_back(sample);
        self.since_last_fft += 1;
        self.history.len() == self.p && self.since_last_fft >= self.h
    }

    /// Feeds `samples` in order. `on_data` is called once per channel per
    /// completed analysis pass with that channel's id and output slice
    /// (`halfsz` time-domain samples for [`Domain::Time`] channels, `width`
    /// frequency-domain bins every other pass for [`Domain::Frequency`]
    /// channels). If `on_data` returns `false` the corresponding channel
    /// reports [`Error::CallbackRejection`], and extraction continues for
    /// the remaining channels and samples.
    pub fn feed_bulk(
        &mut self,
        samples: &[Complex],
        mut on_data: impl FnMut(ChannelId, &[Complex]) -> bool,
    ) -> Result<()> {
        for &sample in samples {
            if self.push_sample(sample) {
                self.since_last_fft -= self.h;
                self.run_pass(&mut on_data)?;
            }
        }
        Ok(())
    }

    fn run_pass(&mut self, on_data: &mut impl FnMut(ChannelId, &[Complex]) -> bool) -> Result<()> {
        let mut frame: Vec<Complex> = self.history.iter().copied().collect();
        if let Some(w) = &self.early_window {
            for (s, &wv) in frame.iter_mut().zip(w.iter()) {
                *s = *s * wv;
            }
        }
        self.fft_plan.forward(&frame, &mut self.fft_buf);

        let fft_buf = &self.fft_buf;
        let state_even = self.state_even;
        for (i, slot) in self.channels.iter_mut().enumerate() {
            if let Some(ch) = slot {
                let id = ChannelId(i);
                ch.feed_pass(fft_buf, state_even, |data| on_data(id, data))?;
            }
        }
        self.state_even = !self.state_even;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::{Float, TWO_PI};

    fn tone(n: usize, fnor: Float) -> Vec<Complex> {
        let omega = fnor * std::f64::consts::PI as Float;
        (0..n)
            .map(|i| {
                let phi = omega * i as Float;
                Complex::new(phi.cos(), phi.sin())
            })
            .collect()
    }

    #[test]
    fn rejects_odd_window_size() {
        assert!(SpectralTuner::new(5, false).is_err());
    }

    #[test]
    fn extracts_narrowband_tone_to_baseband() {
        let p = 1024;
        let mut tuner = SpectralTuner::new(p, false).unwrap();
        let f0 = TWO_PI * 0.125; // a quarter of the way to Nyquist
        let params = ChannelParams {
            f0,
            delta_f: 0.0,
            bw: TWO_PI * 0.05,
            guard: 2.0,
            precise: true,
            domain: Domain::Time,
        };
        let id = tuner.open_channel(params).unwrap();

        let input = tone(p * 20, 0.25);
        let mut collected: Vec<Complex> = Vec::new();
        tuner
            .feed_bulk(&input, |cid, data| {
                assert_eq!(cid, id);
                collected.extend_from_slice(data);
                true
            })
            .unwrap();

        assert!(!collected.is_empty());
        let tail = &collected[collected.len() / 2..];
        let avg_mag: Float = tail.iter().map(|c| c.norm()).sum::<Float>() / tail.len() as Float;
        assert!(avg_mag > 0.01, "expected nonzero baseband energy, got {}", avg_mag);
    }

    #[test]
    fn unknown_channel_id_is_rejected() {
        let mut tuner = SpectralTuner::new(64, false).unwrap();
        let bogus = ChannelId(9);
        assert!(tuner.close_channel(bogus).is_err());
    }

    #[test]
    fn ready_flag_clears_on_ack_data() {
        let p = 256;
        let mut tuner = SpectralTuner::new(p, false).unwrap();
        let params = ChannelParams {
            f0: TWO_PI * 0.25,
            delta_f: 0.0,
            bw: TWO_PI * 0.1,
            guard: 2.0,
            precise: false,
            domain: Domain::Time,
        };
        let id = tuner.open_channel(params).unwrap();
        assert!(!tuner.is_ready(id).unwrap());

        let input = tone(p, 0.25);
        tuner.feed_bulk(&input, |_, _| true).unwrap();
        assert!(tuner.is_ready(id).unwrap());

        tuner.ack_data(id).unwrap();
        assert!(!tuner.is_ready(id).unwrap());
    }

    #[test]
    fn frequency_domain_channel_delivers_width_bins_every_other_pass() {
        let p = 256;
        let mut tuner = SpectralTuner::new(p, false).unwrap();
        let params = ChannelParams {
            f0: TWO_PI * 0.25,
            delta_f: 0.0,
            bw: TWO_PI * 0.1,
            guard: 2.0,
            precise: false,
            domain: Domain::Frequency,
        };
        let id = tuner.open_channel(params).unwrap();

        let input = tone(p * 4, 0.25);
        let mut deliveries = 0usize;
        let mut last_len = 0usize;
        tuner
            .feed_bulk(&input, |cid, data| {
                assert_eq!(cid, id);
                deliveries += 1;
                last_len = data.len();
                true
            })
            .unwrap();

        // One delivery per two parent passes (every other odd/even boundary).
        assert!(deliveries >= 1);
        assert!(last_len >= 2, "expected at least DC + one more bin, got {}", last_len);
    }
}
