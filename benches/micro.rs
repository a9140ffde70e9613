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

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use iqcore::fft::FftPlan;
use iqcore::specttuner::{ChannelParams, Domain, SpectralTuner};
use iqcore::types::{Complex, Float, TWO_PI};

fn tone(n: usize, fnor: Float) -> Vec<Complex> {
    let omega = fnor * std::f64::consts::PI as Float;
    (0..n)
        .map(|i| {
            let phi = omega * i as Float;
            Complex::new(phi.cos(), phi.sin())
        })
        .collect()
}

fn bench_fft(c: &mut Criterion) {
    let n = 4096;
    let mut plan = FftPlan::new(n);
    let input = tone(n, 0.1);
    let mut output = vec![Complex::new(0.0, 0.0); n];
    c.bench_function("fft_forward_4096", |b| {
        b.iter(|| plan.forward(black_box(&input), &mut output));
    });
}

fn bench_specttuner(c: &mut Criterion) {
    let p = 1024;
    let input = tone(p * 64, 0.2);
    c.bench_function("specttuner_one_channel", |b| {
        b.iter(|| {
            let mut tuner = SpectralTuner::new(p, false).unwrap();
            tuner
                .open_channel(ChannelParams {
                    f0: TWO_PI * 0.2,
                    delta_f: 0.0,
                    bw: TWO_PI * 0.05,
                    guard: 2.0,
                    precise: true,
                    domain: Domain::Time,
                })
                .unwrap();
            tuner.feed_bulk(black_box(&input), |_, _| true).unwrap();
        });
    });
}

criterion_group!(benches, bench_fft, bench_specttuner);
criterion_main!(benches);
