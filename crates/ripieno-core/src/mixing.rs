//! Up/down-mix rules between buses of different widths.
//!
//! Speaker layouts: 1 = M, 2 = L R, 4 = L R SL SR, 6 = L R C LFE SL SR.
//! Pairs without a speaker matrix fall back to discrete mixing.

use core::f32::consts::FRAC_1_SQRT_2 as H;

use crate::bus::AudioBus;
use crate::channel::ChannelInterpretation;

type Matrix = &'static [&'static [(usize, f32)]];

// One row per destination channel: (source channel, gain).
const MONO_TO_STEREO: Matrix = &[&[(0, 1.0)], &[(0, 1.0)]];
const MONO_TO_QUAD: Matrix = &[&[(0, 1.0)], &[(0, 1.0)], &[], &[]];
const MONO_TO_51: Matrix = &[&[], &[], &[(0, 1.0)], &[], &[], &[]];
const STEREO_TO_MONO: Matrix = &[&[(0, 0.5), (1, 0.5)]];
const STEREO_TO_QUAD: Matrix = &[&[(0, 1.0)], &[(1, 1.0)], &[], &[]];
const STEREO_TO_51: Matrix = &[&[(0, 1.0)], &[(1, 1.0)], &[], &[], &[], &[]];
const QUAD_TO_MONO: Matrix = &[&[(0, 0.25), (1, 0.25), (2, 0.25), (3, 0.25)]];
const QUAD_TO_STEREO: Matrix = &[&[(0, 0.5), (2, 0.5)], &[(1, 0.5), (3, 0.5)]];
const QUAD_TO_51: Matrix = &[&[(0, 1.0)], &[(1, 1.0)], &[], &[], &[(2, 1.0)], &[(3, 1.0)]];
const SURROUND_TO_MONO: Matrix = &[&[(0, H), (1, H), (2, 1.0), (4, 0.5), (5, 0.5)]];
const SURROUND_TO_STEREO: Matrix = &[&[(0, 1.0), (2, H), (4, H)], &[(1, 1.0), (2, H), (5, H)]];
const SURROUND_TO_QUAD: Matrix = &[&[(0, 1.0), (2, H)], &[(1, 1.0), (2, H)], &[(4, 1.0)], &[(5, 1.0)]];

fn speaker_matrix(from: usize, to: usize) -> Option<Matrix> {
    Some(match (from, to) {
        (1, 2) => MONO_TO_STEREO,
        (1, 4) => MONO_TO_QUAD,
        (1, 6) => MONO_TO_51,
        (2, 1) => STEREO_TO_MONO,
        (2, 4) => STEREO_TO_QUAD,
        (2, 6) => STEREO_TO_51,
        (4, 1) => QUAD_TO_MONO,
        (4, 2) => QUAD_TO_STEREO,
        (4, 6) => QUAD_TO_51,
        (6, 1) => SURROUND_TO_MONO,
        (6, 2) => SURROUND_TO_STEREO,
        (6, 4) => SURROUND_TO_QUAD,
        _ => return None,
    })
}

#[inline]
fn accumulate(dst: &mut [f32], src: &[f32], gain: f32) {
    if gain == 1.0 {
        for (d, s) in dst.iter_mut().zip(src) {
            *d += *s;
        }
    } else {
        for (d, s) in dst.iter_mut().zip(src) {
            *d += *s * gain;
        }
    }
}

/// Adds `src` into `dst` using `interpretation`. Neither silent flag is
/// touched; callers own that bookkeeping.
pub(crate) fn sum_into(src: &AudioBus, dst: &mut AudioBus, interpretation: ChannelInterpretation) {
    let from = src.number_of_channels();
    let to = dst.number_of_channels();

    let matrix = match interpretation {
        ChannelInterpretation::Speakers if from != to => speaker_matrix(from, to),
        _ => None,
    };

    match matrix {
        Some(rows) => {
            for (out_ch, row) in rows.iter().enumerate() {
                for &(in_ch, gain) in row.iter() {
                    accumulate(dst.channel_mut(out_ch), src.channel(in_ch), gain);
                }
            }
        }
        None => {
            for ch in 0..from.min(to) {
                accumulate(dst.channel_mut(ch), src.channel(ch), 1.0);
            }
        }
    }
}
