//! Voice: the live signal subtree of one playing monster.
//!
//! A voice owns everything between its sources and the master bus: the
//! harmonic partials of every scheduled note (or a sample player), the
//! optional echo send, the low-pass filter and the output gain. Nothing here
//! is shared with other voices.

use std::sync::Arc;

use rand::Rng;
use rand_pcg::Pcg32;

use super::delay::Echo;
use super::envelope::NoteEnvelope;
use super::filter::LowpassFilter;
use super::mixer::equal_power_pan;
use super::monitor::MonitorTap;
use super::oscillator::{Oscillator, Waveform};
use super::sampler::{SampleBuffer, SamplePlayer};
use super::scheduler::{realize_cycle, NoteEvent};
use crate::params::SoundParams;
use crate::pattern::{semitone_ratio, PatternSpec};

/// Largest pitch wobble, in cents either way.
pub const WOBBLE_CENTS: f64 = 10.0;
/// Gain of the output stage for recorded samples.
pub const SAMPLE_OUTPUT_GAIN: f64 = 0.8;
/// Below this a draining voice counts as silent.
const SILENCE_THRESHOLD: f64 = 1e-6;

/// One harmonic of one note: oscillator → envelope → panner.
#[derive(Debug, Clone)]
struct Partial {
    oscillator: Oscillator,
    envelope: NoteEnvelope,
    gain_l: f64,
    gain_r: f64,
    start_frame: u64,
    end_frame: u64,
    /// Detune reached at the end of the note, in cents.
    wobble: f64,
}

impl Partial {
    #[inline]
    fn render(&mut self, frame: u64) -> (f64, f64) {
        if frame < self.start_frame || frame >= self.end_frame {
            return (0.0, 0.0);
        }
        if self.wobble != 0.0 {
            let t = (frame - self.start_frame) as f64 / (self.end_frame - self.start_frame) as f64;
            self.oscillator.detune = self.wobble * t;
        }
        let s = self.oscillator.next_sample() * self.envelope.next_sample();
        (s * self.gain_l, s * self.gain_r)
    }

    fn is_done(&self, frame: u64) -> bool {
        frame >= self.end_frame
    }
}

/// What feeds a voice.
#[derive(Debug, Clone)]
pub enum VoiceSource {
    Synth(PatternSpec),
    Recording(Arc<SampleBuffer>),
}

/// Kind of source, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceKind {
    Synth,
    Recording,
}

/// Observable state of a voice.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceInfo {
    pub generation: u64,
    pub source: VoiceKind,
    pub looping: bool,
    pub cycles_scheduled: u64,
    /// Audio-clock start of the most recent cycle, in seconds.
    pub last_cycle_start: f64,
    pub filter_cutoff_hz: f64,
}

#[derive(Debug, Clone)]
pub struct Voice {
    pub id: String,
    pub generation: u64,
    pub params: SoundParams,
    source: VoiceSource,
    partials: Vec<Partial>,
    player: Option<SamplePlayer>,
    echo: Option<Echo>,
    filter_l: LowpassFilter,
    filter_r: LowpassFilter,
    output_gain: f64,
    monitor: MonitorTap,
    holds_noise: bool,
    cycles_scheduled: u64,
    last_cycle_start: f64,
    stopped: bool,
    sample_rate: f64,
}

impl Voice {
    fn build(
        id: &str,
        generation: u64,
        params: SoundParams,
        source: VoiceSource,
        sample_rate: f64,
        monitor_window: usize,
    ) -> Self {
        let cutoff = f64::from(params.filter_cutoff_hz);
        let output_gain = match source {
            VoiceSource::Synth(_) => 1.0,
            VoiceSource::Recording(_) => SAMPLE_OUTPUT_GAIN,
        };
        Voice {
            id: id.to_string(),
            generation,
            echo: Echo::from_amount(params.echo(), sample_rate),
            holds_noise: params.has_noise_texture,
            params,
            source,
            partials: Vec::new(),
            player: None,
            filter_l: LowpassFilter::new(cutoff, sample_rate),
            filter_r: LowpassFilter::new(cutoff, sample_rate),
            output_gain,
            monitor: MonitorTap::new(monitor_window),
            cycles_scheduled: 0,
            last_cycle_start: 0.0,
            stopped: false,
            sample_rate,
        }
    }

    /// A synthesized voice with no notes scheduled yet.
    pub fn synth(
        id: &str,
        generation: u64,
        spec: PatternSpec,
        params: SoundParams,
        sample_rate: f64,
        monitor_window: usize,
    ) -> Self {
        Self::build(id, generation, params, VoiceSource::Synth(spec), sample_rate, monitor_window)
    }

    /// A voice playing a decoded recording from the start.
    pub fn recording(
        id: &str,
        generation: u64,
        buffer: Arc<SampleBuffer>,
        params: SoundParams,
        sample_rate: f64,
        monitor_window: usize,
    ) -> Self {
        let rate = params.speed_multiplier * semitone_ratio(params.pitch_shift_semitones);
        let player = SamplePlayer::new(buffer.clone(), rate, params.looping, sample_rate);
        let mut voice = Self::build(
            id,
            generation,
            params,
            VoiceSource::Recording(buffer),
            sample_rate,
            monitor_window,
        );
        voice.player = Some(player);
        voice
    }

    pub fn source(&self) -> &VoiceSource {
        &self.source
    }

    pub fn kind(&self) -> VoiceKind {
        match self.source {
            VoiceSource::Synth(_) => VoiceKind::Synth,
            VoiceSource::Recording(_) => VoiceKind::Recording,
        }
    }

    /// Seconds of one synth cycle or one pass of the recording.
    pub fn cycle_duration(&self, bpm: f64) -> f64 {
        match (&self.source, &self.player) {
            (VoiceSource::Synth(spec), _) => {
                super::scheduler::cycle_duration(spec.len(), bpm, self.params.speed_multiplier)
            }
            (VoiceSource::Recording(_), Some(player)) => player.pass_duration(self.sample_rate),
            (VoiceSource::Recording(_), None) => 0.0,
        }
    }

    /// Schedule one full pattern cycle starting at `start_time` on the audio
    /// clock. Returns the notes committed. Recording voices schedule nothing.
    pub fn schedule_cycle(&mut self, start_time: f64, bpm: f64, rng: &mut Pcg32) -> Vec<NoteEvent> {
        let VoiceSource::Synth(spec) = &self.source else {
            return Vec::new();
        };
        if self.stopped {
            return Vec::new();
        }
        let notes = realize_cycle(spec, &self.params, bpm, start_time);
        let waveform = self.params.waveform.unwrap_or(spec.waveform);
        let harmonics = spec.harmonic_amplitudes.len();

        for note in &notes {
            let start_frame = (note.start_time * self.sample_rate).round() as u64;
            let len = (note.duration * self.sample_rate).round() as u64;
            for (i, &amplitude) in spec.harmonic_amplitudes.iter().enumerate() {
                let shape = if i == 0 { waveform } else { Waveform::Sine };
                let (gain_l, gain_r) = equal_power_pan((i as f64 - harmonics as f64 / 2.0) * 0.1);
                let wobble = if self.params.has_noise_texture {
                    rng.random_range(-WOBBLE_CENTS..=WOBBLE_CENTS)
                } else {
                    0.0
                };
                self.partials.push(Partial {
                    oscillator: Oscillator::new(shape, note.frequency * (i + 1) as f64, self.sample_rate),
                    envelope: NoteEnvelope::new(amplitude, note.duration, self.sample_rate),
                    gain_l,
                    gain_r,
                    start_frame,
                    end_frame: start_frame + len,
                    wobble,
                });
            }
        }

        self.cycles_scheduled += 1;
        self.last_cycle_start = start_time;
        notes
    }

    /// Render one stereo frame at absolute frame index `frame`.
    #[inline]
    pub fn render_frame(&mut self, frame: u64) -> (f64, f64) {
        let (mut l, mut r) = (0.0, 0.0);
        for p in self.partials.iter_mut() {
            let (pl, pr) = p.render(frame);
            l += pl;
            r += pr;
        }
        if let Some(player) = self.player.as_mut() {
            let s = player.next_sample();
            l += s;
            r += s;
        }
        if let Some(echo) = self.echo.as_mut() {
            let (wl, wr) = echo.process(l, r);
            l += wl;
            r += wr;
        }
        let l = self.filter_l.process(l) * self.output_gain;
        let r = self.filter_r.process(r) * self.output_gain;
        self.monitor.push((l + r) * 0.5);
        (l, r)
    }

    /// Drop partials that have played out.
    pub fn prune(&mut self, frame: u64) {
        self.partials.retain(|p| !p.is_done(frame));
    }

    /// Move the filter cutoff without rebuilding the voice.
    pub fn set_filter_cutoff(&mut self, cutoff_hz: u32) {
        self.params.filter_cutoff_hz = cutoff_hz;
        self.filter_l.set_cutoff(f64::from(cutoff_hz));
        self.filter_r.set_cutoff(f64::from(cutoff_hz));
    }

    /// Stop and release every owned node. Safe to call any number of times.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.partials.clear();
        if let Some(player) = self.player.as_mut() {
            player.stop();
        }
        self.echo = None;
        self.filter_l.reset();
        self.filter_r.reset();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Whether this voice wants the shared noise texture.
    pub fn holds_noise(&self) -> bool {
        self.holds_noise
    }

    /// Give up the noise lease; returns whether one was held.
    pub fn take_noise_lease(&mut self) -> bool {
        std::mem::replace(&mut self.holds_noise, false)
    }

    /// True once no note, sample or echo can make sound any more.
    pub fn is_silent(&self, frame: u64) -> bool {
        self.partials.iter().all(|p| p.is_done(frame))
            && self.player.as_ref().is_none_or(|p| p.is_finished())
            && self.echo.as_ref().is_none_or(|e| e.residual() < SILENCE_THRESHOLD)
    }

    pub fn monitor(&self) -> &MonitorTap {
        &self.monitor
    }

    pub fn info(&self) -> VoiceInfo {
        VoiceInfo {
            generation: self.generation,
            source: self.kind(),
            looping: self.params.looping,
            cycles_scheduled: self.cycles_scheduled,
            last_cycle_start: self.last_cycle_start,
            filter_cutoff_hz: self.filter_l.cutoff(),
        }
    }
}
