//! Cry Engine: the signal graph runtime.
//!
//! Owns the master bus, the shared noise texture and the registry of live
//! voices (at most one per monster id). Rendering is pull-based: the host
//! asks for frames and the frame count is the audio clock. Loop
//! rescheduling, finish detection and delayed restarts run off a wall-clock
//! timer queue that the host polls with [`CryEngine::tick`]; every firing
//! re-checks the registry before touching anything.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand_pcg::Pcg32;
use tracing::{debug, info, warn};

use super::decode::decode_audio;
use super::mixer::MasterBus;
use super::monitor::{MonitorSignal, MonitorTap};
use super::noise::NoiseTexture;
use super::sampler::SampleBuffer;
use super::scheduler::NOMINAL_BPM;
use super::timer::{TimerId, TimerQueue, TimerTask};
use super::voice::{Voice, VoiceInfo, VoiceSource};
use crate::clock::{SystemClock, WallClock};
use crate::config::EngineConfig;
use crate::params::SoundParams;
use crate::pattern::{Archetype, PatternSpec};
use crate::roster::{MonsterDirectory, MonsterRoster};

/// Frames rendered between housekeeping passes.
pub const BLOCK_SIZE: usize = 128;

/// A stop-then-restart waiting out the grace delay.
#[derive(Debug, Clone)]
struct PendingRestart {
    token: u64,
    source: VoiceSource,
    params: SoundParams,
}

pub struct CryEngine {
    config: EngineConfig,
    bus: MasterBus,
    noise: NoiseTexture,
    /// Registry of live voices. Ordered so mixing is deterministic.
    voices: BTreeMap<String, Voice>,
    /// Finished voices whose committed notes and echo tails are still sounding.
    draining: Vec<Voice>,
    timers: TimerQueue,
    pending_restarts: HashMap<String, PendingRestart>,
    clock: Box<dyn WallClock>,
    directory: Box<dyn MonsterDirectory>,
    rng: Pcg32,
    monitor: MonitorTap,
    frames_rendered: u64,
    next_generation: u64,
    next_token: u64,
    scheduled_notes: u64,
}

impl CryEngine {
    /// Engine on the system clock with the stock roster.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_parts(config, Box::new(SystemClock::new()), Box::new(MonsterRoster::default()))
    }

    pub fn with_parts(
        config: EngineConfig,
        clock: Box<dyn WallClock>,
        directory: Box<dyn MonsterDirectory>,
    ) -> Self {
        let sample_rate = if config.sample_rate.is_finite() && config.sample_rate > 0.0 {
            config.sample_rate
        } else {
            warn!(sample_rate = config.sample_rate, "invalid sample rate, using 44100");
            44100.0
        };
        let tempo_bpm = if config.tempo_bpm.is_finite() && config.tempo_bpm > 0.0 {
            config.tempo_bpm
        } else {
            warn!(tempo_bpm = config.tempo_bpm, "invalid tempo, using the nominal 120 BPM");
            NOMINAL_BPM
        };
        let config = EngineConfig {
            sample_rate,
            tempo_bpm,
            ..config
        };
        let mut rng = Pcg32::seed_from_u64(config.seed);
        let noise = NoiseTexture::new(sample_rate, &mut rng);
        info!(sample_rate, seed = config.seed, "cry engine created");
        CryEngine {
            bus: MasterBus::new(config.master_volume, config.volume_ramp_seconds, sample_rate),
            noise,
            voices: BTreeMap::new(),
            draining: Vec::new(),
            timers: TimerQueue::new(),
            pending_restarts: HashMap::new(),
            clock,
            directory,
            rng,
            monitor: MonitorTap::new(config.monitor_window),
            frames_rendered: 0,
            next_generation: 1,
            next_token: 1,
            scheduled_notes: 0,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.config.sample_rate
    }

    /// Replace the monster lookup, e.g. after a capture unlocked a monster.
    pub fn set_directory(&mut self, directory: Box<dyn MonsterDirectory>) {
        self.directory = directory;
    }

    /// Audio-clock time in seconds.
    pub fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / self.config.sample_rate
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    // ── Control surface ─────────────────────────────────────

    /// Play `id` the way the directory says it sounds: its recording when
    /// one exists, otherwise its archetype's pattern.
    pub fn play_voice(&mut self, id: &str, params: SoundParams) {
        let archetype = self.directory.archetype(id);
        match self.directory.recorded_audio(id) {
            Some(bytes) => self.play_recording(id, archetype, &bytes, params),
            None => self.play_pattern(id, archetype, params),
        }
    }

    pub fn play_pattern(&mut self, id: &str, archetype: Archetype, params: SoundParams) {
        self.play_spec(id, archetype.pattern().clone(), params);
    }

    /// Play a caller-supplied pattern. An empty pattern only stops what was
    /// playing under `id`.
    pub fn play_spec(&mut self, id: &str, spec: PatternSpec, params: SoundParams) {
        self.start_voice(id, VoiceSource::Synth(spec.sanitized()), params.clamped());
    }

    /// Play an encoded recording. Undecodable bytes fall back to the
    /// archetype's pattern.
    pub fn play_recording(&mut self, id: &str, archetype: Archetype, bytes: &[u8], params: SoundParams) {
        match decode_audio(bytes) {
            Ok(buffer) => self.play_buffer(id, Arc::new(buffer), params),
            Err(e) => {
                warn!(monster = id, error = %e, archetype = archetype.name(), "recording not playable, synthesizing instead");
                self.play_pattern(id, archetype, params);
            }
        }
    }

    /// Play an already decoded recording.
    pub fn play_buffer(&mut self, id: &str, buffer: Arc<SampleBuffer>, params: SoundParams) {
        self.start_voice(id, VoiceSource::Recording(buffer), params.clamped());
    }

    /// Stop `id` and release everything it owns, including a finished tail
    /// that is still draining. No-op when nothing plays under `id`.
    pub fn stop_voice(&mut self, id: &str) {
        self.pending_restarts.remove(id);
        self.draining.retain(|v| v.id != id);
        if let Some(mut voice) = self.voices.remove(id) {
            self.release_voice(&mut voice);
            debug!(monster = id, generation = voice.generation, "voice stopped");
        }
    }

    pub fn stop_all(&mut self) {
        self.pending_restarts.clear();
        self.draining.clear();
        let voices = std::mem::take(&mut self.voices);
        for (_, mut voice) in voices {
            self.release_voice(&mut voice);
        }
        debug!("all voices stopped");
    }

    pub fn is_any_playing(&self) -> bool {
        !self.voices.is_empty()
    }

    pub fn is_playing(&self, id: &str) -> bool {
        self.voices.contains_key(id)
    }

    /// Ramp the master gain to `volume` (clamped to 0..1).
    pub fn set_master_volume(&mut self, volume: f64) {
        self.bus.set_volume(volume);
    }

    pub fn master_volume(&self) -> f64 {
        self.bus.volume()
    }

    /// Apply new parameters to a playing voice.
    ///
    /// A change of filter cutoff alone is applied live. Anything else stops
    /// the voice and restarts it once the grace delay has passed; playing or
    /// stopping `id` in the meantime cancels the restart.
    pub fn update_params(&mut self, id: &str, params: SoundParams) {
        let params = params.clamped();
        if let Some(voice) = self.voices.get_mut(id) {
            if voice.params == params {
                return;
            }
            if voice.params.differs_only_in_cutoff(&params) {
                voice.set_filter_cutoff(params.filter_cutoff_hz);
                debug!(monster = id, cutoff = params.filter_cutoff_hz, "filter cutoff moved");
                return;
            }
            let source = voice.source().clone();
            self.stop_voice(id);
            let token = self.next_token;
            self.next_token += 1;
            self.pending_restarts
                .insert(id.to_string(), PendingRestart { token, source, params });
            let due = self.clock.now() + Duration::from_millis(self.config.restart_grace_ms);
            self.timers.arm_once(due, TimerTask::Restart { id: id.to_string(), token });
            debug!(monster = id, "voice restarting with new parameters");
        } else if let Some(pending) = self.pending_restarts.get_mut(id) {
            pending.params = params;
        }
    }

    /// Run every timer that is due on the wall clock.
    pub fn tick(&mut self) {
        let now = self.clock.now();
        for (timer, task) in self.timers.poll(now) {
            self.run_timer(timer, task);
        }
    }

    // ── Observation ─────────────────────────────────────────

    /// Recent output of one voice, or of the whole bus when `id` is `None`.
    /// Flatline when nothing is playing there.
    pub fn current_monitor_signal(&self, id: Option<&str>) -> MonitorSignal {
        let window = self.monitor.window();
        match id {
            Some(id) => self
                .voices
                .get(id)
                .map_or_else(|| MonitorSignal::silence(window), |v| v.monitor().snapshot()),
            None if self.is_any_playing() => self.monitor.snapshot(),
            None => MonitorSignal::silence(window),
        }
    }

    pub fn voice_info(&self, id: &str) -> Option<VoiceInfo> {
        self.voices.get(id).map(Voice::info)
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Voices currently holding the noise texture.
    pub fn noise_refcount(&self) -> usize {
        self.noise.leases()
    }

    /// Total note events committed since the engine started.
    pub fn scheduled_note_count(&self) -> u64 {
        self.scheduled_notes
    }

    // ── Rendering ───────────────────────────────────────────

    /// Fill `out` with interleaved stereo frames, advancing the audio clock.
    pub fn render(&mut self, out: &mut [f32]) {
        for block in out.chunks_mut(BLOCK_SIZE * 2) {
            for frame in block.chunks_exact_mut(2) {
                let (l, r) = self.render_frame();
                frame[0] = l as f32;
                frame[1] = r as f32;
            }
            self.housekeep();
        }
    }

    /// Render `frames` frames into a new buffer.
    pub fn render_frames(&mut self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0_f32; frames * 2];
        self.render(&mut out);
        out
    }

    #[inline]
    fn render_frame(&mut self) -> (f64, f64) {
        let frame = self.frames_rendered;
        let (mut l, mut r) = (0.0, 0.0);
        for voice in self.voices.values_mut().chain(self.draining.iter_mut()) {
            let (vl, vr) = voice.render_frame(frame);
            l += vl;
            r += vr;
        }
        let n = self.noise.next_sample();
        let (l, r) = self.bus.process(l + n, r + n);
        self.monitor.push((l + r) * 0.5);
        self.frames_rendered += 1;
        (l, r)
    }

    fn housekeep(&mut self) {
        let frame = self.frames_rendered;
        for voice in self.voices.values_mut() {
            voice.prune(frame);
        }
        self.draining.retain_mut(|v| {
            v.prune(frame);
            !v.is_silent(frame)
        });
    }

    // ── Internals ───────────────────────────────────────────

    fn start_voice(&mut self, id: &str, source: VoiceSource, params: SoundParams) {
        self.stop_voice(id);
        if let VoiceSource::Synth(spec) = &source {
            if spec.is_empty() {
                debug!(monster = id, "empty pattern, nothing to play");
                return;
            }
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        let sr = self.config.sample_rate;
        let window = self.config.monitor_window;
        let mut voice = match source {
            VoiceSource::Synth(spec) => Voice::synth(id, generation, spec, params, sr, window),
            VoiceSource::Recording(buffer) => Voice::recording(id, generation, buffer, params, sr, window),
        };
        if voice.holds_noise() {
            self.noise.acquire();
        }

        let bpm = self.config.tempo_bpm;
        let notes = voice.schedule_cycle(self.current_time(), bpm, &mut self.rng);
        self.scheduled_notes += notes.len() as u64;

        let cycle = voice.cycle_duration(bpm);
        let due = self.clock.now() + Duration::from_secs_f64(cycle.max(0.0));
        match (voice.source(), voice.params.looping) {
            (VoiceSource::Synth(_), true) => {
                self.timers.arm_repeating(
                    due,
                    Duration::from_secs_f64(cycle.max(0.0)),
                    TimerTask::LoopCycle { id: id.to_string(), generation },
                );
            }
            // A looping recording repeats on its own.
            (VoiceSource::Recording(_), true) => {}
            (_, false) => {
                self.timers
                    .arm_once(due, TimerTask::Finish { id: id.to_string(), generation });
            }
        }

        debug!(
            monster = id,
            generation,
            looping = voice.params.looping,
            cycle_seconds = cycle,
            "voice started"
        );
        self.voices.insert(id.to_string(), voice);
    }

    fn release_voice(&mut self, voice: &mut Voice) {
        if voice.take_noise_lease() {
            self.noise.release();
        }
        voice.stop();
    }

    fn live_voice(&mut self, id: &str, generation: u64) -> Option<&mut Voice> {
        self.voices.get_mut(id).filter(|v| v.generation == generation)
    }

    fn run_timer(&mut self, timer: TimerId, task: TimerTask) {
        match task {
            TimerTask::LoopCycle { id, generation } => {
                let start = self.current_time();
                let bpm = self.config.tempo_bpm;
                let Some(voice) = self.voices.get_mut(&id).filter(|v| v.generation == generation) else {
                    self.timers.cancel(timer);
                    debug!(monster = %id, generation, "loop timer outlived its voice, cancelled");
                    return;
                };
                let notes = voice.schedule_cycle(start, bpm, &mut self.rng);
                self.scheduled_notes += notes.len() as u64;
                debug!(monster = %id, generation, start, "loop cycle scheduled");
            }
            TimerTask::Finish { id, generation } => {
                if self.live_voice(&id, generation).is_none() {
                    return;
                }
                if let Some(mut voice) = self.voices.remove(&id) {
                    if voice.take_noise_lease() {
                        self.noise.release();
                    }
                    debug!(monster = %id, generation, "voice finished");
                    self.draining.push(voice);
                }
            }
            TimerTask::Restart { id, token } => {
                let Some(pending) = self.pending_restarts.get(&id) else {
                    return;
                };
                if pending.token != token {
                    return;
                }
                if let Some(pending) = self.pending_restarts.remove(&id) {
                    self.start_voice(&id, pending.source, pending.params);
                }
            }
        }
    }
}
