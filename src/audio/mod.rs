use anyhow::{Context, Result, bail};
use rodio::Source;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
#[cfg(unix)]
use std::ffi::CString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const MAX_VOLUME: f32 = 2.0;
const TIME_UPDATE_INTERVAL: Duration = Duration::from_millis(250);

/// Notifications reported by an output, in the order they happened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaEvent {
    Play,
    Pause,
    Ended,
    LoadedMetadata,
    TimeUpdate(Duration),
}

/// A single playable source with play/pause/seek/loop controls.
///
/// `play` and `pause` only report an event when the paused state actually
/// flips. While looping, a finished source restarts and `Ended` is never
/// reported.
pub trait AudioOutput {
    fn load(&mut self, uri: &str, duration_hint: Option<Duration>) -> Result<()>;
    fn unload(&mut self);
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn is_paused(&self) -> bool;
    fn has_source(&self) -> bool;
    fn position(&self) -> Option<Duration>;
    fn set_position(&mut self, position: Duration) -> Result<()>;
    fn is_looping(&self) -> bool;
    fn set_looping(&mut self, looping: bool);
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    fn tick(&mut self);
    fn drain_events(&mut self) -> Vec<MediaEvent>;
    fn output_name(&self) -> Option<String>;
}

/// Maps an episode URI to a local file. Remote sources are not fetched.
pub fn local_source_path(uri: &str) -> Result<PathBuf> {
    if let Some(rest) = uri.strip_prefix("file://") {
        return Ok(PathBuf::from(rest));
    }
    if let Some((scheme, _)) = uri.split_once("://") {
        bail!("unsupported audio source scheme {scheme}: only local files can be played");
    }
    Ok(PathBuf::from(uri))
}

/// Emits `TimeUpdate` at most every [`TIME_UPDATE_INTERVAL`].
#[derive(Debug, Default)]
struct TimeUpdateClock {
    last: Option<Instant>,
}

impl TimeUpdateClock {
    fn due(&mut self) -> bool {
        match self.last {
            Some(last) if last.elapsed() < TIME_UPDATE_INTERVAL => false,
            _ => {
                self.last = Some(Instant::now());
                true
            }
        }
    }

    fn reset(&mut self) {
        self.last = None;
    }
}

pub struct RodioAudioOutput {
    stream: OutputStream,
    sink: Sink,
    current: Option<PathBuf>,
    track_duration: Option<Duration>,
    ended: bool,
    looping: bool,
    volume: f32,
    events: Vec<MediaEvent>,
    clock: TimeUpdateClock,
}

impl RodioAudioOutput {
    pub fn new() -> Result<Self> {
        let stream = Self::open_output_stream()?;
        let sink = Sink::connect_new(stream.mixer());
        sink.pause();

        Ok(Self {
            stream,
            sink,
            current: None,
            track_duration: None,
            ended: false,
            looping: false,
            volume: 1.0,
            events: Vec::new(),
            clock: TimeUpdateClock::default(),
        })
    }

    fn open_output_stream() -> Result<OutputStream> {
        let mut stream = with_silenced_stderr(|| {
            match OutputStreamBuilder::from_default_device()
                .context("failed to open default system output stream")
                .and_then(|builder| {
                    builder
                        .with_error_callback(|_| {})
                        .open_stream_or_fallback()
                        .context("failed to start default output stream")
                }) {
                Ok(stream) => Ok(stream),
                Err(default_err) => {
                    let host = rodio::cpal::default_host();
                    let mut candidates: Vec<String> = host
                        .output_devices()
                        .ok()
                        .into_iter()
                        .flatten()
                        .filter_map(|device| device.name().ok())
                        .collect();
                    candidates.sort_by_cached_key(|name| {
                        let lower = name.to_ascii_lowercase();
                        let rank = if lower.contains("pulse") {
                            0_u8
                        } else if lower.contains("pipewire") {
                            1_u8
                        } else {
                            2_u8
                        };
                        (rank, lower)
                    });
                    candidates.dedup();

                    for candidate in candidates {
                        let Some(device) = host
                            .output_devices()
                            .ok()
                            .into_iter()
                            .flatten()
                            .find(|entry| entry.name().ok().as_deref() == Some(candidate.as_str()))
                        else {
                            continue;
                        };
                        let opened = OutputStreamBuilder::from_device(device)
                            .context("failed to open fallback output device")
                            .and_then(|builder| {
                                builder
                                    .with_error_callback(|_| {})
                                    .open_stream_or_fallback()
                                    .context("failed to start fallback output stream")
                            });
                        if let Ok(stream) = opened {
                            tracing::info!(device = %candidate, "using fallback output device");
                            return Ok(stream);
                        }
                    }

                    Err(default_err.context("unable to start any audio output stream"))
                }
            }
        })?;
        stream.log_on_drop(false);
        Ok(stream)
    }

    fn append_source(&mut self, path: &Path) -> Result<Option<Duration>> {
        let file =
            File::open(path).with_context(|| format!("failed to open episode {}", path.display()))?;
        let source = Decoder::try_from(file)
            .with_context(|| format!("failed to decode {}", path.display()))?;
        let duration = source.total_duration();
        self.sink.append(source);
        Ok(duration)
    }

    fn restart_source(&mut self) -> Result<()> {
        let Some(path) = self.current.clone() else {
            bail!("no active episode");
        };
        self.append_source(&path)?;
        self.ended = false;
        Ok(())
    }
}

impl AudioOutput for RodioAudioOutput {
    fn load(&mut self, uri: &str, duration_hint: Option<Duration>) -> Result<()> {
        self.unload();
        let path = local_source_path(uri)?;

        self.sink = Sink::connect_new(self.stream.mixer());
        self.sink.pause();
        let decoded_duration = self.append_source(&path)?;
        self.sink.set_volume(self.volume);

        self.track_duration = decoded_duration.or(duration_hint);
        self.current = Some(path);
        self.events.push(MediaEvent::LoadedMetadata);
        Ok(())
    }

    fn unload(&mut self) {
        // Events still queued belong to the source being dropped.
        self.events.clear();
        self.sink.stop();
        self.current = None;
        self.track_duration = None;
        self.ended = false;
        self.clock.reset();
    }

    fn play(&mut self) -> Result<()> {
        if self.current.is_none() {
            bail!("no active episode");
        }
        if self.ended {
            self.restart_source()?;
        }
        if self.sink.is_paused() {
            self.sink.play();
            self.events.push(MediaEvent::Play);
        }
        Ok(())
    }

    fn pause(&mut self) {
        if self.current.is_some() && !self.sink.is_paused() {
            self.sink.pause();
            self.events.push(MediaEvent::Pause);
        }
    }

    fn is_paused(&self) -> bool {
        self.sink.is_paused()
    }

    fn has_source(&self) -> bool {
        self.current.is_some()
    }

    fn position(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.sink.get_pos())
    }

    fn set_position(&mut self, position: Duration) -> Result<()> {
        if self.current.is_none() {
            bail!("no active episode");
        }
        if self.sink.empty() {
            self.restart_source()?;
        }
        let position = self
            .track_duration
            .map_or(position, |duration| position.min(duration));
        self.sink
            .try_seek(position)
            .map_err(|err| anyhow::anyhow!("failed to seek current episode: {err:?}"))?;
        Ok(())
    }

    fn is_looping(&self) -> bool {
        self.looping
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, MAX_VOLUME);
        self.sink.set_volume(self.volume);
    }

    fn tick(&mut self) {
        if self.current.is_none() || self.ended || self.sink.is_paused() {
            return;
        }

        if self.sink.empty() {
            if self.looping {
                if let Err(err) = self.restart_source() {
                    tracing::warn!("failed to restart looping episode: {err:#}");
                }
                return;
            }
            self.ended = true;
            self.sink.pause();
            self.events.push(MediaEvent::Pause);
            self.events.push(MediaEvent::Ended);
            return;
        }

        if self.clock.due() {
            self.events.push(MediaEvent::TimeUpdate(self.sink.get_pos()));
        }
    }

    fn drain_events(&mut self) -> Vec<MediaEvent> {
        std::mem::take(&mut self.events)
    }

    fn output_name(&self) -> Option<String> {
        Some(String::from("System default output"))
    }
}

#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}

/// Output without a device: the playhead follows the wall clock and the
/// episode's advertised duration decides when it ends.
pub struct NullAudioOutput {
    paused: bool,
    current: Option<String>,
    ended: bool,
    looping: bool,
    volume: f32,
    started_at: Option<Instant>,
    position_offset: Duration,
    track_duration: Option<Duration>,
    events: Vec<MediaEvent>,
    clock: TimeUpdateClock,
}

impl NullAudioOutput {
    pub fn new() -> Self {
        Self {
            paused: true,
            current: None,
            ended: false,
            looping: false,
            volume: 1.0,
            started_at: None,
            position_offset: Duration::ZERO,
            track_duration: None,
            events: Vec::new(),
            clock: TimeUpdateClock::default(),
        }
    }

    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if !self.paused
            && self.current.is_some()
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        if let Some(duration) = self.track_duration {
            return position.min(duration);
        }
        position
    }

    fn reached_end(&self) -> bool {
        self.track_duration
            .is_some_and(|duration| self.current_position() >= duration)
    }
}

impl Default for NullAudioOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for NullAudioOutput {
    fn load(&mut self, uri: &str, duration_hint: Option<Duration>) -> Result<()> {
        self.unload();
        self.current = Some(uri.to_string());
        self.track_duration = duration_hint.filter(|duration| !duration.is_zero());
        self.events.push(MediaEvent::LoadedMetadata);
        Ok(())
    }

    fn unload(&mut self) {
        self.events.clear();
        self.current = None;
        self.paused = true;
        self.ended = false;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.track_duration = None;
        self.clock.reset();
    }

    fn play(&mut self) -> Result<()> {
        if self.current.is_none() {
            bail!("no active episode");
        }
        if self.ended {
            self.ended = false;
            self.position_offset = Duration::ZERO;
        }
        if self.paused {
            self.paused = false;
            self.started_at = Some(Instant::now());
            self.events.push(MediaEvent::Play);
        }
        Ok(())
    }

    fn pause(&mut self) {
        if self.current.is_none() || self.paused {
            return;
        }
        self.position_offset = self.current_position();
        self.started_at = None;
        self.paused = true;
        self.events.push(MediaEvent::Pause);
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn has_source(&self) -> bool {
        self.current.is_some()
    }

    fn position(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.current_position())
    }

    fn set_position(&mut self, position: Duration) -> Result<()> {
        if self.current.is_none() {
            bail!("no active episode");
        }

        self.position_offset = self
            .track_duration
            .map_or(position, |duration| position.min(duration));
        self.started_at = if self.paused {
            None
        } else {
            Some(Instant::now())
        };
        self.ended = false;
        Ok(())
    }

    fn is_looping(&self) -> bool {
        self.looping
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, MAX_VOLUME);
    }

    fn tick(&mut self) {
        if self.current.is_none() || self.paused || self.ended {
            return;
        }

        if self.reached_end() {
            if self.looping {
                self.position_offset = Duration::ZERO;
                self.started_at = Some(Instant::now());
                return;
            }
            self.position_offset = self.current_position();
            self.started_at = None;
            self.paused = true;
            self.ended = true;
            self.events.push(MediaEvent::Pause);
            self.events.push(MediaEvent::Ended);
            return;
        }

        if self.clock.due() {
            self.events
                .push(MediaEvent::TimeUpdate(self.current_position()));
        }
    }

    fn drain_events(&mut self) -> Vec<MediaEvent> {
        std::mem::take(&mut self.events)
    }

    fn output_name(&self) -> Option<String> {
        Some(String::from("Null audio output"))
    }
}

#[cfg(test)]
mod tests {
    use super::{AudioOutput, MediaEvent, NullAudioOutput, local_source_path};
    use std::path::PathBuf;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn local_source_path_accepts_paths_and_file_uris() {
        assert_eq!(
            local_source_path("episodes/a.mp3").expect("plain path"),
            PathBuf::from("episodes/a.mp3")
        );
        assert_eq!(
            local_source_path("file:///tmp/a.mp3").expect("file uri"),
            PathBuf::from("/tmp/a.mp3")
        );
        let err = local_source_path("https://cdn.example/a.mp3").expect_err("remote");
        assert!(err.to_string().contains("https"));
    }

    #[test]
    fn null_output_reports_transitions_once() {
        let mut output = NullAudioOutput::new();
        output.load("a.mp3", Some(Duration::from_secs(60))).expect("load");
        output.play().expect("play");
        output.play().expect("second play");
        output.pause();
        output.pause();

        assert_eq!(
            output.drain_events(),
            vec![
                MediaEvent::LoadedMetadata,
                MediaEvent::Play,
                MediaEvent::Pause
            ]
        );
        assert!(output.drain_events().is_empty());
    }

    #[test]
    fn null_output_play_without_source_fails() {
        let mut output = NullAudioOutput::new();
        assert!(output.play().is_err());
        assert!(output.set_position(Duration::from_secs(1)).is_err());
    }

    #[test]
    fn null_output_position_freezes_while_paused() {
        let mut output = NullAudioOutput::new();
        output.load("a.mp3", None).expect("load");
        output.play().expect("play");
        thread::sleep(Duration::from_millis(20));

        output.pause();
        let paused = output.position().expect("position");
        thread::sleep(Duration::from_millis(20));
        assert_eq!(output.position(), Some(paused));

        output.play().expect("resume");
        thread::sleep(Duration::from_millis(20));
        assert!(output.position().expect("position") > paused);
    }

    #[test]
    fn null_output_seek_is_bounded_by_duration() {
        let mut output = NullAudioOutput::new();
        output.load("a.mp3", Some(Duration::from_secs(200))).expect("load");

        output.set_position(Duration::from_secs(45)).expect("seek");
        assert_eq!(output.position(), Some(Duration::from_secs(45)));

        output.set_position(Duration::from_secs(900)).expect("seek");
        assert_eq!(output.position(), Some(Duration::from_secs(200)));
    }

    #[test]
    fn null_output_ends_with_pause_then_ended() {
        let mut output = NullAudioOutput::new();
        output.load("a.mp3", Some(Duration::from_secs(10))).expect("load");
        output.play().expect("play");
        output.set_position(Duration::from_secs(10)).expect("seek");
        output.drain_events();

        output.tick();
        assert_eq!(
            output.drain_events(),
            vec![MediaEvent::Pause, MediaEvent::Ended]
        );
        assert!(output.is_paused());

        output.tick();
        assert!(output.drain_events().is_empty());
    }

    #[test]
    fn loading_a_new_source_drops_events_of_the_old_one() {
        let mut output = NullAudioOutput::new();
        output.load("a.mp3", Some(Duration::from_secs(10))).expect("load");
        output.play().expect("play");
        output.set_position(Duration::from_secs(10)).expect("seek");
        output.tick();

        output.load("b.mp3", Some(Duration::from_secs(10))).expect("load");
        output.play().expect("play");
        assert_eq!(
            output.drain_events(),
            vec![MediaEvent::LoadedMetadata, MediaEvent::Play]
        );
    }

    #[test]
    fn null_output_loops_without_ending() {
        let mut output = NullAudioOutput::new();
        output.load("a.mp3", Some(Duration::from_secs(10))).expect("load");
        output.set_looping(true);
        output.play().expect("play");
        output.set_position(Duration::from_secs(10)).expect("seek");
        output.drain_events();

        output.tick();
        assert!(!output.drain_events().contains(&MediaEvent::Ended));
        assert!(!output.is_paused());
        assert!(output.position().expect("position") < Duration::from_secs(10));
    }

    #[test]
    fn null_output_unknown_duration_never_ends() {
        let mut output = NullAudioOutput::new();
        output.load("a.mp3", Some(Duration::ZERO)).expect("load");
        output.play().expect("play");
        thread::sleep(Duration::from_millis(30));
        output.tick();

        assert!(!output.drain_events().contains(&MediaEvent::Ended));
    }

    #[test]
    fn null_output_time_updates_are_throttled() {
        let mut output = NullAudioOutput::new();
        output.load("a.mp3", None).expect("load");
        output.play().expect("play");
        output.drain_events();

        output.tick();
        output.tick();
        output.tick();
        let updates = output
            .drain_events()
            .into_iter()
            .filter(|event| matches!(event, MediaEvent::TimeUpdate(_)))
            .count();
        assert_eq!(updates, 1);
    }
}
