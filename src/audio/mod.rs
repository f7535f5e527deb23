pub mod ambient;
pub mod channel;
pub mod tracks;

pub use ambient::{AmbientPlayer, UnlockPolicy, PREVIEW_DURATION};
pub use channel::{AudioChannel, ChannelState, LoadTicket};
pub use tracks::{AmbientCatalog, AmbientSelection, TrackInfo, TrackLoader};

use async_trait::async_trait;
use bytes::Bytes;
use rodio::{
    source::SineWave, Decoder, OutputStream, OutputStreamHandle, Sink, Source,
};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;

const PLAY_REPLY_TIMEOUT: Duration = Duration::from_secs(2);
const CHIME_FREQUENCY_HZ: f32 = 880.0;
const CHIME_LENGTH: Duration = Duration::from_millis(350);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AudioError {
    #[error("Sound is blocked until you interact with the page. Press start to enable it.")]
    Blocked,
    #[error("Ambient sound unavailable: {0}")]
    Unavailable(String),
    #[error("Audio output unavailable: {0}")]
    Device(String),
}

/// Independent playback lanes. The ambient loop, hover previews and the
/// completion chime never interrupt one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Output {
    Ambient,
    Preview,
    Chime,
}

#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Starts `clip` on `output`, replacing whatever played there. Resolves
    /// once the output accepted it.
    async fn play(
        &self,
        output: Output,
        clip: Bytes,
        looped: bool,
        volume: f32,
    ) -> Result<(), AudioError>;
    fn pause(&self, output: Output);
    fn resume(&self, output: Output);
    fn stop(&self, output: Output);
    fn set_volume(&self, output: Output, volume: f32);
    fn chime(&self, volume: f32) -> Result<(), AudioError>;
}

type BoxedSource = Box<dyn Source<Item = i16> + Send>;

enum AudioCommand {
    Play {
        output: Output,
        source: BoxedSource,
        volume: f32,
        reply: oneshot::Sender<Result<(), String>>,
    },
    Chime {
        volume: f32,
    },
    Pause(Output),
    Resume(Output),
    Stop(Output),
    SetVolume(Output, f32),
}

fn decode(clip: Bytes, looped: bool) -> Result<BoxedSource, AudioError> {
    let cursor = Cursor::new(clip);
    let source: Result<BoxedSource, _> = if looped {
        Decoder::new_looped(cursor).map(|d| Box::new(d) as BoxedSource)
    } else {
        Decoder::new(cursor).map(|d| Box::new(d) as BoxedSource)
    };
    source.map_err(|e| AudioError::Unavailable(format!("cannot decode clip: {e}")))
}

/// rodio-backed engine. Audio objects are not `Send`, so they live on a
/// dedicated thread fed through a command channel.
pub struct AudioEngineHandle {
    tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
}

impl Default for AudioEngineHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEngineHandle {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>, AudioError> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|e| AudioError::Device(e.to_string()))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();

        thread::Builder::new()
            .name("audio-engine".to_string())
            .spawn(move || {
                let mut stream: Option<(OutputStream, OutputStreamHandle)> = None;
                let mut sinks: HashMap<Output, Sink> = HashMap::new();

                fn sink_for<'a>(
                    stream: &mut Option<(OutputStream, OutputStreamHandle)>,
                    sinks: &'a mut HashMap<Output, Sink>,
                    output: Output,
                ) -> Result<&'a Sink, String> {
                    if stream.is_none() {
                        let opened = OutputStream::try_default()
                            .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
                        *stream = Some(opened);
                    }
                    if !sinks.contains_key(&output) {
                        let handle = match stream.as_ref() {
                            Some((_, handle)) => handle,
                            None => return Err("audio output stream missing".into()),
                        };
                        let sink = Sink::try_new(handle)
                            .map_err(|e| format!("Failed to create audio sink: {}", e))?;
                        sinks.insert(output, sink);
                    }
                    sinks
                        .get(&output)
                        .ok_or_else(|| "audio sink missing".to_string())
                }

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AudioCommand::Play {
                            output,
                            source,
                            volume,
                            reply,
                        } => {
                            if let Some(old) = sinks.remove(&output) {
                                old.stop();
                            }
                            let result = sink_for(&mut stream, &mut sinks, output).map(|sink| {
                                sink.set_volume(volume.clamp(0.0, 1.0));
                                sink.append(source);
                                sink.play();
                            });
                            let _ = reply.send(result);
                        }
                        AudioCommand::Chime { volume } => {
                            match sink_for(&mut stream, &mut sinks, Output::Chime) {
                                Ok(sink) => {
                                    sink.set_volume(volume.clamp(0.0, 1.0));
                                    sink.append(
                                        SineWave::new(CHIME_FREQUENCY_HZ)
                                            .take_duration(CHIME_LENGTH)
                                            .amplify(0.3),
                                    );
                                }
                                Err(e) => log::warn!("Chime skipped: {e}"),
                            }
                        }
                        AudioCommand::Pause(output) => {
                            if let Some(s) = sinks.get(&output) {
                                s.pause();
                            }
                        }
                        AudioCommand::Resume(output) => {
                            if let Some(s) = sinks.get(&output) {
                                s.play();
                            }
                        }
                        AudioCommand::Stop(output) => {
                            if let Some(s) = sinks.remove(&output) {
                                s.stop();
                            }
                        }
                        AudioCommand::SetVolume(output, v) => {
                            if let Some(s) = sinks.get(&output) {
                                s.set_volume(v.clamp(0.0, 1.0));
                            }
                        }
                    }
                }
            })
            .map_err(|e| AudioError::Device(e.to_string()))?;

        *guard = Some(tx.clone());
        Ok(tx)
    }

    fn send(&self, cmd: AudioCommand) {
        match self.ensure_thread() {
            Ok(tx) => {
                if tx.send(cmd).is_err() {
                    log::warn!("Audio engine thread is gone");
                }
            }
            Err(e) => log::warn!("Audio engine unavailable: {e}"),
        }
    }
}

#[async_trait]
impl AudioBackend for AudioEngineHandle {
    async fn play(
        &self,
        output: Output,
        clip: Bytes,
        looped: bool,
        volume: f32,
    ) -> Result<(), AudioError> {
        let source = decode(clip, looped)?;
        let tx = self.ensure_thread()?;
        let (reply, result) = oneshot::channel();

        tx.send(AudioCommand::Play {
            output,
            source,
            volume,
            reply,
        })
        .map_err(|e| AudioError::Device(e.to_string()))?;

        match tokio::time::timeout(PLAY_REPLY_TIMEOUT, result).await {
            Ok(Ok(outcome)) => outcome.map_err(AudioError::Device),
            Ok(Err(_)) => Err(AudioError::Device("audio engine dropped the request".into())),
            Err(_) => Err(AudioError::Device("audio engine did not answer".into())),
        }
    }

    fn pause(&self, output: Output) {
        self.send(AudioCommand::Pause(output));
    }

    fn resume(&self, output: Output) {
        self.send(AudioCommand::Resume(output));
    }

    fn stop(&self, output: Output) {
        // Nothing to stop before the first playback spun the thread up.
        let tx = self.tx.lock().ok().and_then(|g| g.clone());
        if let Some(tx) = tx {
            let _ = tx.send(AudioCommand::Stop(output));
        }
    }

    fn set_volume(&self, output: Output, volume: f32) {
        self.send(AudioCommand::SetVolume(output, volume));
    }

    fn chime(&self, volume: f32) -> Result<(), AudioError> {
        let tx = self.ensure_thread()?;
        tx.send(AudioCommand::Chime { volume })
            .map_err(|e| AudioError::Device(e.to_string()))
    }
}
