use crate::error::SpeechError;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Fire-and-forget text-to-speech output
pub trait SpeechSink: Send {
    /// Queue `text` for speech. Implementations must not block on playback.
    fn speak(&self, text: &str, language: &str) -> Result<(), SpeechError>;

    /// Cut off any utterance in progress
    fn stop(&self) {}
}

/// Prints announcements to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSpeech;

impl SpeechSink for ConsoleSpeech {
    fn speak(&self, text: &str, language: &str) -> Result<(), SpeechError> {
        println!("[{language}] {text}");
        Ok(())
    }
}

/// Runs a host TTS program (`espeak-ng`, `say`, ...) per utterance.
///
/// `{lang}` in any argument is replaced by the language tag; the text is
/// passed as the final argument. The child is not waited on.
#[derive(Debug)]
pub struct CommandSpeech {
    program: String,
    args: Vec<String>,
    current: Mutex<Option<Child>>,
}

impl CommandSpeech {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            current: Mutex::new(None),
        }
    }

    /// Parse a whitespace separated command line such as `espeak-ng -v {lang}`
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }
}

impl SpeechSink for CommandSpeech {
    fn speak(&self, text: &str, language: &str) -> Result<(), SpeechError> {
        let child = Command::new(&self.program)
            .args(self.args.iter().map(|a| a.replace("{lang}", language)))
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        // a new utterance cuts off the one still playing
        if let Some(previous) = current.replace(child) {
            halt(previous);
        }
        Ok(())
    }

    fn stop(&self) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(child) = current.take() {
            halt(child);
        }
    }
}

fn halt(mut child: Child) {
    if let Err(err) = child.kill() {
        debug!(%err, "speech process already gone");
    }
    let _ = child.wait();
}

/// Captures utterances in memory. Clones share the same log.
#[derive(Debug, Default, Clone)]
pub struct RecordingSpeech {
    spoken: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingSpeech {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(text, language)` pairs in the order they were spoken
    pub fn utterances(&self) -> Vec<(String, String)> {
        self.spoken.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.utterances().into_iter().map(|(t, _)| t).collect()
    }
}

impl SpeechSink for RecordingSpeech {
    fn speak(&self, text: &str, language: &str) -> Result<(), SpeechError> {
        self.spoken
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((text.to_string(), language.to_string()));
        Ok(())
    }
}

/// Always fails; stands in for a missing or broken engine
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableSpeech;

impl SpeechSink for UnavailableSpeech {
    fn speak(&self, _text: &str, _language: &str) -> Result<(), SpeechError> {
        Err(SpeechError::Unavailable("no speech engine".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_speech_shares_log_between_clones() {
        let speech = RecordingSpeech::new();
        let handle = speech.clone();
        speech.speak("1 kilometer", "en-US").unwrap();
        assert_eq!(
            handle.utterances(),
            vec![("1 kilometer".to_string(), "en-US".to_string())]
        );
    }

    #[test]
    fn command_line_parsing() {
        let cmd = CommandSpeech::from_command_line("espeak-ng -v {lang}").unwrap();
        assert_eq!(cmd.program, "espeak-ng");
        assert_eq!(cmd.args, vec!["-v".to_string(), "{lang}".to_string()]);
        assert!(CommandSpeech::from_command_line("   ").is_none());
    }

    #[test]
    fn missing_program_is_an_error_not_a_panic() {
        let cmd = CommandSpeech::new("definitely-not-a-tts-binary-xyz", vec![]);
        assert!(cmd.speak("hello", "en-US").is_err());
        cmd.stop();
    }

    #[cfg(unix)]
    #[test]
    fn new_utterance_kills_and_reaps_the_previous_one() {
        // `sleep <text>` stands in for a long utterance
        let cmd = CommandSpeech::new("sleep", vec![]);
        let started = std::time::Instant::now();
        cmd.speak("5", "en-US").unwrap();
        cmd.speak("5", "en-US").unwrap();
        assert!(cmd.current.lock().unwrap().is_some());

        cmd.stop();
        assert!(cmd.current.lock().unwrap().is_none());
        assert!(started.elapsed() < std::time::Duration::from_secs(4));
    }
}
