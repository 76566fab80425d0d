//! Speech capture interface and transcript cleanup
//!
//! Recognizers tend to spell technical terms phonetically ("java script",
//! "node js"). Transcripts are normalized before they are submitted.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Spoken form (lowercase) and its written form
const CORRECTIONS: &[(&str, &str)] = &[
    // Languages and frameworks
    ("javascript", "JavaScript"),
    ("java script", "JavaScript"),
    ("typescript", "TypeScript"),
    ("type script", "TypeScript"),
    ("python", "Python"),
    ("react", "React"),
    ("react js", "React"),
    ("reactjs", "React"),
    ("next js", "Next.js"),
    ("nextjs", "Next.js"),
    ("node js", "Node.js"),
    ("nodejs", "Node.js"),
    ("angular", "Angular"),
    ("vue", "Vue"),
    ("vue js", "Vue.js"),
    // Web
    ("html", "HTML"),
    ("css", "CSS"),
    ("json", "JSON"),
    ("xml", "XML"),
    ("api", "API"),
    ("rest", "REST"),
    ("graphql", "GraphQL"),
    ("graph ql", "GraphQL"),
    // Databases
    ("sql", "SQL"),
    ("mysql", "MySQL"),
    ("postgresql", "PostgreSQL"),
    ("mongo db", "MongoDB"),
    ("mongodb", "MongoDB"),
    ("redis", "Redis"),
    // Tooling
    ("aws", "AWS"),
    ("docker", "Docker"),
    ("kubernetes", "Kubernetes"),
    ("git", "Git"),
    ("github", "GitHub"),
    ("gitlab", "GitLab"),
    ("ci cd", "CI/CD"),
    // Concepts
    ("oop", "OOP"),
    ("mvc", "MVC"),
    ("mvvm", "MVVM"),
    ("crud", "CRUD"),
    ("jwt", "JWT"),
    ("oauth", "OAuth"),
    ("ui", "UI"),
    ("ux", "UX"),
    ("seo", "SEO"),
];

struct Corrector {
    pattern: Regex,
    replacements: HashMap<&'static str, &'static str>,
}

fn corrector() -> &'static Corrector {
    static CORRECTOR: OnceLock<Corrector> = OnceLock::new();
    CORRECTOR.get_or_init(|| {
        // Longest spoken forms first so "react js" wins over "react"
        let mut spoken: Vec<&str> = CORRECTIONS.iter().map(|(from, _)| *from).collect();
        spoken.sort_by(|a, b| b.len().cmp(&a.len()));
        let alternation = spoken
            .iter()
            .map(|s| regex::escape(s))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"(?i)\b(?:{})\b", alternation))
            .expect("correction table builds a valid pattern");

        Corrector {
            pattern,
            replacements: CORRECTIONS.iter().copied().collect(),
        }
    })
}

/// Rewrite phonetically transcribed technical terms (whole words, any case)
pub fn correct_transcript(text: &str) -> String {
    let corrector = corrector();
    corrector
        .pattern
        .replace_all(text, |caps: &Captures| {
            let spoken = caps[0].to_lowercase();
            corrector
                .replacements
                .get(spoken.as_str())
                .map(|written| written.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// User-facing message for a recognizer error code
pub fn recognition_error_message(code: &str) -> String {
    match code {
        "no-speech" => "No speech detected. Please try again.".to_string(),
        "audio-capture" => "No microphone found. Please check your device.".to_string(),
        "not-allowed" => "Microphone permission denied. Please allow access.".to_string(),
        other => format!("Error: {}", other),
    }
}

/// Live speech-to-text capture as seen by the chat layer
pub trait SpeechCapture {
    fn start(&mut self);
    fn stop(&mut self);
    fn reset(&mut self);
    fn is_listening(&self) -> bool;
    /// Corrected transcript so far, final results followed by the interim one
    fn transcript(&self) -> String;
    fn take_error(&mut self) -> Option<String>;

    /// Stop listening and hand over the utterance, if anything was said
    fn finish_utterance(&mut self) -> Option<String> {
        self.stop();
        let transcript = self.transcript();
        let utterance = transcript.trim();
        if utterance.is_empty() {
            return None;
        }
        let utterance = utterance.to_string();
        self.reset();
        Some(utterance)
    }
}

/// In-memory transcript fed by a recognizer's result callbacks
#[derive(Debug, Default)]
pub struct TranscriptBuffer {
    listening: bool,
    final_text: String,
    interim: String,
    error: Option<String>,
}

impl TranscriptBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a recognizer result. Interim results replace each other; final
    /// results accumulate.
    pub fn push_result(&mut self, text: &str, is_final: bool) {
        if !self.listening {
            return;
        }
        if is_final {
            self.final_text.push_str(text);
            self.final_text.push(' ');
            self.interim.clear();
        } else {
            self.interim = text.to_string();
        }
    }

    /// Record a recognizer error; capture stops
    pub fn fail(&mut self, code: &str) {
        self.error = Some(recognition_error_message(code));
        self.listening = false;
    }
}

impl SpeechCapture for TranscriptBuffer {
    fn start(&mut self) {
        if self.listening {
            return;
        }
        self.error = None;
        self.final_text.clear();
        self.interim.clear();
        self.listening = true;
    }

    fn stop(&mut self) {
        self.listening = false;
    }

    fn reset(&mut self) {
        self.final_text.clear();
        self.interim.clear();
    }

    fn is_listening(&self) -> bool {
        self.listening
    }

    fn transcript(&self) -> String {
        correct_transcript(&format!("{}{}", self.final_text, self.interim))
    }

    fn take_error(&mut self) -> Option<String> {
        self.error.take()
    }
}
