use serde::Serialize;

/// Highest percentage reported before the file is actually finished.
pub const MAX_IN_FLIGHT_PERCENT: u8 = 99;

/// Words translated against the total counted up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressCounter {
    total_words: usize,
    translated_words: usize,
    last_percent: u8,
}

impl ProgressCounter {
    pub fn new(total_words: usize) -> Self {
        Self {
            total_words,
            translated_words: 0,
            last_percent: 0,
        }
    }

    pub fn total_words(&self) -> usize {
        self.total_words
    }

    pub fn translated_words(&self) -> usize {
        self.translated_words
    }

    /// Records `words` more and returns the percentage to show, never above
    /// 99 and never below what was shown before.
    pub fn advance(&mut self, words: usize) -> u8 {
        self.translated_words += words;
        if self.total_words > 0 {
            let percent = (self.translated_words.saturating_mul(100) / self.total_words)
                .min(MAX_IN_FLIGHT_PERCENT as usize) as u8;
            self.last_percent = self.last_percent.max(percent);
        }
        self.last_percent
    }

    pub fn finish(&mut self) -> u8 {
        self.last_percent = 100;
        self.last_percent
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started {
        file: String,
        total_words: usize,
        target_lang: String,
    },
    Progress {
        file: String,
        percent: u8,
    },
    Completed {
        file: String,
        output_name: String,
    },
    Failed {
        file: String,
        error: String,
    },
}

/// Receives pipeline progress. Implementations must not block.
pub trait ProgressSink: Send {
    fn report(&mut self, event: ProgressEvent);
}

impl ProgressSink for Vec<ProgressEvent> {
    fn report(&mut self, event: ProgressEvent) {
        self.push(event);
    }
}

/// Reports progress as log lines, used by the command line.
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started {
                file,
                total_words,
                target_lang,
            } => tracing::info!(
                %file,
                total_words,
                %target_lang,
                "Translating {}: {} words to be translated",
                file,
                total_words
            ),
            ProgressEvent::Progress { file, percent } => {
                tracing::info!(%file, percent, "Progress {}%", percent)
            }
            ProgressEvent::Completed { file, output_name } => {
                tracing::info!(%file, %output_name, "File translated")
            }
            ProgressEvent::Failed { file, error } => {
                tracing::error!(%file, %error, "File translation failed")
            }
        }
    }
}
