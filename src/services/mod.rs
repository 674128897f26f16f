//! External collaborators: audio extraction, ASR task enqueue, note
//! generation. Each sits behind a trait so tests can substitute stubs.

mod asr;
mod audio;
mod notes;

pub use asr::AsrTaskClient;
pub use audio::{AudioExtractor, AudioHint, ExtractError, FfmpegExtractor};
pub use notes::{GeneratedNotes, LlmNoteGenerator, NoteGenError, NoteGenerator, NotesLlmConfig};
