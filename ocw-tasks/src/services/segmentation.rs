//! Speaker segmentation
//!
//! Groups a flat utterance stream into contiguous single-speaker segments.
//! Utterances are stably sorted by start time first, then consumed in one
//! pass. A new segment opens when the speaker changes or when the silence
//! since the current segment's end exceeds [`SEGMENT_GAP_THRESHOLD`].

use crate::models::TranscriptUtterance;

/// Maximum silence (seconds) tolerated inside one segment
pub const SEGMENT_GAP_THRESHOLD: f64 = 5.0;

/// Contiguous run of utterances by one speaker
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Speaker index as reported by the worker
    pub speaker: i64,
    /// Earliest utterance start
    pub start: f64,
    /// Latest utterance end
    pub end: f64,
    pub utterances: Vec<TranscriptUtterance>,
}

impl Segment {
    fn open(utterance: TranscriptUtterance) -> Self {
        Self {
            speaker: utterance.speaker,
            start: utterance.start,
            end: utterance.end,
            utterances: vec![utterance],
        }
    }

    fn push(&mut self, utterance: TranscriptUtterance) {
        self.start = self.start.min(utterance.start);
        self.end = self.end.max(utterance.end);
        self.utterances.push(utterance);
    }

    fn accepts(&self, utterance: &TranscriptUtterance, gap_threshold: f64) -> bool {
        utterance.speaker == self.speaker && utterance.start - self.end <= gap_threshold
    }
}

/// Segment with the default gap threshold
pub fn segment_utterances(utterances: Vec<TranscriptUtterance>) -> Vec<Segment> {
    segment_with_gap(utterances, SEGMENT_GAP_THRESHOLD)
}

pub fn segment_with_gap(mut utterances: Vec<TranscriptUtterance>, gap_threshold: f64) -> Vec<Segment> {
    utterances.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut segments = Vec::new();
    let mut current: Option<Segment> = None;

    for utterance in utterances {
        match current.as_mut() {
            Some(segment) if segment.accepts(&utterance, gap_threshold) => segment.push(utterance),
            _ => {
                if let Some(done) = current.replace(Segment::open(utterance)) {
                    segments.push(done);
                }
            }
        }
    }

    segments.extend(current);
    segments
}
