//! Per-kind exercise state stored on a progress record.
//!
//! Serialised with an explicit `kind` tag. Map keys are strings so the
//! payload reads the same as the JSON the transport layer exchanges.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::evaluate::Feedback;
use crate::grader::Answers;
use crate::model::{DirectionId, LessonKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressData {
    Vocabulary {
        #[serde(default)]
        answers: Answers,
        #[serde(default)]
        feedback: BTreeMap<String, Feedback>,
    },
    Grammar {
        #[serde(default)]
        answers: Answers,
        #[serde(default)]
        feedback: BTreeMap<String, Feedback>,
    },
    Quiz {
        #[serde(default)]
        answers: Answers,
        #[serde(default)]
        feedback: BTreeMap<String, Feedback>,
    },
    Matching {
        #[serde(default)]
        answers: Answers,
        #[serde(default)]
        feedback: BTreeMap<String, Feedback>,
    },
    Text {
        #[serde(default)]
        reading_time: u32,
        #[serde(default)]
        answers: Answers,
        #[serde(default)]
        feedback: BTreeMap<String, Feedback>,
    },
    Card {
        /// Keyed by card-direction id.
        #[serde(default)]
        studied_cards: BTreeMap<String, StudiedCard>,
        #[serde(default)]
        session_stats: SessionStats,
    },
    FinalTest {
        #[serde(default)]
        section_results: Vec<SectionResult>,
    },
}

impl ProgressData {
    /// Empty payload for a lesson of `kind`.
    pub fn for_kind(kind: LessonKind) -> Self {
        match kind {
            LessonKind::Vocabulary => ProgressData::Vocabulary {
                answers: Answers::default(),
                feedback: BTreeMap::new(),
            },
            LessonKind::Grammar => ProgressData::Grammar {
                answers: Answers::default(),
                feedback: BTreeMap::new(),
            },
            LessonKind::Quiz => ProgressData::Quiz {
                answers: Answers::default(),
                feedback: BTreeMap::new(),
            },
            LessonKind::Matching => ProgressData::Matching {
                answers: Answers::default(),
                feedback: BTreeMap::new(),
            },
            LessonKind::Text => ProgressData::Text {
                reading_time: 0,
                answers: Answers::default(),
                feedback: BTreeMap::new(),
            },
            LessonKind::Card => ProgressData::Card {
                studied_cards: BTreeMap::new(),
                session_stats: SessionStats::default(),
            },
            LessonKind::FinalTest => ProgressData::FinalTest {
                section_results: Vec::new(),
            },
        }
    }

    pub fn kind(&self) -> LessonKind {
        match self {
            ProgressData::Vocabulary { .. } => LessonKind::Vocabulary,
            ProgressData::Grammar { .. } => LessonKind::Grammar,
            ProgressData::Quiz { .. } => LessonKind::Quiz,
            ProgressData::Matching { .. } => LessonKind::Matching,
            ProgressData::Text { .. } => LessonKind::Text,
            ProgressData::Card { .. } => LessonKind::Card,
            ProgressData::FinalTest { .. } => LessonKind::FinalTest,
        }
    }

    /// Payload recording a graded submission for a lesson of `kind`.
    pub fn graded(
        kind: LessonKind,
        answers: Answers,
        feedback: BTreeMap<String, Feedback>,
        sections: Vec<SectionResult>,
    ) -> Self {
        match kind {
            LessonKind::Vocabulary => ProgressData::Vocabulary { answers, feedback },
            LessonKind::Grammar => ProgressData::Grammar { answers, feedback },
            LessonKind::Quiz => ProgressData::Quiz { answers, feedback },
            LessonKind::Matching => ProgressData::Matching { answers, feedback },
            LessonKind::Text => ProgressData::Text {
                reading_time: 0,
                answers,
                feedback,
            },
            LessonKind::Card => ProgressData::for_kind(LessonKind::Card),
            LessonKind::FinalTest => ProgressData::FinalTest {
                section_results: sections,
            },
        }
    }

    /// Studied cards of a card payload; empty for other kinds.
    pub fn studied_cards(&self) -> Option<&BTreeMap<String, StudiedCard>> {
        match self {
            ProgressData::Card { studied_cards, .. } => Some(studied_cards),
            _ => None,
        }
    }

    pub fn studied_card(&self, id: DirectionId) -> Option<&StudiedCard> {
        self.studied_cards()
            .and_then(|cards| cards.get(&id.to_string()))
    }

    pub fn session_stats(&self) -> Option<&SessionStats> {
        match self {
            ProgressData::Card { session_stats, .. } => Some(session_stats),
            _ => None,
        }
    }

    /// Record a card outcome, converting the payload to a card payload if needed.
    pub fn record_card(&mut self, id: DirectionId, card: StudiedCard, quality: u8) {
        if !matches!(self, ProgressData::Card { .. }) {
            *self = ProgressData::for_kind(LessonKind::Card);
        }
        if let ProgressData::Card {
            studied_cards,
            session_stats,
        } = self
        {
            studied_cards.insert(id.to_string(), card);
            session_stats.record(quality);
        }
    }

    /// Keep the reading time of a text payload in sync with the progress field.
    pub fn set_reading_time(&mut self, seconds: u32) {
        if let ProgressData::Text { reading_time, .. } = self {
            *reading_time = seconds;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudiedStatus {
    Passed,
    Failed,
}

/// Outcome of a card direction within the current lesson session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudiedCard {
    pub status: StudiedStatus,
    /// Whether the card was new when first seen in this session.
    pub was_new: bool,
    /// Failed reviews within the session.
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub effective_rating: Option<u8>,
}

/// Rating counters for a card lesson session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub reviews: u32,
    pub again: u32,
    pub hard: u32,
    pub good: u32,
    pub easy: u32,
}

impl SessionStats {
    pub fn record(&mut self, quality: u8) {
        self.reviews += 1;
        match quality {
            0 => self.again += 1,
            1 | 2 => self.hard += 1,
            3 | 4 => self.good += 1,
            _ => self.easy += 1,
        }
    }

    /// Share of non-"again" reviews, in percent. Zero reviews count as 0.
    pub fn accuracy(&self) -> f64 {
        if self.reviews == 0 {
            return 0.0;
        }
        f64::from(self.reviews - self.again) / f64::from(self.reviews) * 100.0
    }
}

/// Score of one final-test section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionResult {
    pub name: String,
    pub score: u8,
    pub correct_count: u32,
    pub total_count: u32,
    pub weight: f64,
}
