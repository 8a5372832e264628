//! Eligibility decisions for recently published videos.
//!
//! `evaluate` is a pure function over one snapshot: it reads no clock, no
//! environment and performs no I/O. Rules are applied top to bottom and the
//! first match wins:
//!
//! 1. not public            -> rejected (`not_public`)
//! 2. marker already present -> rejected (`already_processed`)
//! 3. age < target delay     -> rejected (`too_new`)
//! 4. age > check window     -> rejected (`too_old`)
//! 5. otherwise              -> accepted, one `UpdateInstruction`
//!
//! The marker check precedes the age checks so a processed video is never
//! reconsidered, whatever its age.
use chrono::{DateTime, Duration, Utc};

use crate::model::{PrivacyStatus, UpdateInstruction, VideoRecord};

pub const DEFAULT_MARKER: &str = "\n\n[updated-by-bot]";
pub const DEFAULT_TITLE_TEMPLATE: &str = "🔥 {title} | Bot Updated Tagline!";
pub const TITLE_PLACEHOLDER: &str = "{title}";

/// Idempotence flag embedded in processed descriptions.
///
/// The full text is what gets appended; presence is tested against the
/// whitespace-trimmed text so a remote that strips trailing whitespace
/// still reads as processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerToken {
    text: String,
}

impl MarkerToken {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn needle(&self) -> &str {
        self.text.trim()
    }

    pub fn is_present_in(&self, description: &str) -> bool {
        description.contains(self.needle())
    }

    /// Trailing whitespace of the original is dropped before appending.
    pub fn append_to(&self, description: &str) -> String {
        let mut out = description.trim_end().to_string();
        out.push_str(&self.text);
        out
    }
}

impl Default for MarkerToken {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER)
    }
}

#[derive(Debug, Clone)]
pub struct DecisionContext {
    pub now: DateTime<Utc>,
    pub target_delay: Duration,
    pub check_window: Duration,
    pub marker: MarkerToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotPublic,
    AlreadyProcessed,
    TooNew { remaining: Duration },
    TooOld,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    Rejected(RejectReason),
}

impl Outcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Accepted => "accepted",
            Outcome::Rejected(_) => "rejected",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Accepted => "accepted",
            Outcome::Rejected(RejectReason::NotPublic) => "not_public",
            Outcome::Rejected(RejectReason::AlreadyProcessed) => "already_processed",
            Outcome::Rejected(RejectReason::TooNew { .. }) => "too_new",
            Outcome::Rejected(RejectReason::TooOld) => "too_old",
        }
    }
}

/// Trace entry for one evaluated record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub video_id: String,
    pub privacy: PrivacyStatus,
    pub age: Duration,
    pub outcome: Outcome,
}

impl Decision {
    pub fn age_minutes(&self) -> f64 {
        minutes(self.age)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub instructions: Vec<UpdateInstruction>,
    pub decisions: Vec<Decision>,
}

impl Evaluation {
    pub fn accepted(&self) -> usize {
        self.instructions.len()
    }
}

pub fn minutes(d: Duration) -> f64 {
    d.num_milliseconds() as f64 / 60_000.0
}

fn decide(record: &VideoRecord, age: Duration, ctx: &DecisionContext) -> Outcome {
    if record.privacy_status != PrivacyStatus::Public {
        return Outcome::Rejected(RejectReason::NotPublic);
    }
    if ctx.marker.is_present_in(&record.description) {
        return Outcome::Rejected(RejectReason::AlreadyProcessed);
    }
    if age < ctx.target_delay {
        return Outcome::Rejected(RejectReason::TooNew {
            remaining: ctx.target_delay - age,
        });
    }
    if age > ctx.check_window {
        return Outcome::Rejected(RejectReason::TooOld);
    }
    Outcome::Accepted
}

/// Decide every record against the single `ctx.now` reading. `title_fn` is
/// only called for accepted records.
pub fn evaluate<F>(records: &[VideoRecord], ctx: &DecisionContext, title_fn: F) -> Evaluation
where
    F: Fn(&str) -> String,
{
    let mut eval = Evaluation::default();
    for record in records {
        let age = ctx.now.signed_duration_since(record.published_at);
        let outcome = decide(record, age, ctx);
        if outcome.is_accepted() {
            eval.instructions.push(UpdateInstruction {
                video_id: record.id.clone(),
                title: title_fn(&record.title),
                description: ctx.marker.append_to(&record.description),
                category_id: record.category_id.clone(),
            });
        }
        eval.decisions.push(Decision {
            video_id: record.id.clone(),
            privacy: record.privacy_status,
            age,
            outcome,
        });
    }
    eval
}

/// Produces replacement titles: an explicit per-run override wins, otherwise
/// the template is filled with the old title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitlePolicy {
    override_title: Option<String>,
    template: String,
}

impl TitlePolicy {
    pub fn new(override_title: Option<String>, template: impl Into<String>) -> Self {
        let override_title = override_title.filter(|t| !t.trim().is_empty());
        Self {
            override_title,
            template: template.into(),
        }
    }

    pub fn has_override(&self) -> bool {
        self.override_title.is_some()
    }

    pub fn title_for(&self, old_title: &str) -> String {
        match &self.override_title {
            Some(title) => title.clone(),
            None => self.template.replace(TITLE_PLACEHOLDER, old_title),
        }
    }
}

impl Default for TitlePolicy {
    fn default() -> Self {
        Self::new(None, DEFAULT_TITLE_TEMPLATE)
    }
}
