use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::clash;
use crate::error::TaskError;

// Single local wall-clock timeline, no offsets.
pub type TimeStamp = PrimitiveDateTime;

/// `dd/MM/yyyy HHmm`, used both for rendering and for dates typed by the user.
pub const DISPLAY_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[day]/[month]/[year] [hour][minute]");

/// Reminder window given to tasks that do not ask for another one.
pub const DEFAULT_REMIND_DAYS: u32 = 3;

/// Current local wall-clock time. Falls back to UTC when the local offset is unknown.
pub fn local_now() -> TimeStamp {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let now = OffsetDateTime::now_utc().to_offset(offset);
    PrimitiveDateTime::new(now.date(), now.time())
}

pub fn format_timestamp(ts: TimeStamp) -> String {
    ts.format(DISPLAY_FORMAT).unwrap_or_else(|_| ts.to_string())
}

pub fn parse_timestamp(input: &str) -> Result<TimeStamp, time::error::Parse> {
    PrimitiveDateTime::parse(input.trim(), DISPLAY_FORMAT)
}

// --- Task Kind ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Todo,
    Deadline,
    Event,
}

// --- Priority ---
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown priority `{other}` (expected low, medium or high)")),
        }
    }
}

// --- Period ---

/// Closed interval `[start, end]` on the wall-clock timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Period {
    start: TimeStamp,
    end: TimeStamp,
}

impl Period {
    /// Fails with [`TaskError::InvalidPeriod`] when `end` is before `start`.
    pub fn new(start: TimeStamp, end: TimeStamp) -> Result<Self, TaskError> {
        if end < start {
            return Err(TaskError::InvalidPeriod { start, end });
        }
        Ok(Self { start, end })
    }

    /// Zero-length period, as carried by a deadline.
    pub const fn instant(at: TimeStamp) -> Self {
        Self { start: at, end: at }
    }

    pub const fn start(&self) -> TimeStamp {
        self.start
    }

    pub const fn end(&self) -> TimeStamp {
        self.end
    }
}

// --- Per-kind behaviour ---
struct KindRules {
    tag: &'static str,
    reminder_due: fn(&Task, TimeStamp) -> bool,
    date_suffix: fn(&Period) -> String,
}

static TODO_RULES: KindRules = KindRules {
    tag: "T",
    reminder_due: |task, now| {
        let days = Duration::days(i64::from(task.remind_in_days));
        task.created_at
            .checked_add(days)
            .is_some_and(|due| now > due)
    },
    date_suffix: from_to_suffix,
};

static DEADLINE_RULES: KindRules = KindRules {
    tag: "D",
    reminder_due: reminder_before_start,
    date_suffix: |period| format!(" (by: {})", format_timestamp(period.end)),
};

static EVENT_RULES: KindRules = KindRules {
    tag: "E",
    reminder_due: reminder_before_start,
    date_suffix: from_to_suffix,
};

fn from_to_suffix(period: &Period) -> String {
    format!(
        " (from: {}) (to: {})",
        format_timestamp(period.start),
        format_timestamp(period.end)
    )
}

/// True inside `[start - remind_in_days, start]`.
fn reminder_before_start(task: &Task, now: TimeStamp) -> bool {
    let Some(period) = task.period else {
        return false;
    };
    let days = Duration::days(i64::from(task.remind_in_days));
    let window_open = period
        .start
        .checked_sub(days)
        .is_none_or(|opens| opens <= now);
    window_open && now <= period.start
}

impl TaskKind {
    fn rules(self) -> &'static KindRules {
        match self {
            Self::Todo => &TODO_RULES,
            Self::Deadline => &DEADLINE_RULES,
            Self::Event => &EVENT_RULES,
        }
    }

    /// One-letter tag shown in front of a rendered task.
    pub fn tag(self) -> &'static str {
        self.rules().tag
    }
}

// --- Task Object ---
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    kind: TaskKind,

    /** Required, never blank */
    description: String,

    /** `None` for a plain todo; an instant for a deadline */
    period: Option<Period>,

    /** Set at construction (immutable once set) */
    created_at: TimeStamp,

    /** Only ever goes from false to true */
    done: bool,

    priority: Priority,
    comment: Option<String>,
    location: Option<String>,

    /** Short module tag prefixed to the title */
    mod_code: Option<String>,

    remind_in_days: u32,
}

// --- Zero size markers for the "typed-state" builder ---
pub struct MissingDescription;
pub struct HasDescription;

// --- Generic Builder struct ---
pub struct TaskBuilder<DescriptionState> {
    /// Every field mirrors [`Task`] but nothing is validated
    /// until one of the `build_*` methods runs.
    description: Option<String>,
    priority: Priority,
    comment: Option<String>,
    location: Option<String>,
    mod_code: Option<String>,
    remind_in_days: u32,
    created_at: Option<TimeStamp>,
    done: bool,

    // zero-cost phantom marker to record builder state in type system
    _state: PhantomData<DescriptionState>,
}

// --- Entry-Point: Task::builder(). impl domain methods on `Task` ---
impl Task {
    /// Creates a new builder chain (*without* a description).
    pub fn builder() -> TaskBuilder<MissingDescription> {
        TaskBuilder {
            description: None,
            priority: Priority::default(),
            comment: None,
            location: None,
            mod_code: None,
            remind_in_days: DEFAULT_REMIND_DAYS,
            created_at: None,
            done: false,
            _state: PhantomData,
        }
    }

    pub const fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub const fn period(&self) -> Option<Period> {
        self.period
    }

    pub fn start(&self) -> Option<TimeStamp> {
        self.period.map(|p| p.start)
    }

    pub fn end(&self) -> Option<TimeStamp> {
        self.period.map(|p| p.end)
    }

    pub const fn created_at(&self) -> TimeStamp {
        self.created_at
    }

    pub const fn is_done(&self) -> bool {
        self.done
    }

    pub const fn priority(&self) -> Priority {
        self.priority
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn mod_code(&self) -> Option<&str> {
        self.mod_code.as_deref()
    }

    pub const fn remind_in_days(&self) -> u32 {
        self.remind_in_days
    }

    /// `modCode: description`, or the bare description without a mod code.
    pub fn title(&self) -> String {
        match self.mod_code.as_deref() {
            Some(code) if !code.is_empty() => format!("{code}: {}", self.description),
            _ => self.description.clone(),
        }
    }

    /// Whether the task carries a period a calendar can show.
    pub const fn has_period(&self) -> bool {
        self.period.is_some()
    }

    /// Mark task as done. A task can only be completed once.
    pub fn mark_done(&mut self) -> Result<(), TaskError> {
        if self.done {
            return Err(TaskError::AlreadyCompleted(self.description.clone()));
        }
        self.done = true;
        Ok(())
    }

    /// Replace any previous comment.
    pub fn set_comment<S: Into<String>>(&mut self, text: S) {
        self.comment = Some(text.into());
    }

    pub fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
    }

    pub fn set_location(&mut self, location: Option<String>) {
        self.location = location;
    }

    pub fn set_description<S: Into<String>>(&mut self, text: S) -> Result<(), TaskError> {
        self.description = non_blank(text.into())?;
        Ok(())
    }

    /// Whether the reminder for this task is showing at `now`.
    pub fn check_reminder_trigger(&self, now: TimeStamp) -> bool {
        (self.kind.rules().reminder_due)(self, now)
    }

    /// Time window this task occupies for clash purposes. A plain todo has
    /// none and never clashes; a deadline occupies the instant it is due.
    pub const fn clash_window(&self) -> Option<Period> {
        self.period
    }

    pub fn check_for_clash(&self, other: &Self) -> bool {
        clash::clashes(self, other)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let glyph = if self.done { '\u{2713}' } else { '\u{2718}' };
        write!(f, "[{}][{glyph}] {}", self.kind.tag(), self.title())?;
        if let Some(period) = &self.period {
            f.write_str(&(self.kind.rules().date_suffix)(period))?;
        }
        Ok(())
    }
}

fn non_blank(text: String) -> Result<String, TaskError> {
    if text.trim().is_empty() {
        return Err(TaskError::EmptyDescription);
    }
    Ok(text)
}

// --- Stage-1: impl: methods available *before* description exists ---
impl TaskBuilder<MissingDescription> {
    pub fn description<S: Into<String>>(self, d: S) -> TaskBuilder<HasDescription> {
        TaskBuilder {
            description: Some(d.into()),
            priority: self.priority,
            comment: self.comment,
            location: self.location,
            mod_code: self.mod_code,
            remind_in_days: self.remind_in_days,
            created_at: self.created_at,
            done: self.done,
            _state: PhantomData, // Flips to HasDescription marker
        }
    }
}

// --- Stage-2: impl: common (setter) methods available in *either* state ---
impl<DescriptionState> TaskBuilder<DescriptionState> {
    pub fn priority(mut self, p: Priority) -> Self {
        self.priority = p;
        self
    }

    pub fn comment<S: Into<String>>(mut self, c: S) -> Self {
        self.comment = Some(c.into());
        self
    }

    pub fn location<S: Into<String>>(mut self, l: S) -> Self {
        self.location = Some(l.into());
        self
    }

    pub fn mod_code<S: Into<String>>(mut self, code: S) -> Self {
        self.mod_code = Some(code.into());
        self
    }

    pub fn remind_in_days(mut self, days: u32) -> Self {
        self.remind_in_days = days;
        self
    }

    /// Pin the creation time (defaults to now at build time).
    pub fn created_at(mut self, at: TimeStamp) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Used when restoring a task that was already completed.
    pub fn done(mut self, done: bool) -> Self {
        self.done = done;
        self
    }
}

// --- Final-Stage: impl: build only once description supplied ---
impl TaskBuilder<HasDescription> {
    /// Plain todo without a period.
    pub fn build_todo(self) -> Result<Task, TaskError> {
        self.finish(TaskKind::Todo, None)
    }

    /// Todo that occupies `[start, end]`.
    pub fn build_todo_with_period(self, start: TimeStamp, end: TimeStamp) -> Result<Task, TaskError> {
        let period = Period::new(start, end)?;
        self.finish(TaskKind::Todo, Some(period))
    }

    pub fn build_deadline(self, by: TimeStamp) -> Result<Task, TaskError> {
        self.finish(TaskKind::Deadline, Some(Period::instant(by)))
    }

    pub fn build_event(self, start: TimeStamp, end: TimeStamp) -> Result<Task, TaskError> {
        let period = Period::new(start, end)?;
        self.finish(TaskKind::Event, Some(period))
    }

    fn finish(self, kind: TaskKind, period: Option<Period>) -> Result<Task, TaskError> {
        let description = non_blank(self.description.unwrap_or_default())?;
        Ok(Task {
            kind,
            description,
            period,
            created_at: self.created_at.unwrap_or_else(local_now),
            done: self.done,
            priority: self.priority,
            comment: self.comment,
            location: self.location,
            mod_code: self.mod_code,
            remind_in_days: self.remind_in_days,
        })
    }
}
