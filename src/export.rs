//! iCalendar export of dated tasks.

use time::{OffsetDateTime, PrimitiveDateTime};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use uuid::Uuid;

use crate::error::TaskError;
use crate::model::{Priority, Task, TaskKind, TimeStamp};

const PRODUCT_ID: &str = "-//Chronologer//Task Export 1.0//EN";
const ICS_DATE_TIME: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day]T[hour][minute][second]");
const MAX_LINE_OCTETS: usize = 75;

/// Which kinds of dated task go into an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFilter {
    pub deadlines: bool,
    pub events: bool,
    pub todo_periods: bool,
}

impl ExportFilter {
    pub const fn all() -> Self {
        Self {
            deadlines: true,
            events: true,
            todo_periods: true,
        }
    }

    /// No flag set means every kind.
    pub const fn from_flags(deadlines: bool, events: bool, todo_periods: bool) -> Self {
        if !deadlines && !events && !todo_periods {
            return Self::all();
        }
        Self {
            deadlines,
            events,
            todo_periods,
        }
    }

    pub fn admits(&self, task: &Task) -> bool {
        match task.kind() {
            TaskKind::Deadline => self.deadlines,
            TaskKind::Event => self.events,
            TaskKind::Todo => self.todo_periods && task.has_period(),
        }
    }
}

impl Default for ExportFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// Turns tasks into a calendar document.
pub trait Exporter {
    /// Fails with [`TaskError::EmptyExport`] on an empty sequence and with
    /// [`TaskError::EmptyCalendar`] when nothing survives `filter`.
    fn export(&self, tasks: &[Task], filter: ExportFilter) -> Result<String, TaskError>;
}

/// RFC 5545 text output with one `VEVENT` per task.
#[derive(Debug, Clone, Copy)]
pub struct IcsExporter {
    now: TimeStamp,
}

impl IcsExporter {
    /// `now` opens the span of every exported deadline.
    pub const fn new(now: TimeStamp) -> Self {
        Self { now }
    }

    /// `None` for a task that has no place on a calendar.
    fn event_lines(&self, task: &Task, stamp: &str) -> Result<Option<Vec<String>>, TaskError> {
        let Some(period) = task.period() else {
            return Ok(None);
        };
        let (start, end) = match task.kind() {
            // A deadline runs from now until it is due; past ones are dropped.
            TaskKind::Deadline if period.end() < self.now => return Ok(None),
            TaskKind::Deadline => (self.now, period.end()),
            TaskKind::Event | TaskKind::Todo => (period.start(), period.end()),
        };

        let mut lines = vec![
            "BEGIN:VEVENT".to_owned(),
            format!("UID:{}", Uuid::new_v4()),
            format!("DTSTAMP:{stamp}"),
            format!("DTSTART:{}", ics_date_time(start)?),
            format!("DTEND:{}", ics_date_time(end)?),
            format!("SUMMARY:{}", escape_text(&task.title())),
        ];
        if let Some(comment) = task.comment() {
            lines.push(format!("DESCRIPTION:{}", escape_text(comment)));
        }
        if let Some(location) = task.location() {
            lines.push(format!("LOCATION:{}", escape_text(location)));
        }
        lines.push(format!("PRIORITY:{}", ics_priority(task.priority())));
        lines.push("END:VEVENT".to_owned());
        Ok(Some(lines))
    }
}

impl Exporter for IcsExporter {
    fn export(&self, tasks: &[Task], filter: ExportFilter) -> Result<String, TaskError> {
        if tasks.is_empty() {
            return Err(TaskError::EmptyExport);
        }

        let utc = OffsetDateTime::now_utc();
        let stamp = format!(
            "{}Z",
            ics_date_time(PrimitiveDateTime::new(utc.date(), utc.time()))?
        );

        // Grouped by kind: deadlines, then events, then todos with a period.
        let kinds = [TaskKind::Deadline, TaskKind::Event, TaskKind::Todo];
        let mut events: Vec<Vec<String>> = Vec::new();
        for task in kinds
            .iter()
            .flat_map(|kind| tasks.iter().filter(move |t| t.kind() == *kind))
            .filter(|t| filter.admits(t))
        {
            if let Some(lines) = self.event_lines(task, &stamp)? {
                events.push(lines);
            }
        }
        if events.is_empty() {
            return Err(TaskError::EmptyCalendar);
        }

        let mut lines = vec![
            "BEGIN:VCALENDAR".to_owned(),
            format!("PRODID:{PRODUCT_ID}"),
            "VERSION:2.0".to_owned(),
            "CALSCALE:GREGORIAN".to_owned(),
        ];
        lines.extend(events.into_iter().flatten());
        lines.push("END:VCALENDAR".to_owned());

        Ok(lines.iter().map(|l| fold_line(l)).collect())
    }
}

fn ics_date_time(ts: TimeStamp) -> Result<String, TaskError> {
    Ok(ts.format(ICS_DATE_TIME)?)
}

/// HIGH, MEDIUM and LOW on the 1-9 calendar scale.
const fn ics_priority(priority: Priority) -> u8 {
    match priority {
        Priority::High => 1,
        Priority::Medium => 5,
        Priority::Low => 9,
    }
}

fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            other => out.push(other),
        }
    }
    out
}

/// Fold at 75 octets without splitting a character; terminate with CRLF.
fn fold_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len() + 4);
    let mut used = 0;
    for ch in line.chars() {
        let width = ch.len_utf8();
        if used + width > MAX_LINE_OCTETS {
            out.push_str("\r\n ");
            // The leading space counts towards the next line.
            used = 1;
        }
        out.push(ch);
        used += width;
    }
    out.push_str("\r\n");
    out
}
