//! Queue record model and its markdown file format.
//!
//! A record is the durable form of one subtask. It is rendered as a small
//! markdown document that worker processes read, and named
//! `<capability>-<identity>.md` so a worker can pick its own files out of a
//! shared directory. Workers signal progress by renaming: `.processing.md`
//! while working, `.completed.md` when done. A `.completed` marker beside the
//! record (either `<stem>.completed` or `<stem>.md.completed`) also counts as done.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{BatchId, Capability, Subtask};
use crate::{Error, Result};

pub const RECORD_SUFFIX: &str = ".md";
pub const PROCESSING_SUFFIX: &str = ".processing.md";
pub const COMPLETED_SUFFIX: &str = ".completed.md";
pub const COMPLETED_MARKER_SUFFIX: &str = ".completed";
/// Marker named after the full record file, e.g. `backend-TASK_….md.completed`.
pub const RECORD_COMPLETED_MARKER_SUFFIX: &str = ".md.completed";

pub const DEFAULT_CONTEXT: &str = "This task is part of a larger feature implementation. Follow project conventions and ensure compatibility with related components.";

pub const ACCEPTANCE_CRITERIA: &[&str] = &[
    "Task completed successfully",
    "Code follows project standards",
    "Integrates with dependent components",
    "Includes appropriate error handling",
    "Has necessary TypeScript types",
    "Mobile-responsive (if UI component)",
];

const DIRECTIVE_HEADING: &str = "## DIRECTIVE";
const DEPENDENCIES_HEADING: &str = "## DEPENDENCIES";
const CONTEXT_HEADING: &str = "## CONTEXT";
const CRITERIA_HEADING: &str = "## ACCEPTANCE CRITERIA";
const LOG_HEADING: &str = "## EXECUTION LOG";

const SECTION_HEADINGS: &[&str] = &[
    DIRECTIVE_HEADING,
    DEPENDENCIES_HEADING,
    CONTEXT_HEADING,
    CRITERIA_HEADING,
    LOG_HEADING,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    InProgress,
    Completed,
}

impl RecordStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "PENDING",
            RecordStatus::InProgress => "IN_PROGRESS",
            RecordStatus::Completed => "COMPLETED",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "PENDING" => Some(RecordStatus::Pending),
            "IN_PROGRESS" => Some(RecordStatus::InProgress),
            "COMPLETED" => Some(RecordStatus::Completed),
            _ => None,
        }
    }

    /// Status implied by a queue file name, or `None` for files that are not records.
    pub fn from_file_name(name: &str) -> Option<Self> {
        parse_file_name(name).map(|parsed| parsed.2)
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Split a queue file name into capability, identity and status.
pub fn parse_file_name(name: &str) -> Option<(Capability, String, RecordStatus)> {
    let (stem, status) = if let Some(stem) = name.strip_suffix(PROCESSING_SUFFIX) {
        (stem, RecordStatus::InProgress)
    } else if let Some(stem) = name.strip_suffix(COMPLETED_SUFFIX) {
        (stem, RecordStatus::Completed)
    } else if let Some(stem) = name.strip_suffix(RECORD_COMPLETED_MARKER_SUFFIX) {
        (stem, RecordStatus::Completed)
    } else if let Some(stem) = name.strip_suffix(COMPLETED_MARKER_SUFFIX) {
        (stem, RecordStatus::Completed)
    } else if let Some(stem) = name.strip_suffix(RECORD_SUFFIX) {
        (stem, RecordStatus::Pending)
    } else {
        return None;
    };

    let (capability, identity) = stem.split_once('-')?;
    if !Capability::is_valid_name(capability) || !identity.starts_with("TASK_") {
        return None;
    }
    Some((Capability::new(capability), identity.to_string(), status))
}

/// One persisted subtask awaiting execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueRecord {
    /// Globally unique and lexically sortable in enqueue order.
    pub identity: String,
    pub batch_id: BatchId,
    pub subtask: Subtask,
    /// 0-based position in the ordered batch.
    pub order_index: usize,
    pub batch_size: usize,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub context: String,
}

impl QueueRecord {
    pub fn capability(&self) -> &Capability {
        &self.subtask.capability
    }

    pub fn priority_tier(&self) -> u8 {
        self.subtask.priority_tier
    }

    pub fn file_name(&self) -> String {
        format!("{}-{}{}", self.subtask.capability, self.identity, RECORD_SUFFIX)
    }

    pub fn processing_file_name(&self) -> String {
        format!("{}-{}{}", self.subtask.capability, self.identity, PROCESSING_SUFFIX)
    }

    pub fn completed_file_name(&self) -> String {
        format!("{}-{}{}", self.subtask.capability, self.identity, COMPLETED_SUFFIX)
    }

    pub fn render(&self) -> String {
        let dependencies = if self.subtask.dependencies.is_empty() {
            "None".to_string()
        } else {
            self.subtask.dependencies.join(", ")
        };

        let mut out = String::new();
        out.push_str(&format!("# {}\n", self.identity));
        out.push_str(&format!("AGENT: {}\n", self.subtask.capability.label()));
        out.push_str(&format!("SUBTASK: {}\n", self.subtask.id));
        out.push_str(&format!("BATCH: {}\n", self.batch_id));
        out.push_str(&format!("PRIORITY: P{}\n", self.subtask.priority_tier));
        out.push_str(&format!(
            "CREATED: {}\n",
            self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        ));
        out.push_str(&format!("STATUS: {}\n", self.status.label()));
        out.push_str(&format!("ORDER: {} of {}\n", self.order_index + 1, self.batch_size));

        out.push_str(&format!(
            "\n{}\n{}\n",
            DIRECTIVE_HEADING,
            escape_body(&self.subtask.description)
        ));
        out.push_str(&format!("\n{}\n{}\n", DEPENDENCIES_HEADING, dependencies));
        out.push_str(&format!("\n{}\n{}\n", CONTEXT_HEADING, escape_body(&self.context)));
        out.push_str(&format!("\n{}\n", CRITERIA_HEADING));
        for item in ACCEPTANCE_CRITERIA {
            out.push_str(&format!("- {}\n", item));
        }
        out.push_str(&format!("\n{}\n", LOG_HEADING));
        out.push_str("- Task created by Taskmaster\n");
        out.push_str(&format!(
            "- Waiting for {} agent to process...\n",
            self.subtask.capability
        ));
        out
    }

    /// Parse a rendered record. `source_name` is only used in error messages.
    pub fn parse(source_name: &str, text: &str) -> Result<Self> {
        let malformed = |reason: &str| Error::MalformedRecord {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        };

        let mut lines = text.split('\n');
        let identity = lines
            .next()
            .and_then(|l| l.strip_prefix("# "))
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .ok_or_else(|| malformed("missing identity heading"))?;

        let mut capability = None;
        let mut subtask_id = None;
        let mut batch_id = None;
        let mut priority = None;
        let mut created_at = None;
        let mut status = None;
        let mut order = None;

        for line in lines.by_ref() {
            if line.trim().is_empty() {
                break;
            }
            let Some((key, value)) = line.split_once(':') else {
                return Err(malformed(&format!("bad header line {:?}", line)));
            };
            let value = value.trim();
            match key.trim() {
                "AGENT" => capability = Some(Capability::new(value)),
                "SUBTASK" => subtask_id = Some(value.to_string()),
                "BATCH" => {
                    batch_id = Some(
                        value
                            .parse::<BatchId>()
                            .map_err(|e| malformed(&format!("bad batch id: {}", e)))?,
                    )
                }
                "PRIORITY" => {
                    priority = value.strip_prefix('P').and_then(|p| p.parse::<u8>().ok());
                    if priority.is_none() {
                        return Err(malformed(&format!("bad priority {:?}", value)));
                    }
                }
                "CREATED" => {
                    let parsed = DateTime::parse_from_rfc3339(value)
                        .map_err(|e| malformed(&format!("bad timestamp: {}", e)))?;
                    created_at = Some(parsed.with_timezone(&Utc));
                }
                "STATUS" => {
                    status = Some(
                        RecordStatus::from_label(value)
                            .ok_or_else(|| malformed(&format!("unknown status {:?}", value)))?,
                    )
                }
                "ORDER" => order = Some(parse_order(value).ok_or_else(|| malformed("bad order"))?),
                _ => {}
            }
        }

        let sections = split_sections(lines);
        let section = |heading: &str| {
            sections
                .iter()
                .find(|(h, _)| *h == heading)
                .map(|(_, body)| unescape_body(body))
        };

        let description = section(DIRECTIVE_HEADING).ok_or_else(|| malformed("missing directive"))?;
        let dependencies = match section(DEPENDENCIES_HEADING).as_deref().map(str::trim) {
            None | Some("") | Some("None") => Vec::new(),
            Some(list) => list.split(',').map(|d| d.trim().to_string()).collect(),
        };
        let context = section(CONTEXT_HEADING).unwrap_or_default();

        let capability = capability.ok_or_else(|| malformed("missing AGENT"))?;
        let (position, batch_size) = order.ok_or_else(|| malformed("missing ORDER"))?;

        Ok(Self {
            identity,
            batch_id: batch_id.ok_or_else(|| malformed("missing BATCH"))?,
            subtask: Subtask {
                id: subtask_id.ok_or_else(|| malformed("missing SUBTASK"))?,
                capability,
                priority_tier: priority.ok_or_else(|| malformed("missing PRIORITY"))?,
                description,
                dependencies,
            },
            order_index: position - 1,
            batch_size,
            status: status.ok_or_else(|| malformed("missing STATUS"))?,
            created_at: created_at.ok_or_else(|| malformed("missing CREATED"))?,
            context,
        })
    }
}

/// "3 of 7" -> (3, 7). Positions are 1-based on disk.
fn parse_order(value: &str) -> Option<(usize, usize)> {
    let (position, size) = value.split_once(" of ")?;
    let position: usize = position.trim().parse().ok()?;
    let size: usize = size.trim().parse().ok()?;
    (position >= 1 && position <= size).then_some((position, size))
}

/// Section bodies keep their lines verbatim, still escaped.
fn split_sections<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<(&'static str, Vec<&'a str>)> {
    let mut sections: Vec<(&'static str, Vec<&'a str>)> = Vec::new();
    for line in lines {
        if let Some(heading) = SECTION_HEADINGS.iter().find(|h| line.trim_end() == **h) {
            sections.push((*heading, Vec::new()));
        } else if let Some((_, body)) = sections.last_mut() {
            body.push(line);
        }
    }
    sections
}

/// Free text may contain heading-shaped lines. Any line starting with `#` or
/// `\` gets a `\` prefix so it can never open a section.
fn escape_body(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.starts_with('#') || line.starts_with('\\') {
                format!("\\{}", line)
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Inverse of [`escape_body`]. Drops the blank separator line that precedes
/// the next heading.
fn unescape_body(lines: &[&str]) -> String {
    let lines = match lines.split_last() {
        Some((last, rest)) if last.trim().is_empty() => rest,
        _ => lines,
    };
    lines
        .iter()
        .map(|line| line.strip_prefix('\\').unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n")
}
