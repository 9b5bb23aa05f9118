//! # Conflict Resolution
//!
//! Turns the fixable issues of a validation run into a sequential,
//! conflict-free application plan. Issues are classified into categories by
//! message keywords, overlapping line ranges are grouped and resolved by
//! priority, and the survivors are totally ordered.
//!
//! The keyword classifier mirrors the tool's diagnostic wording and is an
//! acknowledged extension point: a rule-id based classifier can replace
//! [`FixCategory::classify`] without touching any caller.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vigil_core::types::Issue;

/// Fix categories in application order. `Unsafe` is never applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FixCategory {
    Formatting,
    Imports,
    SafeLint,
    Other,
    Unsafe,
}

const FORMATTING_KEYWORDS: &[&str] = &["format", "indent", "spacing", "semicolon", "quotes"];
const IMPORT_KEYWORDS: &[&str] = &["import", "unused", "organize"];

impl FixCategory {
    /// Classify an issue by message keywords.
    pub fn classify(issue: &Issue) -> Self {
        let message = issue.message.to_lowercase();
        if message.contains("unsafe") {
            return Self::Unsafe;
        }
        if FORMATTING_KEYWORDS.iter().any(|k| message.contains(k)) {
            return Self::Formatting;
        }
        if IMPORT_KEYWORDS.iter().any(|k| message.contains(k)) {
            return Self::Imports;
        }
        if issue.fixable {
            return Self::SafeLint;
        }
        Self::Other
    }

    /// Lower is applied earlier; `Unsafe` sorts past everything and is
    /// filtered out of plans regardless.
    pub fn priority(&self) -> u32 {
        match self {
            Self::Formatting => 1,
            Self::Imports => 2,
            Self::SafeLint => 3,
            Self::Other => 4,
            Self::Unsafe => u32::MAX,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Formatting => "formatting",
            Self::Imports => "imports",
            Self::SafeLint => "safe-lint",
            Self::Other => "other",
            Self::Unsafe => "unsafe",
        }
    }
}

/// The intent to apply one fix, derived from an issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixDescriptor {
    pub id: Uuid,
    pub category: FixCategory,
    pub priority: u32,
    /// Inclusive line range the fix touches
    pub start_line: u32,
    pub end_line: u32,
    pub issue: Issue,
}

impl FixDescriptor {
    /// Only fixable issues yield descriptors.
    pub fn from_issue(issue: &Issue) -> Option<Self> {
        if !issue.fixable {
            return None;
        }
        let category = FixCategory::classify(issue);
        Some(Self {
            id: Uuid::new_v4(),
            category,
            priority: category.priority(),
            start_line: issue.line,
            end_line: issue.line,
            issue: issue.clone(),
        })
    }

    fn overlaps(&self, other: &Self) -> bool {
        !(self.end_line < other.start_line || other.end_line < self.start_line)
    }
}

/// How a group of overlapping descriptors is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictResolution {
    SkipAll,
    KeepHighestPriority,
    ApplySequential,
}

/// A group of two or more descriptors whose line ranges intersect.
#[derive(Debug, Clone)]
pub struct FixConflict {
    pub descriptors: Vec<FixDescriptor>,
    pub resolution: ConflictResolution,
}

/// The ordered application plan.
#[derive(Debug, Clone, Default)]
pub struct FixPlan {
    /// Descriptors in application order
    pub ordered: Vec<FixDescriptor>,
    /// Conflict groups that were detected
    pub conflicts: Vec<FixConflict>,
    /// Descriptors dropped by conflict resolution or marked unsafe
    pub skipped: Vec<FixDescriptor>,
}

impl FixPlan {
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Descriptors of one category, preserving application order.
    pub fn bucket(&self, category: FixCategory) -> Vec<&FixDescriptor> {
        self.ordered
            .iter()
            .filter(|d| d.category == category)
            .collect()
    }
}

pub struct ConflictResolver;

impl ConflictResolver {
    /// Build the application plan for a set of issues.
    pub fn plan(issues: &[Issue]) -> FixPlan {
        let descriptors: Vec<FixDescriptor> =
            issues.iter().filter_map(FixDescriptor::from_issue).collect();
        Self::plan_descriptors(descriptors)
    }

    pub fn plan_descriptors(descriptors: Vec<FixDescriptor>) -> FixPlan {
        let mut skipped = Vec::new();
        let mut applicable = Vec::new();
        for descriptor in descriptors {
            if descriptor.category == FixCategory::Unsafe {
                skipped.push(descriptor);
            } else {
                applicable.push(descriptor);
            }
        }

        // Single forward scan over start-sorted descriptors; a group keeps
        // growing while the next range intersects the group's span.
        applicable.sort_by(|a, b| {
            a.start_line
                .cmp(&b.start_line)
                .then(a.end_line.cmp(&b.end_line))
                .then(a.id.cmp(&b.id))
        });

        let mut ordered = Vec::new();
        let mut conflicts = Vec::new();
        let mut group: Vec<FixDescriptor> = Vec::new();
        let mut group_end = 0u32;

        let close_group =
            |group: &mut Vec<FixDescriptor>,
             ordered: &mut Vec<FixDescriptor>,
             conflicts: &mut Vec<FixConflict>,
             skipped: &mut Vec<FixDescriptor>| {
                match group.len() {
                    0 => {}
                    1 => ordered.extend(group.pop()),
                    _ => {
                        let members = std::mem::take(group);
                        let top_priority = members
                            .iter()
                            .map(|d| d.priority)
                            .min()
                            .unwrap_or(u32::MAX);
                        let uniform = members.iter().all(|d| d.priority == top_priority);

                        let resolution = if uniform {
                            ConflictResolution::ApplySequential
                        } else {
                            ConflictResolution::KeepHighestPriority
                        };
                        conflicts.push(FixConflict {
                            descriptors: members.clone(),
                            resolution,
                        });

                        for member in members {
                            if member.priority == top_priority {
                                ordered.push(member);
                            } else {
                                skipped.push(member);
                            }
                        }
                    }
                }
            };

        for descriptor in applicable {
            let joins_group = !group.is_empty() && descriptor.start_line <= group_end;
            if joins_group {
                group_end = group_end.max(descriptor.end_line);
                group.push(descriptor);
            } else {
                close_group(&mut group, &mut ordered, &mut conflicts, &mut skipped);
                group_end = descriptor.end_line;
                group.push(descriptor);
            }
        }
        close_group(&mut group, &mut ordered, &mut conflicts, &mut skipped);

        // Deterministic total order: priority, then start line, then id.
        ordered.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.start_line.cmp(&b.start_line))
                .then(a.id.cmp(&b.id))
        });

        FixPlan {
            ordered,
            conflicts,
            skipped,
        }
    }
}
