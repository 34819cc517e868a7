//! Maps an operation's status to what the admin screen shows.

use crate::{
    OperationKind::{self, Delete, Upload},
    OperationStatus::{self, Complete, Error, Idle, InProgress, Preparing},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusIcon {
    Upload,
    Trash,
    Spinner,
    Check,
    Alert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Primary,
    Danger,
    Busy,
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusView {
    pub label: String,
    pub icon: StatusIcon,
    pub tone: StatusTone,
    pub show_progress: bool,
    pub progress: u8,
    pub controls_disabled: bool,
}

struct Row {
    kind: OperationKind,
    status: OperationStatus,
    label: &'static str,
    icon: StatusIcon,
    tone: StatusTone,
    show_progress: bool,
    busy: bool,
}

const fn row(
    kind: OperationKind,
    status: OperationStatus,
    label: &'static str,
    icon: StatusIcon,
    tone: StatusTone,
    show_progress: bool,
    busy: bool,
) -> Row {
    Row {
        kind,
        status,
        label,
        icon,
        tone,
        show_progress,
        busy,
    }
}

// `{n}` is replaced with the item count.
#[rustfmt::skip]
const TABLE: [Row; 10] = [
    row(Upload, Idle, "Upload {n} Image(s)", StatusIcon::Upload, StatusTone::Primary, false, false),
    row(Upload, Preparing, "Preparing files...", StatusIcon::Spinner, StatusTone::Busy, true, true),
    row(Upload, InProgress, "Uploading...", StatusIcon::Spinner, StatusTone::Busy, true, true),
    row(Upload, Complete, "Upload complete!", StatusIcon::Check, StatusTone::Success, true, false),
    row(Upload, Error, "Upload failed", StatusIcon::Alert, StatusTone::Failure, false, false),
    row(Delete, Idle, "Delete {n} Image(s)", StatusIcon::Trash, StatusTone::Danger, false, false),
    row(Delete, Preparing, "Deleting...", StatusIcon::Spinner, StatusTone::Busy, false, true),
    row(Delete, InProgress, "Deleting...", StatusIcon::Spinner, StatusTone::Busy, false, true),
    row(Delete, Complete, "Deleted successfully!", StatusIcon::Check, StatusTone::Success, false, false),
    row(Delete, Error, "Delete failed", StatusIcon::Alert, StatusTone::Failure, false, false),
];

/// Pure projection of `(kind, status, progress, item count)`.
///
/// Controls stay disabled while an operation runs and whenever there is
/// nothing to act on.
pub fn project(
    kind: OperationKind,
    status: OperationStatus,
    progress: u8,
    item_count: usize,
) -> StatusView {
    let row = TABLE
        .iter()
        .find(|row| row.kind == kind && row.status == status)
        .unwrap_or(&TABLE[0]);

    StatusView {
        label: row.label.replace("{n}", &item_count.to_string()),
        icon: row.icon,
        tone: row.tone,
        show_progress: row.show_progress,
        progress: if row.show_progress { progress.min(100) } else { 0 },
        controls_disabled: row.busy || item_count == 0,
    }
}

#[cfg(test)]
#[path = "tests/status_tests.rs"]
mod tests;
