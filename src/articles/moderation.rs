//! Comment moderation rules.
//!
//! `pending` moves to `approved`, `rejected` or `flagged` by an admin action,
//! or to `flagged` automatically when reports reach the threshold. Nothing
//! moves a comment back to `pending`.

use crate::error::{Error, Result};
use crate::orm::comments::CommentStatus;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModerationAction {
    Approve,
    Reject,
    Flag,
}

impl ModerationAction {
    pub fn target(&self) -> CommentStatus {
        match self {
            ModerationAction::Approve => CommentStatus::Approved,
            ModerationAction::Reject => CommentStatus::Rejected,
            ModerationAction::Flag => CommentStatus::Flagged,
        }
    }

    /// Rejecting a comment also rejects its direct replies.
    pub fn cascades_to_replies(&self) -> bool {
        matches!(self, ModerationAction::Reject)
    }
}

impl FromStr for ModerationAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "approve" => Ok(ModerationAction::Approve),
            "reject" => Ok(ModerationAction::Reject),
            "flag" => Ok(ModerationAction::Flag),
            _ => Err(Error::validation("Invalid action")),
        }
    }
}

pub fn parse_status(s: &str) -> Result<CommentStatus> {
    match s {
        "pending" => Ok(CommentStatus::Pending),
        "approved" => Ok(CommentStatus::Approved),
        "rejected" => Ok(CommentStatus::Rejected),
        "flagged" => Ok(CommentStatus::Flagged),
        _ => Err(Error::validation("Invalid status")),
    }
}

/// Status of a newly created comment.
pub fn initial_status(require_moderation: bool) -> CommentStatus {
    if require_moderation {
        CommentStatus::Pending
    } else {
        CommentStatus::Approved
    }
}

/// Status after a new distinct report brought the count to `reports`.
/// Flags once the threshold is reached, so a comment approved after review
/// is flagged again by the next distinct report. A rejected comment stays
/// rejected.
pub fn status_after_report(current: CommentStatus, reports: u64, threshold: u64) -> CommentStatus {
    if reports >= threshold && current != CommentStatus::Rejected {
        CommentStatus::Flagged
    } else {
        current
    }
}

/// Trim and bound comment text.
pub fn normalize_content(content: &str, max_len: usize) -> Result<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(Error::validation("Comment cannot be empty"));
    }
    if content.chars().count() > max_len {
        return Err(Error::validation(format!(
            "Comment cannot exceed {} characters",
            max_len
        )));
    }
    Ok(content.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actions() {
        assert_eq!(
            "reject".parse::<ModerationAction>().unwrap().target(),
            CommentStatus::Rejected
        );
        assert!(ModerationAction::Reject.cascades_to_replies());
        assert!(!ModerationAction::Approve.cascades_to_replies());
        assert!("delete".parse::<ModerationAction>().is_err());
    }

    #[test]
    fn test_report_threshold() {
        use CommentStatus::*;
        assert_eq!(status_after_report(Approved, 2, 3), Approved);
        assert_eq!(status_after_report(Approved, 3, 3), Flagged);
        assert_eq!(status_after_report(Pending, 3, 3), Flagged);
        assert_eq!(status_after_report(Rejected, 3, 3), Rejected);
        // Approved again after review, then reported once more.
        assert_eq!(status_after_report(Approved, 4, 3), Flagged);
        assert_eq!(status_after_report(Rejected, 4, 3), Rejected);
    }

    #[test]
    fn test_initial_status() {
        assert_eq!(initial_status(true), CommentStatus::Pending);
        assert_eq!(initial_status(false), CommentStatus::Approved);
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("flagged").unwrap(), CommentStatus::Flagged);
        assert!(parse_status("deleted").is_err());
    }

    #[test]
    fn test_normalize_content() {
        assert_eq!(normalize_content("  hello ", 10).unwrap(), "hello");
        assert!(normalize_content("   ", 10).is_err());
        assert!(normalize_content("hello world", 5).is_err());
    }
}
