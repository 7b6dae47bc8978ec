//! The sequential approval state machine.
//!
//! `Draft → Line Manager Review → Reviewer Approval → Distributed`, with a
//! `Rejected` excursion back to `Draft`. Routing is planned up front from
//! the creator's roles and resolved line manager, then applied as a single
//! transactional bundle; decisions are validated against the memo's current
//! step before anything is written.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{DatabaseError, Error, WorkflowError};
use crate::memos::model::{ApprovalStatus, Memo, MemoStatus, MemoType, NewMemo};
use crate::memos::reference;
use crate::notify::{NewNotification, Notifier};
use crate::store::{ApprovalDecision, AuditEntry, Database, MemoBundle, NewApprovalStep};
use crate::users::model::{UserRecord, role};

/// What a freshly created memo looks like to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedMemo {
    pub id: Uuid,
    pub reference_number: String,
    pub status: MemoStatus,
}

/// Which chain position a planned step occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepKind {
    LineManager,
    Reviewer,
}

#[derive(Debug, Clone, Copy)]
struct PlannedStep {
    approver_id: Uuid,
    kind: StepKind,
}

/// The planned approval chain and the status the memo starts in.
#[derive(Debug)]
struct RoutingPlan {
    steps: Vec<PlannedStep>,
    initial_status: MemoStatus,
}

/// Plan the 0–2 approval steps for a submitted (non-draft) memo.
///
/// The line-manager step is skipped when the creator already holds the
/// Line Manager role (or no manager is resolvable); the reviewer step
/// exists only for Approval memos. The memo starts in the state of
/// whichever step comes first, or goes straight to Distributed when the
/// chain is empty.
fn plan_routing(
    creator_is_line_manager: bool,
    manager_id: Option<Uuid>,
    reviewer_id: Option<Uuid>,
    memo_type: MemoType,
) -> RoutingPlan {
    let mut steps = Vec::new();

    if !creator_is_line_manager {
        if let Some(manager_id) = manager_id {
            steps.push(PlannedStep {
                approver_id: manager_id,
                kind: StepKind::LineManager,
            });
        }
    }

    if memo_type == MemoType::Approval {
        if let Some(reviewer_id) = reviewer_id {
            steps.push(PlannedStep {
                approver_id: reviewer_id,
                kind: StepKind::Reviewer,
            });
        }
    }

    let initial_status = match steps.first().map(|s| s.kind) {
        Some(StepKind::LineManager) => MemoStatus::LineManagerReview,
        Some(StepKind::Reviewer) => MemoStatus::ReviewerApproval,
        None => MemoStatus::Distributed,
    };

    RoutingPlan {
        steps,
        initial_status,
    }
}

/// Drives memo creation, approval decisions, and acknowledgment.
pub struct WorkflowService {
    db: Arc<dyn Database>,
    notifier: Arc<Notifier>,
}

impl WorkflowService {
    pub fn new(db: Arc<dyn Database>, notifier: Arc<Notifier>) -> Self {
        Self { db, notifier }
    }

    /// The creator's line manager: the explicit assignment when present,
    /// otherwise mapped through the HR feed.
    async fn resolve_line_manager(&self, creator: &UserRecord) -> Result<Option<Uuid>, Error> {
        if let Some(manager_id) = creator.line_manager_id {
            return Ok(Some(manager_id));
        }

        let Some(hr) = self.db.get_hr_staff(&creator.staff_id).await? else {
            return Ok(None);
        };
        let Some(manager_staff_id) = hr.line_manager_staff_id else {
            return Ok(None);
        };
        Ok(self
            .db
            .get_user_by_staff_id(&manager_staff_id)
            .await?
            .map(|user| user.id))
    }

    /// Create a memo (draft or submitted) and, for submissions, set up the
    /// approval chain and notify the first approver.
    pub async fn create_memo(
        &self,
        creator_id: Uuid,
        new: NewMemo,
        is_draft: bool,
    ) -> Result<CreatedMemo, Error> {
        for (field, value) in [
            ("title", &new.title),
            ("content", &new.content),
            ("department", &new.department),
        ] {
            if value.trim().is_empty() {
                return Err(WorkflowError::InvalidField {
                    field: field.to_string(),
                    message: "must not be empty".to_string(),
                }
                .into());
            }
        }

        let creator = self.db.get_user(creator_id).await?.ok_or_else(|| {
            Error::Database(DatabaseError::NotFound {
                entity: "user".to_string(),
                id: creator_id.to_string(),
            })
        })?;
        let roles = self.db.get_user_roles(creator_id).await?;
        let is_line_manager = roles.iter().any(|r| r == role::LINE_MANAGER);

        let plan = if is_draft {
            RoutingPlan {
                steps: Vec::new(),
                initial_status: MemoStatus::Draft,
            }
        } else {
            let manager_id = if is_line_manager {
                None
            } else {
                self.resolve_line_manager(&creator).await?
            };
            let reviewer_id = if new.memo_type == MemoType::Approval {
                self.db
                    .list_users_with_role(role::REVIEWER)
                    .await?
                    .first()
                    .map(|reviewer| reviewer.id)
            } else {
                None
            };
            plan_routing(is_line_manager, manager_id, reviewer_id, new.memo_type)
        };

        // Reference numbers are unique; a concurrent submission for the same
        // year + department can race the sequence, so mint once more on a
        // constraint failure.
        let mut attempt = 0;
        loop {
            let reference_number = reference::generate(&*self.db, &new.department).await?;
            let now = Utc::now();
            let memo = Memo {
                id: Uuid::new_v4(),
                reference_number: reference_number.clone(),
                title: new.title.clone(),
                content: new.content.clone(),
                department: new.department.clone(),
                category: new.category.clone(),
                priority: new.priority.unwrap_or(crate::memos::model::MemoPriority::Medium),
                memo_type: new.memo_type,
                status: plan.initial_status,
                expiry_date: new.expiry_date,
                created_by: creator_id,
                created_at: now,
                updated_at: now,
            };

            let notifications = match plan.steps.first() {
                Some(first) => vec![NewNotification::new(
                    first.approver_id,
                    memo.id,
                    format!("A new memo \"{}\" requires your review.", memo.title),
                )],
                None => Vec::new(),
            };

            let audit = AuditEntry::new(creator_id, "CREATE_MEMO", "memos", memo.id).with_value(
                serde_json::json!({
                    "reference_number": memo.reference_number,
                    "status": memo.status.as_str(),
                }),
            );

            let bundle = MemoBundle {
                memo,
                attachments: new.attachments.clone(),
                recipients: new.recipient_ids.clone(),
                approvals: plan
                    .steps
                    .iter()
                    .enumerate()
                    .map(|(i, step)| NewApprovalStep {
                        approver_id: step.approver_id,
                        step_order: i as i64 + 1,
                    })
                    .collect(),
                notifications,
                audit,
            };

            match self.db.insert_memo_bundle(&bundle).await {
                Ok(()) => {
                    info!(
                        memo_id = %bundle.memo.id,
                        reference = %bundle.memo.reference_number,
                        status = bundle.memo.status.as_str(),
                        steps = bundle.approvals.len(),
                        "Memo created"
                    );
                    self.notifier.dispatch(&bundle.notifications).await;
                    return Ok(CreatedMemo {
                        id: bundle.memo.id,
                        reference_number: bundle.memo.reference_number,
                        status: bundle.memo.status,
                    });
                }
                Err(DatabaseError::Constraint(_)) if attempt == 0 => {
                    attempt += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Validate that `approval_id` is the memo's current, pending step and
    /// that `actor_id` owns it. Returns the step's order.
    fn validate_current_step(
        &self,
        memo: &Memo,
        approvals: &[crate::store::ApprovalView],
        approval_id: Uuid,
        actor_id: Uuid,
    ) -> Result<i64, Error> {
        if !matches!(
            memo.status,
            MemoStatus::LineManagerReview | MemoStatus::ReviewerApproval
        ) {
            return Err(WorkflowError::InvalidState {
                id: memo.id,
                status: memo.status.as_str().to_string(),
            }
            .into());
        }

        let step = approvals
            .iter()
            .find(|a| a.approval.id == approval_id)
            .ok_or(WorkflowError::StepNotFound {
                id: approval_id,
                memo_id: memo.id,
            })?;

        if step.approval.status != ApprovalStatus::Pending {
            return Err(WorkflowError::StepAlreadyDecided {
                id: approval_id,
                status: step.approval.status.as_str().to_string(),
            }
            .into());
        }
        if step.approval.approver_id != actor_id {
            return Err(WorkflowError::NotYourTurn {
                id: approval_id,
                user_id: actor_id,
            }
            .into());
        }
        if approvals.iter().any(|a| {
            a.approval.step_order < step.approval.step_order
                && a.approval.status != ApprovalStatus::Approved
        }) {
            return Err(WorkflowError::NotCurrentStep { id: approval_id }.into());
        }

        Ok(step.approval.step_order)
    }

    /// Approve the current step. Advances the memo to the next approver, or
    /// distributes it and notifies the creator plus every recipient.
    pub async fn approve_memo(
        &self,
        actor_id: Uuid,
        memo_id: Uuid,
        approval_id: Uuid,
    ) -> Result<MemoStatus, Error> {
        let detail = self
            .db
            .get_memo_with_creator(memo_id)
            .await?
            .ok_or(WorkflowError::MemoNotFound { id: memo_id })?;
        let approvals = self.db.list_approvals(memo_id).await?;
        let step_order =
            self.validate_current_step(&detail.memo, &approvals, approval_id, actor_id)?;

        let next = approvals
            .iter()
            .filter(|a| {
                a.approval.status == ApprovalStatus::Pending && a.approval.step_order > step_order
            })
            .min_by_key(|a| a.approval.step_order);

        let (new_status, notifications) = match next {
            Some(next) => (
                MemoStatus::ReviewerApproval,
                vec![NewNotification::new(
                    next.approval.approver_id,
                    memo_id,
                    format!(
                        "{}'s memo \"{}\" has been reviewed. Your final decision is required.",
                        detail.creator_name, detail.memo.title
                    ),
                )],
            ),
            None => {
                let mut notifications = vec![NewNotification::new(
                    detail.memo.created_by,
                    memo_id,
                    format!(
                        "Your memo \"{}\" has been fully approved and distributed.",
                        detail.memo.title
                    ),
                )];
                for recipient in self.db.list_recipients(memo_id).await? {
                    notifications.push(NewNotification::new(
                        recipient.recipient.recipient_id,
                        memo_id,
                        format!(
                            "New internal memo: \"{}\" has been distributed.",
                            detail.memo.title
                        ),
                    ));
                }
                (MemoStatus::Distributed, notifications)
            }
        };

        let decision = ApprovalDecision {
            memo_id,
            approval_id,
            status: ApprovalStatus::Approved,
            comments: None,
            new_memo_status: new_status,
            notifications,
            audit: AuditEntry::new(actor_id, "APPROVE_MEMO", "memo_approvals", approval_id),
        };
        self.db.apply_approval_decision(&decision).await?;

        info!(
            memo_id = %memo_id,
            approval_id = %approval_id,
            new_status = new_status.as_str(),
            "Memo approved"
        );
        self.notifier.dispatch(&decision.notifications).await;
        Ok(new_status)
    }

    /// Reject the current step with comments and reset the memo to Draft.
    pub async fn reject_memo(
        &self,
        actor_id: Uuid,
        memo_id: Uuid,
        approval_id: Uuid,
        comments: Option<String>,
    ) -> Result<(), Error> {
        let detail = self
            .db
            .get_memo_with_creator(memo_id)
            .await?
            .ok_or(WorkflowError::MemoNotFound { id: memo_id })?;
        let approvals = self.db.list_approvals(memo_id).await?;
        self.validate_current_step(&detail.memo, &approvals, approval_id, actor_id)?;

        let decision = ApprovalDecision {
            memo_id,
            approval_id,
            status: ApprovalStatus::Rejected,
            comments: Some(comments.unwrap_or_else(|| "No comments".to_string())),
            new_memo_status: MemoStatus::Draft,
            notifications: vec![NewNotification::new(
                detail.memo.created_by,
                memo_id,
                format!(
                    "Your memo \"{}\" was rejected by the review committee.",
                    detail.memo.title
                ),
            )],
            audit: AuditEntry::new(actor_id, "REJECT_MEMO", "memo_approvals", approval_id),
        };
        self.db.apply_approval_decision(&decision).await?;

        info!(memo_id = %memo_id, approval_id = %approval_id, "Memo rejected");
        self.notifier.dispatch(&decision.notifications).await;
        Ok(())
    }

    /// Recipient-side terminal action: stamp the acknowledgment and tell
    /// the creator. Independent of the approval chain.
    pub async fn acknowledge_memo(
        &self,
        actor_id: Uuid,
        actor_name: &str,
        memo_id: Uuid,
    ) -> Result<(), Error> {
        let memo = self
            .db
            .get_memo(memo_id)
            .await?
            .ok_or(WorkflowError::MemoNotFound { id: memo_id })?;

        let notification = NewNotification::new(
            memo.created_by,
            memo_id,
            format!("{actor_name} has acknowledged your memo \"{}\".", memo.title),
        );
        let updated = self
            .db
            .acknowledge_recipient(memo_id, actor_id, &notification)
            .await?;
        if !updated {
            return Err(WorkflowError::NotARecipient {
                memo_id,
                user_id: actor_id,
            }
            .into());
        }

        info!(memo_id = %memo_id, recipient = %actor_id, "Memo acknowledged");
        self.notifier.dispatch(&[notification]).await;
        Ok(())
    }

    /// Stamp the caller's read receipt. A no-op when already read or not a
    /// recipient.
    pub async fn mark_read(&self, actor_id: Uuid, memo_id: Uuid) -> Result<(), Error> {
        self.db.mark_recipient_read(memo_id, actor_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> Uuid {
        Uuid::new_v4()
    }

    #[test]
    fn staff_approval_memo_routes_through_both_steps() {
        let manager = id();
        let reviewer = id();
        let plan = plan_routing(false, Some(manager), Some(reviewer), MemoType::Approval);

        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].approver_id, manager);
        assert_eq!(plan.steps[0].kind, StepKind::LineManager);
        assert_eq!(plan.steps[1].approver_id, reviewer);
        assert_eq!(plan.initial_status, MemoStatus::LineManagerReview);
    }

    #[test]
    fn line_manager_creator_skips_their_own_step() {
        let reviewer = id();
        let plan = plan_routing(true, None, Some(reviewer), MemoType::Approval);

        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].kind, StepKind::Reviewer);
        assert_eq!(plan.initial_status, MemoStatus::ReviewerApproval);
    }

    #[test]
    fn informational_memo_skips_the_reviewer() {
        let manager = id();
        // Reviewer available but irrelevant for informational memos.
        let plan = plan_routing(false, Some(manager), Some(id()), MemoType::Informational);

        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].kind, StepKind::LineManager);
        assert_eq!(plan.initial_status, MemoStatus::LineManagerReview);
    }

    #[test]
    fn unroutable_memo_distributes_immediately() {
        let plan = plan_routing(false, None, None, MemoType::Informational);
        assert!(plan.steps.is_empty());
        assert_eq!(plan.initial_status, MemoStatus::Distributed);
    }

    #[test]
    fn missing_manager_starts_at_the_reviewer_step() {
        let reviewer = id();
        let plan = plan_routing(false, None, Some(reviewer), MemoType::Approval);

        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].kind, StepKind::Reviewer);
        assert_eq!(plan.initial_status, MemoStatus::ReviewerApproval);
    }
}
