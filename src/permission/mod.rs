//! Role and ownership policy.
//!
//! Three roles and a flat rule table: some actions belong to admins, some to
//! the resource owner (or an admin), the rest to anyone signed in.

use crate::orm::users::Role;

/// Everything a signed-in user may attempt that the policy has an opinion on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// Create, edit, delete and link courses and professors.
    ManageCatalog,
    /// Approve, reject and list pending reviews.
    ModerateReviews,
    /// List, read and transition reports.
    ManageReports,
    ViewStats,
    /// Activate and deactivate accounts.
    ManageUsers,
    EditReview,
    DeleteReview,
    DeleteComment,
    SubmitReview,
    SubmitComment,
    ToggleLike,
    SubmitReport,
}

/// Who an action is reserved for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gate {
    Admin,
    OwnerOrAdmin,
    Authenticated,
}

impl Action {
    pub fn gate(self) -> Gate {
        match self {
            Action::ManageCatalog
            | Action::ModerateReviews
            | Action::ManageReports
            | Action::ViewStats
            | Action::ManageUsers => Gate::Admin,
            Action::EditReview | Action::DeleteReview | Action::DeleteComment => {
                Gate::OwnerOrAdmin
            }
            Action::SubmitReview
            | Action::SubmitComment
            | Action::ToggleLike
            | Action::SubmitReport => Gate::Authenticated,
        }
    }
}

/// Decide whether `role` may perform `action`. `is_owner` only matters for
/// owner-gated actions.
pub fn is_permitted(role: Role, action: Action, is_owner: bool) -> bool {
    match action.gate() {
        Gate::Admin => role == Role::Admin,
        Gate::OwnerOrAdmin => is_owner || role == Role::Admin,
        Gate::Authenticated => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Action; 12] = [
        Action::ManageCatalog,
        Action::ModerateReviews,
        Action::ManageReports,
        Action::ViewStats,
        Action::ManageUsers,
        Action::EditReview,
        Action::DeleteReview,
        Action::DeleteComment,
        Action::SubmitReview,
        Action::SubmitComment,
        Action::ToggleLike,
        Action::SubmitReport,
    ];

    #[test]
    fn test_admin_may_do_everything() {
        for action in ALL {
            assert!(is_permitted(Role::Admin, action, false), "{:?}", action);
        }
    }

    #[test]
    fn test_admin_actions_denied_to_others() {
        for role in [Role::Student, Role::Professor] {
            for action in ALL.iter().filter(|a| a.gate() == Gate::Admin) {
                assert!(!is_permitted(role, *action, false));
                // Owning something never grants admin actions.
                assert!(!is_permitted(role, *action, true));
            }
        }
    }

    #[test]
    fn test_owner_actions() {
        assert!(is_permitted(Role::Student, Action::EditReview, true));
        assert!(!is_permitted(Role::Student, Action::EditReview, false));
        assert!(is_permitted(Role::Professor, Action::DeleteComment, true));
        assert!(!is_permitted(Role::Professor, Action::DeleteReview, false));
    }

    #[test]
    fn test_authenticated_actions() {
        for role in [Role::Student, Role::Professor, Role::Admin] {
            assert!(is_permitted(role, Action::SubmitReview, false));
            assert!(is_permitted(role, Action::ToggleLike, false));
            assert!(is_permitted(role, Action::SubmitReport, false));
            assert!(is_permitted(role, Action::SubmitComment, false));
        }
    }
}
