//! Savings goals: targets the user commits money toward through the ledger.

mod core;
mod endpoints;

pub use self::core::{
    GoalStatus, GoalView, NewGoal, SavingsGoal, create_goal, create_goal_table, current_amount,
    get_goal, list_goals, view,
};
pub(crate) use self::core::mark_deleted;
pub use endpoints::{
    CreateGoalRequest, GoalContributionRequest, contribute_to_goal_endpoint, create_goal_endpoint,
    delete_goal_endpoint, list_goals_endpoint,
};
