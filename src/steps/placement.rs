//! Ordinal placement of a step inside a deployment process
//!
//! A new step goes, in order of precedence:
//! 1. first, when `first_step` is set
//! 2. immediately before the step named by `before_step_id`
//! 3. immediately after the step named by `after_step_id`
//! 4. at the end
//!
//! References that match no step are ignored. Updates remove the edited step
//! before placing it again; deletes only remove.

use crate::api::DeploymentStep;
use crate::schema::ResourceData;

/// Where a step should sit relative to its neighbours
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placement {
    pub first_step: bool,
    pub before_step_id: Option<String>,
    pub after_step_id: Option<String>,
}

impl Placement {
    /// Append at the end
    pub fn last() -> Self {
        Self::default()
    }

    pub fn first() -> Self {
        Self {
            first_step: true,
            ..Self::default()
        }
    }

    pub fn before(step_id: impl Into<String>) -> Self {
        Self {
            before_step_id: Some(step_id.into()),
            ..Self::default()
        }
    }

    pub fn after(step_id: impl Into<String>) -> Self {
        Self {
            after_step_id: Some(step_id.into()),
            ..Self::default()
        }
    }

    /// Read `first_step`, `before_step_id` and `after_step_id` from config
    pub fn from_data(data: &ResourceData) -> Self {
        Self {
            first_step: data.get_bool("first_step"),
            before_step_id: data.get_str_ok("before_step_id").map(str::to_string),
            after_step_id: data.get_str_ok("after_step_id").map(str::to_string),
        }
    }

    /// Describe where the step at `index` currently sits
    ///
    /// When `by_successor` is set the position is expressed as "before the
    /// next step", otherwise as "after the previous step".
    pub fn observed(steps: &[DeploymentStep], index: usize, by_successor: bool) -> Self {
        let neighbour = if by_successor {
            steps.get(index + 1)
        } else {
            index.checked_sub(1).and_then(|i| steps.get(i))
        };
        let neighbour_id = neighbour.and_then(|s| s.id.clone());

        Self {
            first_step: index == 0,
            before_step_id: if by_successor { neighbour_id.clone() } else { None },
            after_step_id: if by_successor { None } else { neighbour_id },
        }
    }

    /// Index a new step takes in `steps`
    pub fn insertion_index(&self, steps: &[DeploymentStep]) -> usize {
        if self.first_step {
            return 0;
        }

        let reference = |id: &Option<String>| {
            id.as_deref()
                .filter(|id| !id.is_empty())
                .and_then(|id| position_of(steps, id))
        };

        if let Some(index) = reference(&self.before_step_id) {
            return index;
        }
        if let Some(index) = reference(&self.after_step_id) {
            return index + 1;
        }
        steps.len()
    }
}

/// Position of the step with the given id
pub fn position_of(steps: &[DeploymentStep], step_id: &str) -> Option<usize> {
    steps.iter().position(|s| s.id.as_deref() == Some(step_id))
}

/// Insert a new step, returning its index
pub fn insert_step(
    steps: &mut Vec<DeploymentStep>,
    step: DeploymentStep,
    placement: &Placement,
) -> usize {
    let index = placement.insertion_index(steps);
    steps.insert(index, step);
    index
}

/// Remove the step with `step_id` and place `step` again, returning its index
pub fn replace_step(
    steps: &mut Vec<DeploymentStep>,
    step_id: &str,
    step: DeploymentStep,
    placement: &Placement,
) -> usize {
    remove_step(steps, step_id);
    insert_step(steps, step, placement)
}

/// Remove the step with `step_id`; returns whether anything was removed
pub fn remove_step(steps: &mut Vec<DeploymentStep>, step_id: &str) -> bool {
    let before = steps.len();
    steps.retain(|s| s.id.as_deref() != Some(step_id));
    steps.len() != before
}
