//! Four-step questionnaire state machine.
//!
//! Each state carries the validated answers of every earlier step, so the
//! goal step cannot be reached without personal, exercise and diet data.
//! Submissions are drafts: every field is optional until validated.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{Answers, DietInfo, Exercise, Goal, Personal, Step};
use crate::error::{GoalError, ValidationError};
use crate::plan::FitnessPlan;
use crate::predictor::Predictor;

/// Placeholder a select widget reports before the user picks a value.
pub const UNSELECTED: &str = "Select";

// === Field limits ===

pub const AGE_RANGE: (f64, f64) = (10.0, 100.0);
pub const HEIGHT_CM_RANGE: (f64, f64) = (100.0, 250.0);
pub const WEIGHT_KG_RANGE: (f64, f64) = (30.0, 200.0);
pub const MIN_SLEEP_HOURS: f64 = 0.0;
pub const MIN_TARGET_WEIGHT_KG: f64 = 30.0;
pub const MIN_TIMELINE_DAYS: f64 = 1.0;
pub const MIN_ACTIVITY_MINUTES: f64 = 0.0;

// === Drafts ===

/// Raw Personal step submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonalForm {
    pub age: Option<f64>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub gender: Option<String>,
    pub sleep_hours: Option<f64>,
    pub work_type: Option<String>,
}

impl PersonalForm {
    /// Checks completeness, then ranges and choices.
    pub fn validate(&self) -> Result<Personal, ValidationError> {
        let step = Step::Personal;
        let (Some(age), Some(height), Some(weight), Some(sleep_hours)) =
            (self.age, self.height, self.weight, self.sleep_hours)
        else {
            return Err(ValidationError::Incomplete { step });
        };
        if !is_selected(&self.gender) || !is_selected(&self.work_type) {
            return Err(ValidationError::Incomplete { step });
        }

        Ok(Personal {
            age: whole_number("Age", in_range("Age", age, AGE_RANGE)?)?,
            height_cm: in_range("Height", height, HEIGHT_CM_RANGE)?,
            weight_kg: in_range("Weight", weight, WEIGHT_KG_RANGE)?,
            gender: choice(&self.gender, step)?,
            sleep_hours: at_least("Sleep Hours", sleep_hours, MIN_SLEEP_HOURS)?,
            work_type: choice(&self.work_type, step)?,
        })
    }
}

/// Raw Exercise step submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExerciseForm {
    pub activity_level: Option<String>,
    pub activity_type: Option<String>,
    pub activity_duration: Option<f64>,
}

impl ExerciseForm {
    pub fn validate(&self) -> Result<Exercise, ValidationError> {
        let step = Step::Exercise;
        let Some(activity_duration) = self.activity_duration else {
            return Err(ValidationError::Incomplete { step });
        };
        if !is_selected(&self.activity_level) || !is_selected(&self.activity_type) {
            return Err(ValidationError::Incomplete { step });
        }

        Ok(Exercise {
            activity_level: choice(&self.activity_level, step)?,
            activity_type: choice(&self.activity_type, step)?,
            activity_duration: whole_number(
                "Activity Duration",
                at_least("Activity Duration", activity_duration, MIN_ACTIVITY_MINUTES)?,
            )?,
        })
    }
}

/// Raw Diet step submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DietForm {
    pub diet: Option<String>,
    pub allergies: Option<String>,
    pub condition: Option<String>,
}

impl DietForm {
    pub fn validate(&self) -> Result<DietInfo, ValidationError> {
        let step = Step::Diet;
        if ![&self.diet, &self.allergies, &self.condition]
            .into_iter()
            .all(is_selected)
        {
            return Err(ValidationError::Incomplete { step });
        }

        Ok(DietInfo {
            diet: choice(&self.diet, step)?,
            allergies: choice(&self.allergies, step)?,
            condition: choice(&self.condition, step)?,
        })
    }
}

/// Raw Goal step submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoalForm {
    pub goal: Option<String>,
    pub target_weight: Option<f64>,
    pub timeline: Option<f64>,
}

impl GoalForm {
    pub fn validate(&self) -> Result<Goal, ValidationError> {
        let step = Step::Goal;
        let (Some(target_weight), Some(timeline)) = (self.target_weight, self.timeline) else {
            return Err(ValidationError::Incomplete { step });
        };
        if !is_selected(&self.goal) {
            return Err(ValidationError::Incomplete { step });
        }

        Ok(Goal {
            goal: choice(&self.goal, step)?,
            target_weight_kg: at_least("Target Weight", target_weight, MIN_TARGET_WEIGHT_KG)?,
            timeline_days: whole_number(
                "Timeline",
                at_least("Timeline", timeline, MIN_TIMELINE_DAYS)?,
            )?,
        })
    }
}

// === State machine ===

/// Where a session is in the questionnaire.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Wizard {
    #[default]
    Personal,
    Exercise {
        personal: Personal,
    },
    Diet {
        personal: Personal,
        exercise: Exercise,
    },
    Goal {
        personal: Personal,
        exercise: Exercise,
        diet: DietInfo,
        /// Goal answers of the last successful plan.
        goal: Option<Goal>,
    },
}

/// Display state of one entry in the step indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Completed,
    Active,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepProgress {
    pub step: Step,
    pub title: String,
    pub status: StepStatus,
}

impl Wizard {
    /// Starts a fresh questionnaire at the Personal step.
    pub fn new() -> Self {
        Self::default()
    }

    /// The step currently accepting submissions.
    pub fn step(&self) -> Step {
        match self {
            Wizard::Personal => Step::Personal,
            Wizard::Exercise { .. } => Step::Exercise,
            Wizard::Diet { .. } => Step::Diet,
            Wizard::Goal { .. } => Step::Goal,
        }
    }

    /// 1-based step cursor.
    pub fn cursor(&self) -> u8 {
        self.step().number()
    }

    pub fn submit_personal(&mut self, form: &PersonalForm) -> Result<(), ValidationError> {
        match self {
            Wizard::Personal => {
                let personal = form.validate()?;
                *self = Wizard::Exercise { personal };
                Ok(())
            }
            other => Err(wrong_step(other, Step::Personal)),
        }
    }

    pub fn submit_exercise(&mut self, form: &ExerciseForm) -> Result<(), ValidationError> {
        match self {
            Wizard::Exercise { personal } => {
                let exercise = form.validate()?;
                *self = Wizard::Diet {
                    personal: personal.clone(),
                    exercise,
                };
                Ok(())
            }
            other => Err(wrong_step(other, Step::Exercise)),
        }
    }

    pub fn submit_diet(&mut self, form: &DietForm) -> Result<(), ValidationError> {
        match self {
            Wizard::Diet { personal, exercise } => {
                let diet = form.validate()?;
                *self = Wizard::Goal {
                    personal: personal.clone(),
                    exercise: exercise.clone(),
                    diet,
                    goal: None,
                };
                Ok(())
            }
            other => Err(wrong_step(other, Step::Diet)),
        }
    }

    /// Validates the goal answers and computes the plan.
    ///
    /// The wizard stays on the Goal step either way; only a successful
    /// prediction records the goal answers.
    pub fn submit_goal(
        &mut self,
        form: &GoalForm,
        predictor: &Predictor,
    ) -> Result<FitnessPlan, GoalError> {
        match self {
            Wizard::Goal {
                personal,
                exercise,
                diet,
                goal,
            } => {
                let validated = form.validate()?;
                let plan = predictor.predict(&Answers {
                    personal,
                    exercise,
                    diet,
                    goal: &validated,
                })?;
                *goal = Some(validated);
                Ok(plan)
            }
            other => Err(wrong_step(other, Step::Goal).into()),
        }
    }

    /// Step indicator entries in order.
    pub fn progress(&self) -> Vec<StepProgress> {
        let current = self.step();
        Step::all()
            .iter()
            .map(|&step| StepProgress {
                step,
                title: step.title(),
                status: if step < current {
                    StepStatus::Completed
                } else if step == current {
                    StepStatus::Active
                } else {
                    StepStatus::Pending
                },
            })
            .collect()
    }

    pub fn personal(&self) -> Option<&Personal> {
        match self {
            Wizard::Personal => None,
            Wizard::Exercise { personal }
            | Wizard::Diet { personal, .. }
            | Wizard::Goal { personal, .. } => Some(personal),
        }
    }

    pub fn exercise(&self) -> Option<&Exercise> {
        match self {
            Wizard::Diet { exercise, .. } | Wizard::Goal { exercise, .. } => Some(exercise),
            _ => None,
        }
    }

    pub fn diet(&self) -> Option<&DietInfo> {
        match self {
            Wizard::Goal { diet, .. } => Some(diet),
            _ => None,
        }
    }

    pub fn goal(&self) -> Option<&Goal> {
        match self {
            Wizard::Goal { goal, .. } => goal.as_ref(),
            _ => None,
        }
    }
}

// === Helper Functions ===

fn wrong_step(wizard: &Wizard, submitted: Step) -> ValidationError {
    ValidationError::WrongStep {
        current: wizard.step(),
        submitted,
    }
}

fn is_selected(value: &Option<String>) -> bool {
    match value.as_deref() {
        None => false,
        Some(s) => !s.trim().is_empty() && s != UNSELECTED,
    }
}

/// Parses a select value; callers have already checked it is selected.
fn choice<T>(value: &Option<String>, step: Step) -> Result<T, ValidationError>
where
    T: FromStr<Err = ValidationError>,
{
    value
        .as_deref()
        .ok_or(ValidationError::Incomplete { step })?
        .parse()
}

fn in_range(field: &'static str, value: f64, (min, max): (f64, f64)) -> Result<f64, ValidationError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(value)
    } else {
        Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

fn at_least(field: &'static str, value: f64, min: f64) -> Result<f64, ValidationError> {
    if value.is_finite() && value >= min {
        Ok(value)
    } else {
        Err(ValidationError::BelowMinimum { field, value, min })
    }
}

/// Accepts finite non-negative integral values, as sent by number inputs.
fn whole_number(field: &'static str, value: f64) -> Result<u32, ValidationError> {
    if value.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&value) {
        Ok(value as u32)
    } else {
        Err(ValidationError::NotWholeNumber { field, value })
    }
}
