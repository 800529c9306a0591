//! Domain types for questionnaire answers.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Wizard steps, in the order they are filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Personal,
    Exercise,
    Diet,
    Goal,
}

impl Step {
    /// Returns all steps in wizard order.
    pub fn all() -> &'static [Step] {
        &[Step::Personal, Step::Exercise, Step::Diet, Step::Goal]
    }

    /// Returns the 1-based position of the step.
    pub fn number(&self) -> u8 {
        match self {
            Step::Personal => 1,
            Step::Exercise => 2,
            Step::Diet => 3,
            Step::Goal => 4,
        }
    }

    /// Returns the display name for the step.
    pub fn display_name(&self) -> &'static str {
        match self {
            Step::Personal => "Personal Info",
            Step::Exercise => "Exercise Info",
            Step::Diet => "Diet Info",
            Step::Goal => "Goal Info",
        }
    }

    /// Title used by the step indicator, e.g. "1. Personal Info".
    pub fn title(&self) -> String {
        format!("{}. {}", self.number(), self.display_name())
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Declares a closed set of choices whose labels match the dataset exactly.
///
/// The unselected placeholder is deliberately not a variant: "no choice" is
/// represented as `None` by the caller.
macro_rules! choice_enum {
    (
        $(#[$meta:meta])*
        $name:ident, column = $column:literal, field = $field:literal {
            $($variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            /// Dataset column holding this category.
            pub const COLUMN: &'static str = $column;

            /// Human-readable form field name.
            pub const FIELD: &'static str = $field;

            /// Returns all variants.
            pub fn all() -> &'static [$name] {
                &[$($name::$variant),+]
            }

            /// Labels of all variants, in declaration order.
            pub fn labels() -> Vec<&'static str> {
                Self::all().iter().map(|v| v.label()).collect()
            }

            /// Returns the exact label used in the dataset.
            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok($name::$variant),)+
                    _ => Err(ValidationError::InvalidChoice {
                        field: $field,
                        value: s.to_string(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.label())
            }
        }
    };
}

choice_enum! {
    Gender, column = "Gender", field = "Gender" {
        Male => "Male",
        Female => "Female",
        Other => "Other",
    }
}

choice_enum! {
    WorkType, column = "Work_Type", field = "Work Type" {
        DeskJob => "Desk job",
        FieldWork => "Field work",
        ShiftWork => "Shift work",
        Student => "Student",
    }
}

choice_enum! {
    ActivityLevel, column = "Activity_Level", field = "Activity Level" {
        Sedentary => "Sedentary",
        LightlyActive => "Lightly Active",
        Active => "Active",
        VeryActive => "Very Active",
    }
}

choice_enum! {
    ActivityType, column = "Activity_Type", field = "Activity Type" {
        Gym => "Gym",
        Walking => "Walking",
        Yoga => "Yoga",
        Sports => "Sports",
        HomeWorkouts => "Home Workouts",
    }
}

choice_enum! {
    Diet, column = "Diet", field = "Diet" {
        Vegetarian => "Vegetarian",
        NonVegetarian => "Non-Vegetarian",
        Vegan => "Vegan",
        Keto => "Keto",
    }
}

choice_enum! {
    Allergy, column = "Allergies", field = "Allergies" {
        None => "None",
        Gluten => "Gluten",
        Dairy => "Dairy",
        Nuts => "Nuts",
        Soy => "Soy",
    }
}

choice_enum! {
    HealthCondition, column = "Health_Condition", field = "Health Condition" {
        None => "None",
        Diabetes => "Diabetes",
        Asthma => "Asthma",
        Hypertension => "Hypertension",
    }
}

choice_enum! {
    FitnessGoal, column = "Fitness_Goal", field = "Fitness Goal" {
        WeightLoss => "Weight Loss",
        MuscleGain => "Muscle Gain",
        Maintenance => "Maintenance",
        Endurance => "Endurance",
    }
}

/// Dataset columns that hold category labels, in encoder order.
pub const CATEGORICAL_COLUMNS: [&str; 8] = [
    Gender::COLUMN,
    ActivityLevel::COLUMN,
    ActivityType::COLUMN,
    WorkType::COLUMN,
    Diet::COLUMN,
    Allergy::COLUMN,
    HealthCondition::COLUMN,
    FitnessGoal::COLUMN,
];

/// Model input columns, in the exact order of the feature vector.
pub const FEATURE_COLUMNS: [&str; 16] = [
    "Age",
    Gender::COLUMN,
    "Height",
    "Weight",
    "BMI",
    ActivityLevel::COLUMN,
    ActivityType::COLUMN,
    "Activity_Duration",
    WorkType::COLUMN,
    "Sleep_Hours",
    Diet::COLUMN,
    Allergy::COLUMN,
    HealthCondition::COLUMN,
    FitnessGoal::COLUMN,
    "Target_Weight",
    "Timeline",
];

/// Model output columns.
pub const TARGET_COLUMNS: [&str; 3] = ["Calories_Intake", "Protein_Intake", "Exercise_Duration"];

/// Columns present in the dataset but never fed to the model.
pub const IGNORED_COLUMNS: [&str; 2] = ["Recommended_Exercises", "Recommended_Sleep"];

/// One select field of the questionnaire and its options.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoiceField {
    /// Key of the field in the step's draft form.
    pub name: &'static str,
    pub label: &'static str,
    pub step: Step,
    pub options: Vec<&'static str>,
}

/// Every select field, grouped by step in display order.
pub fn choice_fields() -> Vec<ChoiceField> {
    let field = |name: &'static str, label: &'static str, step: Step, options| ChoiceField {
        name,
        label,
        step,
        options,
    };

    vec![
        field("gender", Gender::FIELD, Step::Personal, Gender::labels()),
        field("work_type", WorkType::FIELD, Step::Personal, WorkType::labels()),
        field(
            "activity_level",
            ActivityLevel::FIELD,
            Step::Exercise,
            ActivityLevel::labels(),
        ),
        field(
            "activity_type",
            ActivityType::FIELD,
            Step::Exercise,
            ActivityType::labels(),
        ),
        field("diet", Diet::FIELD, Step::Diet, Diet::labels()),
        field("allergies", Allergy::FIELD, Step::Diet, Allergy::labels()),
        field(
            "condition",
            HealthCondition::FIELD,
            Step::Diet,
            HealthCondition::labels(),
        ),
        field("goal", FitnessGoal::FIELD, Step::Goal, FitnessGoal::labels()),
    ]
}

/// Validated answers from the Personal step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Personal {
    pub age: u32,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub gender: Gender,
    pub sleep_hours: f64,
    pub work_type: WorkType,
}

/// Validated answers from the Exercise step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exercise {
    pub activity_level: ActivityLevel,
    pub activity_type: ActivityType,
    /// Minutes per day.
    pub activity_duration: u32,
}

/// Validated answers from the Diet step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DietInfo {
    pub diet: Diet,
    pub allergies: Allergy,
    pub condition: HealthCondition,
}

/// Validated answers from the Goal step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Goal {
    pub goal: FitnessGoal,
    pub target_weight_kg: f64,
    /// Days to reach the target.
    pub timeline_days: u32,
}

/// The complete set of answers needed for a prediction.
#[derive(Debug, Clone, Copy)]
pub struct Answers<'a> {
    pub personal: &'a Personal,
    pub exercise: &'a Exercise,
    pub diet: &'a DietInfo,
    pub goal: &'a Goal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choice_from_str_exact_labels() {
        assert_eq!(WorkType::from_str("Desk job").unwrap(), WorkType::DeskJob);
        assert_eq!(
            ActivityType::from_str("Home Workouts").unwrap(),
            ActivityType::HomeWorkouts
        );
        assert_eq!(
            Diet::from_str("Non-Vegetarian").unwrap(),
            Diet::NonVegetarian
        );
        assert_eq!(
            FitnessGoal::from_str("Weight Loss").unwrap(),
            FitnessGoal::WeightLoss
        );
    }

    #[test]
    fn test_choice_from_str_is_case_sensitive() {
        assert!(Gender::from_str("male").is_err());
        assert!(WorkType::from_str("desk job").is_err());
        assert!(Gender::from_str(" Male").is_err());
    }

    #[test]
    fn test_choice_rejects_placeholder() {
        let err = Gender::from_str("Select").unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidChoice {
                field: "Gender",
                value: "Select".to_string()
            }
        );
    }

    #[test]
    fn test_labels_round_trip_through_from_str() {
        for goal in FitnessGoal::all() {
            assert_eq!(FitnessGoal::from_str(goal.label()).unwrap(), *goal);
        }
        for condition in HealthCondition::all() {
            assert_eq!(
                HealthCondition::from_str(&condition.to_string()).unwrap(),
                *condition
            );
        }
    }

    #[test]
    fn test_serde_uses_dataset_labels() {
        let json = serde_json::to_string(&ActivityLevel::LightlyActive).unwrap();
        assert_eq!(json, "\"Lightly Active\"");
        let parsed: Allergy = serde_json::from_str("\"None\"").unwrap();
        assert_eq!(parsed, Allergy::None);
    }

    #[test]
    fn test_choice_fields_cover_every_category() {
        let fields = choice_fields();
        assert_eq!(fields.len(), CATEGORICAL_COLUMNS.len());

        let work = fields.iter().find(|f| f.name == "work_type").unwrap();
        assert_eq!(work.label, "Work Type");
        assert_eq!(work.step, Step::Personal);
        assert_eq!(
            work.options,
            vec!["Desk job", "Field work", "Shift work", "Student"]
        );

        let condition = fields.iter().find(|f| f.name == "condition").unwrap();
        assert_eq!(condition.options[0], "None");
    }

    #[test]
    fn test_step_order_and_titles() {
        let numbers: Vec<u8> = Step::all().iter().map(|s| s.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert_eq!(Step::Exercise.title(), "2. Exercise Info");
        assert!(Step::Personal < Step::Goal);
    }

    #[test]
    fn test_feature_columns_contain_every_categorical_column() {
        for column in CATEGORICAL_COLUMNS {
            assert!(FEATURE_COLUMNS.contains(&column));
        }
        assert_eq!(FEATURE_COLUMNS.len(), 16);
    }
}
