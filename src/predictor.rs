//! Turns a complete answer set into a fitness plan.

use std::path::Path;

use serde::Serialize;

use crate::artifacts::{FitnessModel, load_artifacts};
use crate::domain::{
    ActivityLevel, ActivityType, Allergy, Answers, CATEGORICAL_COLUMNS, Diet, FEATURE_COLUMNS,
    FitnessGoal, Gender, HealthCondition, TARGET_COLUMNS, WorkType,
};
use crate::encoder::EncoderTable;
use crate::error::{ArtifactError, PredictionError};
use crate::formulas::{calculate_bmi, truncate_output};
use crate::plan::{FitnessPlan, advisory_tips};

/// Model input in `FEATURE_COLUMNS` order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector([f64; FEATURE_COLUMNS.len()]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Returns the value of a named feature column.
    pub fn get(&self, column: &str) -> Option<f64> {
        FEATURE_COLUMNS
            .iter()
            .position(|c| *c == column)
            .map(|i| self.0[i])
    }
}

/// Read-only handle over the fitted model and encoders.
///
/// Built once at startup and shared by every session.
#[derive(Debug)]
pub struct Predictor {
    model: FitnessModel,
    encoders: EncoderTable,
}

impl Predictor {
    /// Wraps a model and its encoders, checking they fit together.
    pub fn new(model: FitnessModel, encoders: EncoderTable) -> Result<Self, ArtifactError> {
        if model.forest.n_features() != FEATURE_COLUMNS.len() {
            return Err(ArtifactError::Mismatch(format!(
                "model expects {} features, questionnaire produces {}",
                model.forest.n_features(),
                FEATURE_COLUMNS.len()
            )));
        }
        if model.forest.n_outputs() != TARGET_COLUMNS.len() {
            return Err(ArtifactError::Mismatch(format!(
                "model predicts {} outputs, expected {}",
                model.forest.n_outputs(),
                TARGET_COLUMNS.len()
            )));
        }
        if !model.feature_columns.iter().eq(FEATURE_COLUMNS.iter()) {
            return Err(ArtifactError::Mismatch(format!(
                "model feature order {:?} differs from {:?}",
                model.feature_columns, FEATURE_COLUMNS
            )));
        }
        for column in CATEGORICAL_COLUMNS {
            if encoders.get(column).is_none() {
                return Err(ArtifactError::Mismatch(format!(
                    "no encoder for column {}",
                    column
                )));
            }
        }

        Ok(Self { model, encoders })
    }

    /// Loads and checks both artifacts from a directory.
    pub fn load(dir: &Path) -> Result<Self, ArtifactError> {
        let (model, encoders) = load_artifacts(dir)?;
        Self::new(model, encoders)
    }

    pub fn model(&self) -> &FitnessModel {
        &self.model
    }

    pub fn encoders(&self) -> &EncoderTable {
        &self.encoders
    }

    /// Builds the model input from the answers.
    ///
    /// # Errors
    /// Fails if a chosen label was never seen during training.
    pub fn feature_vector(&self, answers: &Answers<'_>) -> Result<FeatureVector, PredictionError> {
        let p = answers.personal;
        let e = answers.exercise;
        let d = answers.diet;
        let g = answers.goal;

        let bmi = calculate_bmi(p.weight_kg, p.height_cm).ok_or_else(|| {
            PredictionError::InvalidInput(format!("height {} cm", p.height_cm))
        })?;

        Ok(FeatureVector([
            p.age as f64,
            self.encode(Gender::COLUMN, p.gender.label())?,
            p.height_cm,
            p.weight_kg,
            bmi,
            self.encode(ActivityLevel::COLUMN, e.activity_level.label())?,
            self.encode(ActivityType::COLUMN, e.activity_type.label())?,
            e.activity_duration as f64,
            self.encode(WorkType::COLUMN, p.work_type.label())?,
            p.sleep_hours,
            self.encode(Diet::COLUMN, d.diet.label())?,
            self.encode(Allergy::COLUMN, d.allergies.label())?,
            self.encode(HealthCondition::COLUMN, d.condition.label())?,
            self.encode(FitnessGoal::COLUMN, g.goal.label())?,
            g.target_weight_kg,
            g.timeline_days as f64,
        ]))
    }

    /// Runs the model and renders the plan.
    pub fn predict(&self, answers: &Answers<'_>) -> Result<FitnessPlan, PredictionError> {
        let features = self.feature_vector(answers)?;
        let outputs = self.model.predict(features.as_slice())?;

        let [calories, protein, exercise_minutes] = outputs[..] else {
            return Err(PredictionError::InvalidInput(format!(
                "model returned {} outputs",
                outputs.len()
            )));
        };

        let bmi = features.get("BMI").unwrap_or_default();
        let tips = advisory_tips(
            answers.goal.goal,
            answers.diet.condition,
            answers.personal.sleep_hours,
        );

        Ok(FitnessPlan::new(
            bmi,
            truncate_output(calories),
            truncate_output(protein),
            truncate_output(exercise_minutes),
            tips,
        ))
    }

    fn encode(&self, column: &str, label: &str) -> Result<f64, PredictionError> {
        Ok(self.encoders.encode(column, label)? as f64)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    use crate::dataset::load_dataset;
    use crate::dataset::tests::HEADER;
    use crate::domain::{DietInfo, Exercise, Goal, Personal};
    use crate::error::EncodeError;
    use crate::forest::ForestConfig;
    use crate::trainer::train;

    /// Synthetic CSV covering every label except Gender "Other".
    fn fixture_csv() -> String {
        let genders = [Gender::Male, Gender::Female];
        let mut csv = format!("{HEADER}\n");
        for i in 0..40usize {
            let weight = 50.0 + (i % 10) as f64 * 5.0;
            let height = 160.0 + (i % 5) as f64 * 5.0;
            let duration = 15 + (i % 4) * 15;
            let bmi = calculate_bmi(weight, height).unwrap();
            csv.push_str(&format!(
                "{age},{gender},{height},{weight},{bmi},{level},{kind},{duration},{work},{sleep},{diet},{allergy},{condition},{goal},{target},{timeline},{calories},{protein},Walk,7.5,{exercise}\n",
                age = 20 + i,
                gender = genders[i % genders.len()],
                level = ActivityLevel::all()[i % ActivityLevel::all().len()],
                kind = ActivityType::all()[i % ActivityType::all().len()],
                work = WorkType::all()[i % WorkType::all().len()],
                sleep = 5 + i % 4,
                diet = Diet::all()[i % Diet::all().len()],
                allergy = Allergy::all()[i % Allergy::all().len()],
                condition = HealthCondition::all()[i % HealthCondition::all().len()],
                goal = FitnessGoal::all()[i % FitnessGoal::all().len()],
                target = weight - 5.0,
                timeline = 30 + i,
                calories = 1500.0 + weight * 10.0,
                protein = weight * 1.6,
                exercise = duration,
            ));
        }
        csv
    }

    /// Predictor trained on the synthetic fixture.
    pub(crate) fn fixture_predictor() -> Predictor {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(fixture_csv().as_bytes()).unwrap();
        file.flush().unwrap();

        let dataset = load_dataset(file.path()).unwrap();
        let config = ForestConfig {
            n_estimators: 10,
            ..ForestConfig::default()
        };
        let report = train(&dataset, config).unwrap();
        Predictor::new(report.model, dataset.encoders).unwrap()
    }

    pub(crate) fn sample_personal() -> Personal {
        Personal {
            age: 30,
            height_cm: 175.0,
            weight_kg: 70.0,
            gender: Gender::Male,
            sleep_hours: 6.0,
            work_type: WorkType::DeskJob,
        }
    }

    pub(crate) fn sample_exercise() -> Exercise {
        Exercise {
            activity_level: ActivityLevel::Active,
            activity_type: ActivityType::Gym,
            activity_duration: 45,
        }
    }

    pub(crate) fn sample_diet() -> DietInfo {
        DietInfo {
            diet: Diet::Vegetarian,
            allergies: Allergy::None,
            condition: HealthCondition::None,
        }
    }

    pub(crate) fn sample_goal() -> Goal {
        Goal {
            goal: FitnessGoal::WeightLoss,
            target_weight_kg: 65.0,
            timeline_days: 90,
        }
    }

    #[test]
    fn test_feature_vector_order() {
        let predictor = fixture_predictor();
        let (p, e, d, g) = (sample_personal(), sample_exercise(), sample_diet(), sample_goal());
        let answers = Answers {
            personal: &p,
            exercise: &e,
            diet: &d,
            goal: &g,
        };

        let features = predictor.feature_vector(&answers).unwrap();
        let v = features.as_slice();
        let enc = predictor.encoders();

        assert_eq!(v.len(), 16);
        assert_eq!(v[0], 30.0);
        assert_eq!(v[1], enc.encode("Gender", "Male").unwrap() as f64);
        assert_eq!(v[2], 175.0);
        assert_eq!(v[3], 70.0);
        assert_eq!(v[4], 22.9);
        assert_eq!(v[5], enc.encode("Activity_Level", "Active").unwrap() as f64);
        assert_eq!(v[6], enc.encode("Activity_Type", "Gym").unwrap() as f64);
        assert_eq!(v[7], 45.0);
        assert_eq!(v[8], enc.encode("Work_Type", "Desk job").unwrap() as f64);
        assert_eq!(v[9], 6.0);
        assert_eq!(v[10], enc.encode("Diet", "Vegetarian").unwrap() as f64);
        assert_eq!(v[11], enc.encode("Allergies", "None").unwrap() as f64);
        assert_eq!(v[12], enc.encode("Health_Condition", "None").unwrap() as f64);
        assert_eq!(v[13], enc.encode("Fitness_Goal", "Weight Loss").unwrap() as f64);
        assert_eq!(v[14], 65.0);
        assert_eq!(v[15], 90.0);
        assert_eq!(features.get("BMI"), Some(22.9));
    }

    #[test]
    fn test_predict_is_deterministic() {
        let predictor = fixture_predictor();
        let (p, e, d, g) = (sample_personal(), sample_exercise(), sample_diet(), sample_goal());
        let answers = Answers {
            personal: &p,
            exercise: &e,
            diet: &d,
            goal: &g,
        };

        let first = predictor.predict(&answers).unwrap();
        let second = predictor.predict(&answers).unwrap();
        assert_eq!(first, second);

        // Independently trained predictor with the same seed agrees too
        let other = fixture_predictor().predict(&answers).unwrap();
        assert_eq!(first.calories, other.calories);
        assert_eq!(first.protein, other.protein);
        assert_eq!(first.exercise_minutes, other.exercise_minutes);
    }

    #[test]
    fn test_predict_outputs_within_training_range() {
        let predictor = fixture_predictor();
        let (p, e, d, g) = (sample_personal(), sample_exercise(), sample_diet(), sample_goal());
        let plan = predictor
            .predict(&Answers {
                personal: &p,
                exercise: &e,
                diet: &d,
                goal: &g,
            })
            .unwrap();

        // Forest outputs are averages of training targets
        assert!((2000..=2450).contains(&plan.calories));
        assert!((80..=152).contains(&plan.protein));
        assert!((15..=60).contains(&plan.exercise_minutes));
        assert_eq!(plan.bmi, 22.9);
        assert!(plan.tips.contains(&"Reduce refined carbs and do cardio".to_string()));
    }

    #[test]
    fn test_unseen_label_is_prediction_error() {
        let predictor = fixture_predictor();
        let p = Personal {
            gender: Gender::Other,
            ..sample_personal()
        };
        let (e, d, g) = (sample_exercise(), sample_diet(), sample_goal());
        let err = predictor
            .predict(&Answers {
                personal: &p,
                exercise: &e,
                diet: &d,
                goal: &g,
            })
            .unwrap_err();

        assert!(matches!(
            err,
            PredictionError::Encode(EncodeError::UnseenLabel { ref label, .. }) if label == "Other"
        ));
    }

    #[test]
    fn test_new_rejects_missing_encoder() {
        let predictor = fixture_predictor();
        let model = predictor.model().clone();
        let err = Predictor::new(model, EncoderTable::new()).unwrap_err();
        assert!(matches!(err, ArtifactError::Mismatch(_)));
    }

    #[test]
    fn test_load_from_saved_artifacts() {
        let predictor = fixture_predictor();
        let dir = tempfile::tempdir().unwrap();
        crate::artifacts::save_artifacts(dir.path(), predictor.model(), predictor.encoders())
            .unwrap();

        let loaded = Predictor::load(dir.path()).unwrap();
        assert_eq!(loaded.model(), predictor.model());
    }
}
