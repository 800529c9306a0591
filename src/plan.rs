//! Presentation of a prediction: result lines, advisory tips and chart.

use serde::Serialize;

use crate::domain::{FitnessGoal, HealthCondition};
use crate::formulas::RECOMMENDED_SLEEP_HOURS;

// === Constants ===

/// Below this many hours of sleep a recovery tip is added.
pub const SLEEP_TIP_THRESHOLD_HOURS: f64 = 7.5;

pub const CHART_TITLE: &str = "Fitness Plan Breakdown";
pub const CHART_CATEGORIES: [&str; 3] = ["Calories", "Protein (g)", "Exercise (min)"];
pub const CHART_COLORS: [&str; 3] = ["#FF6B6B", "#6BCB77", "#4D96FF"];
pub const CHART_BAR_WIDTH: f64 = 0.45;
pub const CHART_HEIGHT: u32 = 350;

/// Space added past the largest bar on the x axis.
pub const CHART_AXIS_MARGIN: i64 = 100;
pub const CHART_AXIS_DTICK: i64 = 100;

// === Data Structures ===

/// Everything shown to the user after a successful prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitnessPlan {
    pub bmi: f64,
    /// kcal per day.
    pub calories: i64,
    /// Grams per day.
    pub protein: i64,
    /// Minutes per day.
    pub exercise_minutes: i64,
    pub recommended_sleep_hours: f64,
    /// Rendered result lines.
    pub summary: Vec<String>,
    /// Non-empty advisory lines.
    pub tips: Vec<String>,
    pub chart: BarChart,
}

impl FitnessPlan {
    /// Assembles the plan from truncated model outputs and the tip inputs.
    pub fn new(
        bmi: f64,
        calories: i64,
        protein: i64,
        exercise_minutes: i64,
        tips: Vec<String>,
    ) -> Self {
        Self {
            bmi,
            calories,
            protein,
            exercise_minutes,
            recommended_sleep_hours: RECOMMENDED_SLEEP_HOURS,
            summary: summary_lines(calories, protein, exercise_minutes),
            tips,
            chart: bar_chart(calories, protein, exercise_minutes),
        }
    }
}

/// Horizontal bar chart description, consumed by the frontend renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarChart {
    pub title: String,
    /// "h" for horizontal bars.
    pub orientation: &'static str,
    pub categories: Vec<String>,
    pub values: Vec<i64>,
    pub colors: Vec<String>,
    pub bar_widths: Vec<f64>,
    pub height: u32,
    pub x_axis: ChartAxis,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartAxis {
    pub title: String,
    pub tick_mode: &'static str,
    pub dtick: i64,
    pub range: [i64; 2],
}

// === Rendering ===

/// Result lines in display order.
pub fn summary_lines(calories: i64, protein: i64, exercise_minutes: i64) -> Vec<String> {
    vec![
        format!("Calories/day: {} kcal", calories),
        format!("Protein/day: {} g", protein),
        format!("Exercise Duration: {} min/day", exercise_minutes),
        format!("Recommended Sleep: {} hrs/day", RECOMMENDED_SLEEP_HOURS),
    ]
}

/// Builds the advisory lines for a plan.
///
/// Always names the goal and gives one goal-specific recommendation. A
/// condition line appears unless the condition is "None"; a sleep line
/// appears when sleep is under 7.5 hours.
pub fn advisory_tips(
    goal: FitnessGoal,
    condition: HealthCondition,
    sleep_hours: f64,
) -> Vec<String> {
    let recommendation = match goal {
        FitnessGoal::WeightLoss => "Reduce refined carbs and do cardio",
        FitnessGoal::MuscleGain => "Increase protein intake and strength training",
        FitnessGoal::Endurance => "Focus on HIIT and stamina building",
        FitnessGoal::Maintenance => "Maintain current diet & routine",
    };

    let condition_line = (condition != HealthCondition::None)
        .then(|| format!("Manage condition: {}", condition));

    let sleep_line = (sleep_hours < SLEEP_TIP_THRESHOLD_HOURS)
        .then(|| "Increase sleep for better recovery".to_string());

    [
        Some(format!("Fitness Goal: {}", goal)),
        Some(recommendation.to_string()),
        condition_line,
        sleep_line,
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Builds the three-bar chart for calories, protein and exercise minutes.
pub fn bar_chart(calories: i64, protein: i64, exercise_minutes: i64) -> BarChart {
    let values = vec![calories, protein, exercise_minutes];
    let max = values.iter().copied().max().unwrap_or(0);

    BarChart {
        title: CHART_TITLE.to_string(),
        orientation: "h",
        categories: CHART_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        values,
        colors: CHART_COLORS.iter().map(|c| c.to_string()).collect(),
        bar_widths: vec![CHART_BAR_WIDTH; 3],
        height: CHART_HEIGHT,
        x_axis: ChartAxis {
            title: "Amount".to_string(),
            tick_mode: "linear",
            dtick: CHART_AXIS_DTICK,
            range: [0, max + CHART_AXIS_MARGIN],
        },
    }
}
