use crate::models::MarketProbabilities;

/// Gap kept between adjacent goal lines when one has to be pulled down.
pub const GOAL_LINE_EPSILON: f64 = 0.01;

/// Forces `over1.5 >= over2.5 >= over3.5`.
///
/// Independent classifiers can disagree with each other; a higher line is never allowed to be
/// more likely than a lower one. Only ever lowers the higher line, then refreshes the unders.
pub fn calibrate_goal_lines(probs: &mut MarketProbabilities, epsilon: f64) {
    if probs.over35 > probs.over25 {
        probs.over35 = pull_below(probs.over25, epsilon);
    }
    if probs.over25 > probs.over15 {
        probs.over25 = pull_below(probs.over15, epsilon);
    }
    // over2.5 may have just dropped under over3.5 again
    if probs.over35 > probs.over25 {
        probs.over35 = pull_below(probs.over25, epsilon);
    }

    probs.under15 = 1.0 - probs.over15;
    probs.under25 = 1.0 - probs.over25;
    probs.under35 = 1.0 - probs.over35;
}

fn pull_below(ceiling: f64, epsilon: f64) -> f64 {
    (ceiling - epsilon).max(0.0)
}
