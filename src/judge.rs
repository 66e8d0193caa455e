use crate::types::{Category, OutcomeRecord};

/// Category-specific correctness rules for a forecast label against the
/// actual outcome. Labels use the domain's Chinese terms: 单/双 (odd/even),
/// 大/小 (big/small), 杀X (exclude combination X), and A/B dual forms.
pub fn is_correct(category: Category, prediction: &str, actual: &OutcomeRecord) -> bool {
    let actual_combo = actual.combo_label();

    match category {
        Category::OddEven => {
            let target = if actual.is_odd { "单" } else { "双" };
            (prediction.contains('单') && target == "单")
                || (prediction.contains('双') && target == "双")
        }
        Category::BigSmall => {
            let target = if actual.is_big { "大" } else { "小" };
            (prediction.contains('大') && target == "大")
                || (prediction.contains('小') && target == "小")
        }
        Category::Exclusion => {
            // The excluded combination must not be the one drawn.
            let killed = if prediction.contains('杀') {
                prediction.replace('杀', "")
            } else {
                String::new()
            };
            killed != actual_combo
        }
        Category::DualCombo => {
            let head = prediction.split(':').next().unwrap_or(prediction);
            head.split('/').any(|part| part == actual_combo)
        }
    }
}
