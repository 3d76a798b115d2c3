use super::Category;

/// Maps the first comma-separated fnpack label onto a catalog category.
/// Unknown labels fall back to `Utility`; a blank label string yields `None`.
pub fn category_from_labels(labels: &str) -> Option<Category> {
    if labels.trim().is_empty() {
        return None;
    }
    let first = labels.split(',').next().unwrap_or_default().trim().to_lowercase();

    let category = match first.as_str() {
        "工具" => Category::Utility,
        "终端" => Category::System,
        "开发" => Category::Development,
        "游戏" => Category::Games,
        "媒体" => Category::Media,
        "网络" => Category::Network,
        "办公" => Category::Productivity,
        "系统" => Category::System,
        "教育" => Category::Productivity,
        "社交" => Category::Network,
        "娱乐" => Category::Games,
        _ => Category::Utility,
    };

    Some(category)
}
