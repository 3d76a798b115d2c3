pub mod labels;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub use labels::category_from_labels;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Games,
    Media,
    Network,
    Development,
    System,
    Productivity,
    Utility,
    Uncategorized,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Games,
        Category::Media,
        Category::Network,
        Category::Development,
        Category::System,
        Category::Productivity,
        Category::Utility,
        Category::Uncategorized,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Games => "games",
            Category::Media => "media",
            Category::Network => "network",
            Category::Development => "development",
            Category::System => "system",
            Category::Productivity => "productivity",
            Category::Utility => "utility",
            Category::Uncategorized => "uncategorized",
        }
    }

    /// Label shown by the catalog front end.
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Games => "游戏",
            Category::Media => "媒体",
            Category::Network => "网络",
            Category::Development => "开发",
            Category::System => "系统",
            Category::Productivity => "效率",
            Category::Utility => "工具",
            Category::Uncategorized => "未分类",
        }
    }

    pub fn parse(name: &str) -> Option<Category> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const NAME_WEIGHT: u32 = 3;
const DESCRIPTION_WEIGHT: u32 = 1;

// Storage keywords live under network (cloud drives) and system (local files).
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Games,
        &[
            "游戏", "game", "gaming", "休闲", "entertainment", "娱乐", "play", "player", "arcade",
            "puzzle", "rpg", "strategy",
        ],
    ),
    (
        Category::Media,
        &[
            "视频", "音乐", "video", "music", "player", "播放", "audio", "image", "图片", "photo",
            "gallery", "stream", "流媒体", "emby", "jellyfin", "plex", "movie", "电影", "tv", "电视",
        ],
    ),
    (
        Category::Network,
        &[
            "网络", "net", "browser", "浏览器", "vpn", "代理", "proxy", "连接", "connect", "wifi",
            "v2ray", "clash", "trojan", "shadowsocks", "wireguard", "frp", "ddns", "dns", "网盘",
            "drive", "cloud", "云", "nas", "webdav", "alist", "cloudreve",
        ],
    ),
    (
        Category::Development,
        &[
            "开发", "dev", "code", "编程", "program", "ide", "editor", "开发工具", "developer", "git",
            "docker", "container", "容器", "kubernetes", "k8s", "ci", "cd", "jenkins",
        ],
    ),
    (
        Category::System,
        &[
            "系统", "system", "设置", "setting", "优化", "optimize", "管理", "manager", "监控",
            "monitor", "terminal", "终端", "shell", "ssh", "admin", "管理员", "backup", "备份",
            "安全", "security", "密码", "password", "加密", "encrypt", "vault", "auth", "认证",
            "firewall", "防火墙", "antivirus", "存储", "storage", "file", "文件",
        ],
    ),
    (
        Category::Productivity,
        &[
            "办公", "office", "文档", "document", "效率", "productivity", "笔记", "note", "todo",
            "task", "calendar", "日历", "markdown", "wiki", "knowledge", "知识库",
        ],
    ),
    (
        Category::Utility,
        &[
            "工具", "utility", "计算器", "calculator", "转换", "convert", "下载", "download",
            "搜索", "search", "助手", "helper", "tool", "toolkit", "同步", "sync", "transfer",
            "传输",
        ],
    ),
];

enum KeywordMatcher {
    Word(Regex),
    Substring(&'static str),
}

impl KeywordMatcher {
    fn new(keyword: &'static str) -> Self {
        if keyword.is_ascii() {
            let pattern = format!(r"\b{}\b", regex::escape(keyword));
            match Regex::new(&pattern) {
                Ok(re) => KeywordMatcher::Word(re),
                Err(_) => KeywordMatcher::Substring(keyword),
            }
        } else {
            KeywordMatcher::Substring(keyword)
        }
    }

    fn matches(&self, text: &str) -> bool {
        match self {
            KeywordMatcher::Word(re) => re.is_match(text),
            KeywordMatcher::Substring(keyword) => text.contains(keyword),
        }
    }
}

static MATCHERS: Lazy<Vec<(Category, Vec<KeywordMatcher>)>> = Lazy::new(|| {
    CATEGORY_KEYWORDS
        .iter()
        .map(|(category, keywords)| {
            (*category, keywords.iter().map(|k| KeywordMatcher::new(k)).collect())
        })
        .collect()
});

/// Picks a category from keyword hits in the app name and description.
///
/// ASCII keywords only match whole words, so "net" does not fire on "planet".
/// Ties go to the category listed first.
pub fn classify(name: &str, description: &str) -> Category {
    if name.trim().is_empty() {
        return Category::Uncategorized;
    }

    let name = name.to_lowercase();
    let description = description.to_lowercase();

    let mut best = Category::Uncategorized;
    let mut highest = 0;

    for (category, matchers) in MATCHERS.iter() {
        let score: u32 = matchers
            .iter()
            .map(|m| {
                let mut s = 0;
                if m.matches(&name) {
                    s += NAME_WEIGHT;
                }
                if !description.is_empty() && m.matches(&description) {
                    s += DESCRIPTION_WEIGHT;
                }
                s
            })
            .sum();

        if score > highest {
            highest = score;
            best = *category;
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_outweighs_description() {
        assert_eq!(
            classify("jellyfin", "a proxy and vpn friendly server"),
            Category::Media
        );
    }

    #[test]
    fn test_word_boundaries_for_ascii_keywords() {
        assert_eq!(classify("planet", ""), Category::Uncategorized);
        assert_eq!(classify("net-tools", ""), Category::Network);
    }

    #[test]
    fn test_chinese_keywords_match_as_substrings() {
        assert_eq!(classify("超级下载器", ""), Category::Utility);
        assert_eq!(classify("app", "一个家庭影音播放中心"), Category::Media);
    }

    #[test]
    fn test_tie_keeps_earlier_category() {
        // "player" is listed under both games and media.
        assert_eq!(classify("player", ""), Category::Games);
    }

    #[test]
    fn test_empty_name_is_uncategorized() {
        assert_eq!(classify("", "video music"), Category::Uncategorized);
        assert_eq!(classify("qwerty", ""), Category::Uncategorized);
    }

    #[test]
    fn test_category_round_trips_through_name() {
        for category in Category::ALL {
            assert_eq!(Category::parse(category.as_str()), Some(category));
        }
        assert_eq!(Category::Media.display_name(), "媒体");
        assert_eq!(Category::parse("unknown"), None);
    }
}
