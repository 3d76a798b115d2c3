use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write;

use crate::models::{AppInfo, FnpackAppDetail};

static HTML_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]+>").expect("static regex compile"));

fn icon_tag(out: &mut String, icon_url: &str) {
    if !icon_url.is_empty() {
        let _ = write!(
            out,
            "<img src=\"{}\" width=\"64\" height=\"64\" alt=\"应用图标\" />\n\n",
            icon_url
        );
    }
}

pub fn failure_comment(reason: &str) -> String {
    format!("❌ **验证失败**：{}", reason)
}

pub fn validation_failure_comment(errors: &[String]) -> String {
    let list: Vec<String> = errors.iter().map(|e| format!("- {}", e)).collect();
    format!("❌ **验证失败**：应用信息存在问题\n\n{}", list.join("\n"))
}

pub fn processing_failure_comment(error: &str) -> String {
    format!("❌ **处理失败：** {}", error)
}

/// Summary posted on an accepted app submission.
pub fn app_summary_comment(app_id: &str, app_name: &str, repo_url: &str, info: &AppInfo) -> String {
    let mut out = String::from("## 📋 应用信息检查结果\n\n");
    icon_tag(&mut out, &info.icon_url);

    out.push_str("| 项目 | 信息 |\n|------|------|\n");
    let _ = writeln!(out, "| 应用ID | `{}` |", app_id);
    let _ = writeln!(out, "| 应用名称 | `{}` |", app_name);
    let _ = writeln!(out, "| 仓库URL | [{0}]({0}) |", repo_url);
    let _ = writeln!(out, "| 应用描述 | {} |", info.description);
    let _ = writeln!(out, "| 作者信息 | `{}` |", info.author);
    let _ = writeln!(out, "| 星标数/分支数 | ⭐ {} / 🍴 {} |", info.stars, info.forks);
    let _ = writeln!(
        out,
        "| 最后更新时间 | {} |",
        info.last_update.as_deref().unwrap_or("未知")
    );
    let _ = writeln!(out, "| 最新版本 | `{}` |", info.version);
    let _ = writeln!(out, "| 下载链接 | [{0}]({0}) |", info.download_url);
    let _ = writeln!(out, "| 应用分类 | `{}` |\n", info.category);

    out.push_str("✅ **应用信息验证通过！**\n\n");
    out.push_str("✅ **apps.json已成功更新！**\n\n");
    out.push_str("您的应用已合并到仓库，稍后系统将自动更新应用详细信息并在前端展示。");
    out
}

/// Summary posted on an accepted FnDepot submission, one section per app.
pub fn fnpack_summary_comment(repo_url: &str, apps: &[FnpackAppDetail]) -> String {
    let mut out = String::from("## 📋 FnPack 仓库检查结果\n\n");
    let _ = writeln!(out, "**仓库**: [{0}]({0})", repo_url);
    let _ = writeln!(out, "**应用数量**: {}\n", apps.len());

    for app in apps {
        let _ = writeln!(out, "### 📦 {}\n", app.name);
        icon_tag(&mut out, &app.icon_url);

        out.push_str("| 项目 | 信息 |\n|------|------|\n");
        let _ = writeln!(out, "| 应用Key | `{}` |", app.fnpack_app_key);
        let _ = writeln!(out, "| 应用名称 | `{}` |", app.name);
        let _ = writeln!(out, "| 版本 | `{}` |", app.version);
        let _ = writeln!(out, "| 作者 | `{}` |", app.author);
        let _ = writeln!(out, "| 分类 | `{}` |", app.category);
        if !app.download_url.is_empty() {
            let _ = writeln!(out, "| 下载链接 | [下载]({}) |", app.download_url);
        }

        // HTML does not render inside a table cell.
        if HTML_TAG_RE.is_match(&app.description) {
            let _ = write!(
                out,
                "\n**📝 应用描述**\n\n<blockquote>\n{}\n</blockquote>\n\n",
                app.description
            );
        } else {
            let _ = write!(out, "| 描述 | {} |\n\n", app.description);
        }
    }

    out.push_str("---\n\n");
    out.push_str("✅ **fnpacks.json 已成功更新！**\n\n");
    out.push_str("您的仓库已添加到列表，稍后系统将自动更新应用详细信息并在前端展示。");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_failure_lists_every_error() {
        let comment = validation_failure_comment(&["a".into(), "b".into()]);
        assert!(comment.ends_with("- a\n- b"));
    }

    #[test]
    fn test_app_summary_skips_missing_icon() {
        let info = AppInfo {
            description: "desc".into(),
            version: "1.2.0".into(),
            icon_url: String::new(),
            download_url: "https://dl/app.fpk".into(),
            screenshots: vec![],
            author: "alice".into(),
            stars: 5,
            forks: 1,
            category: "media".into(),
            last_update: None,
        };
        let comment = app_summary_comment("demo", "Demo", "https://github.com/alice/demo", &info);
        assert!(!comment.contains("<img"));
        assert!(comment.contains("| 最后更新时间 | 未知 |"));
        assert!(comment.contains("[https://dl/app.fpk](https://dl/app.fpk)"));
    }
}
