use serde::{Deserialize, Serialize};
use std::fmt;

/// Turns message keys and parameters into text in the user's language.
pub trait Translate: Send + Sync {
    /// Look up `key` and substitute `{name}` placeholders from `params`.
    fn translate(&self, key: &str, params: &[(&str, &str)]) -> String;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    #[default]
    Zh,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::En => write!(f, "en"),
            Language::Zh => write!(f, "zh"),
        }
    }
}

// (key, english, chinese)
const MESSAGES: &[(&str, &str, &str)] = &[
    ("validation.failed", "Invalid input: {message}", "输入无效：{message}"),
    ("mutation.failed", "Could not save {field}: {message}", "保存{field}失败：{message}"),
    (
        "error.network",
        "Network unreachable, please check your connection",
        "网络连接失败，请检查网络",
    ),
    ("error.server", "Server error: {message}", "服务器错误：{message}"),
    ("list.tags", "tag", "标签"),
    ("list.empty", "No repositories match the current view.", "没有符合当前视图的仓库"),
    ("list.languages", "language", "语言"),
    ("reorder.invalid", "The new {list} order does not match the current list", "新的{list}排序与当前列表不一致"),
    ("reorder.failed", "Could not save the {list} order: {message}", "保存{list}排序失败：{message}"),
    ("reload.failed", "Could not reload data: {message}", "重新加载数据失败：{message}"),
    (
        "tag.in_use",
        "Tag '{name}' is still used by {count} repositories",
        "标签“{name}”仍被 {count} 个仓库使用",
    ),
    ("tag.blank", "Tag name cannot be empty", "标签名称不能为空"),
    ("tag.unknown", "Tag '{name}' does not exist", "标签“{name}”不存在"),
    ("tag.reserved", "Tag '{name}' cannot be deleted", "标签“{name}”不能删除"),
    ("tag.confirm_delete", "Delete tag '{name}'?", "确定删除标签“{name}”吗？"),
    ("tag.deleted", "Tag '{name}' deleted", "标签“{name}”已删除"),
    ("tag.delete_failed", "Could not delete tag '{name}': {message}", "删除标签“{name}”失败：{message}"),
    (
        "sync.done",
        "Sync finished: {added} added, {updated} updated, {removed} removed",
        "同步完成：新增 {added}，更新 {updated}，移除 {removed}",
    ),
    ("sync.failed", "Sync failed: {message}", "同步失败：{message}"),
];

/// Built-in English and Chinese message tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct Catalog {
    language: Language,
}

impl Catalog {
    pub fn new(language: Language) -> Self {
        Catalog { language }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    fn template(&self, key: &str) -> Option<&'static str> {
        MESSAGES.iter().find(|(k, _, _)| *k == key).map(|(_, en, zh)| match self.language {
            Language::En => *en,
            Language::Zh => *zh,
        })
    }
}

impl Translate for Catalog {
    fn translate(&self, key: &str, params: &[(&str, &str)]) -> String {
        let Some(template) = self.template(key) else {
            log::debug!("No message for key '{key}'");
            return key.to_string();
        };
        substitute(template, params)
    }
}

/// Replace each `{name}` with its parameter. Unknown placeholders stay.
pub fn substitute(template: &str, params: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match params.iter().find(|(k, _)| *k == name) {
                    Some((_, value)) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
