// i18n.rs — 运行时字符串表
//
// - en / zh-Hans 内嵌于二进制；assets/i18n/<lang>.json 存在时覆盖同名键
// - 查找顺序：当前语言 -> en -> key 本身
// - tr("key") / tr_with("key", &[("name", ...)]) 替换 {name} 占位符
//
// 语言选择：--lang <code>，其次环境变量 VIEW360_LANG，默认 zh-Hans

use once_cell::sync::OnceCell;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::RwLock,
};

pub const DEFAULT_LANG: &str = "zh-Hans";
const FALLBACK_LANG: &str = "en";
const LANG_ENV: &str = "VIEW360_LANG";

const EMBEDDED: [(&str, &str); 2] = [
    ("en", include_str!("../assets/i18n/en.json")),
    ("zh-Hans", include_str!("../assets/i18n/zh-Hans.json")),
];

#[derive(Debug, Clone, Default)]
pub struct I18n {
    pub lang: String,
    map: HashMap<String, String>,
    fallback_map: HashMap<String, String>,
}

impl I18n {
    pub fn load(lang: &str) -> Self {
        let map = load_lang(lang);
        let fallback_map = if lang == FALLBACK_LANG {
            HashMap::new()
        } else {
            load_lang(FALLBACK_LANG)
        };
        Self {
            lang: lang.to_string(),
            map,
            fallback_map,
        }
    }

    pub fn get(&self, key: &str) -> String {
        self.map
            .get(key)
            .or_else(|| self.fallback_map.get(key))
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}

static I18N: OnceCell<RwLock<I18n>> = OnceCell::new();

fn parse_map(text: &str, origin: &str) -> Option<HashMap<String, String>> {
    match serde_json::from_str(text) {
        Ok(map) => Some(map),
        Err(e) => {
            log::warn!("string table {}: {}", origin, e);
            None
        }
    }
}

/// <exe_dir>/assets/i18n/<lang>.json，其次 ./assets/i18n/<lang>.json
fn find_lang_file(lang: &str) -> Option<PathBuf> {
    let file = format!("{}.json", lang);
    let mut roots = Vec::new();
    if let Some(dir) = std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf)) {
        roots.push(dir);
    }
    roots.push(PathBuf::new());

    roots
        .into_iter()
        .map(|root| root.join("assets").join("i18n").join(&file))
        .find(|p| p.exists())
}

fn load_lang(lang: &str) -> HashMap<String, String> {
    let mut map = EMBEDDED
        .iter()
        .find(|(code, _)| *code == lang)
        .and_then(|(code, text)| parse_map(text, code))
        .unwrap_or_default();

    if let Some(path) = find_lang_file(lang) {
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                if let Some(overrides) = parse_map(&text, &path.display().to_string()) {
                    log::debug!("string table override {}", path.display());
                    map.extend(overrides);
                }
            }
            Err(e) => log::warn!("read {}: {}", path.display(), e),
        }
    }

    if map.is_empty() {
        log::warn!("no strings for language {}", lang);
    }
    map
}

/// Safe to call more than once; later calls replace the table.
pub fn init(lang: impl Into<String>) {
    let table = I18n::load(&lang.into());
    if let Some(lock) = I18N.get() {
        if let Ok(mut w) = lock.write() {
            *w = table;
        }
    } else {
        let _ = I18N.set(RwLock::new(table));
    }
}

/// Localized text for `key`, or the key itself when no table has it.
pub fn tr(key: &str) -> String {
    match I18N.get().and_then(|l| l.read().ok()) {
        Some(i) => i.get(key),
        None => key.to_string(),
    }
}

/// Any placeholder not provided is kept as-is.
pub fn tr_with(key: &str, args: &[(&str, String)]) -> String {
    substitute(tr(key), args)
}

fn substitute(mut s: String, args: &[(&str, String)]) -> String {
    for (k, v) in args {
        let placeholder = format!("{{{}}}", k);
        s = s.replace(&placeholder, v);
    }
    s
}

pub fn resolve_lang_from_args() -> String {
    let mut it = std::env::args();
    while let Some(a) = it.next() {
        if a == "--lang" {
            if let Some(v) = it.next() {
                return v;
            }
        }
    }

    if let Ok(v) = std::env::var(LANG_ENV) {
        if !v.trim().is_empty() {
            return v;
        }
    }

    DEFAULT_LANG.to_string()
}
