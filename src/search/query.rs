//! Search input parsing / 搜索输入解析
//!
//! Input grammar: `<search text>[:<filter>;<filter>...]`
//! - The last colon starts the case-filter list, unless it is part of a path
//!   (`C:/Users`, `D:\data`, `x: y`, `a:;b`) or is the final character
//! - Search text is further split on `;` into independent keywords

/// Characters that mark a colon as belonging to literal text / 冒号后出现这些字符时视为路径
const LITERAL_AFTER_COLON: [char; 4] = ['\\', '/', ' ', ';'];

/// Parsed search request / 解析后的搜索请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub raw_text: String,
    pub search_text: String,
    /// `None` when the input carried no filter section / 无过滤条件时为 None
    pub case_filters: Option<Vec<String>>,
    pub keywords: Vec<String>,
}

impl Query {
    /// Parse raw user input. Returns `None` only for empty input. / 解析用户输入，空输入返回 None
    pub fn parse(raw_text: &str) -> Option<Self> {
        if raw_text.is_empty() {
            return None;
        }

        let (search_text, case_filters) = match split_filters(raw_text) {
            Some((text, filters)) if filters.is_empty() => (text.to_string(), None),
            Some((text, filters)) => (text.to_string(), Some(filters)),
            None => (raw_text.to_string(), None),
        };
        let keywords = split_list(&search_text);

        Some(Self {
            raw_text: raw_text.to_string(),
            search_text,
            case_filters,
            keywords,
        })
    }

    /// Whether a filter was requested / 是否包含指定过滤条件
    pub fn has_filter(&self, name: &str) -> bool {
        self.case_filters
            .as_ref()
            .map(|filters| filters.iter().any(|f| f.eq_ignore_ascii_case(name)))
            .unwrap_or(false)
    }
}

fn split_filters(raw: &str) -> Option<(&str, Vec<String>)> {
    let idx = raw.rfind(':')?;
    let rest = &raw[idx + 1..];
    let next = rest.chars().next()?;
    if LITERAL_AFTER_COLON.contains(&next) {
        return None;
    }
    Some((&raw[..idx], split_list(rest)))
}

/// Split on `;`, trim, drop empty items / 按分号切分并去除空项
fn split_list(text: &str) -> Vec<String> {
    text.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
