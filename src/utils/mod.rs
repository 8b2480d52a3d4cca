use url::Url;

/// 将页面内的相对链接转换为绝对地址
pub fn to_absolute_url(base: &Url, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() {
        return String::new();
    }

    if let Some(path_without_slashes) = href.strip_prefix("//") {
        return format!("{}://{}", base.scheme(), path_without_slashes);
    }

    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }

    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// URL 路径中的非空片段
pub fn path_segments(url: &str) -> Vec<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .map(|segs| segs.filter(|s| !s.is_empty()).map(str::to_string).collect())
        })
        .unwrap_or_default()
}
