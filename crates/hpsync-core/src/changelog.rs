//! Release notes from `CHANGELOG.md`.

use std::path::Path;

use hpsync_schema::Version;

/// The changelog section for `tag`.
///
/// The file is split at `## ` headers. The section whose header starts with
/// `## <tag>`, `## v<ver>` or `## <ver>` wins; otherwise the first section;
/// otherwise the whole text. A marker must end at a word boundary, so
/// `## 3.3.5` does not select `## 3.3.50`.
pub fn extract_notes(content: &str, tag: &str) -> String {
    let mut sections: Vec<(&str, Vec<&str>)> = Vec::new();
    for line in content.lines() {
        if line.starts_with("## ") {
            sections.push((line.trim(), vec![line]));
        } else if let Some((_, lines)) = sections.last_mut() {
            lines.push(line);
        }
    }

    let bare = tag.trim_start_matches('v');
    let markers = [format!("## {tag}"), format!("## v{bare}"), format!("## {bare}")];

    let chosen = sections
        .iter()
        .find(|(header, _)| markers.iter().any(|m| header_matches(header, m)))
        .or_else(|| sections.first());

    match chosen {
        Some((_, lines)) => lines.join("\n").trim().to_string(),
        None => content.trim().to_string(),
    }
}

fn header_matches(header: &str, marker: &str) -> bool {
    header
        .strip_prefix(marker)
        .is_some_and(|rest| !rest.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '.'))
}

/// Notes for `tag` from the changelog at `path`; `""` if the file is absent.
///
/// # Errors
///
/// Propagates read errors other than a missing file.
pub async fn load_notes(path: &Path, tag: &str) -> std::io::Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(extract_notes(&content, tag)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e),
    }
}

/// Body used when the changelog has nothing for this release.
pub fn default_body(version: Version) -> String {
    format!("hp {version} release")
}
