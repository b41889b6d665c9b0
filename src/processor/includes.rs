//! Discovery of files pulled in by `include::` directives.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

static INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^include::([^\[\s][^\[]*)\[[^\]]*\][ \t]*\r?$").expect("valid regex")
});

/// List the files `source` includes, transitively, in discovery order.
///
/// Targets are resolved against the directory of the including file.
/// Remote targets and targets built from attribute references are skipped,
/// since they cannot be resolved without the processor. Each file is listed
/// once, and include cycles are cut.
pub fn scan_includes(file: &Path, source: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    seen.insert(normalize(file));

    let mut found = Vec::new();
    visit(file, source, &mut seen, &mut found);
    found
}

fn visit(file: &Path, source: &str, seen: &mut HashSet<PathBuf>, found: &mut Vec<String>) {
    let dir = file.parent().unwrap_or_else(|| Path::new(""));

    for caps in INCLUDE.captures_iter(source) {
        let target = caps[1].trim();
        if target.contains("://") || target.contains('{') {
            continue;
        }

        let path = normalize(&dir.join(target));
        if !seen.insert(path.clone()) {
            continue;
        }
        found.push(path.display().to_string());

        if let Ok(nested) = fs::read_to_string(&path) {
            visit(&path, &nested, seen, found);
        }
    }
}

/// Resolve `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
