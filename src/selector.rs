//! Context-file selection: walk a project tree, filter out noise, score the
//! survivors, and greedily pack the best files into a bounded bundle for the
//! model prompt.

use crate::config::SelectionConfig;
use colored::Colorize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Raw bytes sampled from a file head for encoding detection.
const ENCODING_SNIFF_BYTES: usize = 10 * 1024;

/// Fallback priority for files matching no table entry.
const DEFAULT_PRIORITY: i32 = 99;

#[derive(Debug, Error)]
pub enum SelectError {
    #[error("scan path does not exist or is not a directory: {0}")]
    InvalidScanPath(PathBuf),
}

/// One file that survived filtering, before content is read.
#[derive(Debug, Clone)]
pub struct FileCandidate {
    /// Path relative to the repo root, forward slashes on every platform.
    pub rel_path: String,
    pub abs_path: PathBuf,
    /// Lower = more important. Ties break by size ascending.
    pub priority: i32,
    pub size: u64,
}

/// A selected `(path, content)` pair. Content is already truncated to the
/// per-file character cap.
#[derive(Debug, Clone)]
pub struct ContextFile {
    pub path: String,
    pub content: String,
}

/// Select the project files worth sending as model context.
///
/// Walks `scan_root`, prunes excluded directories, filters and scores files,
/// then packs the sorted candidates under the configured budgets. Returned
/// paths are relative to `repo_root`, which `scan_root` must live under.
/// An empty result is not an error; only a bad scan root is.
pub fn select_files(
    scan_root: &Path,
    repo_root: &Path,
    rules: &SelectionConfig,
    verbose: u8,
) -> Result<Vec<ContextFile>, SelectError> {
    if !scan_root.is_dir() {
        return Err(SelectError::InvalidScanPath(scan_root.to_path_buf()));
    }

    let mut candidates = collect_candidates(scan_root, repo_root, rules, verbose);
    candidates.sort_by(|a, b| (a.priority, a.size).cmp(&(b.priority, b.size)));

    Ok(pack_bundle(&candidates, rules, verbose))
}

fn collect_candidates(
    scan_root: &Path,
    repo_root: &Path,
    rules: &SelectionConfig,
    verbose: u8,
) -> Vec<FileCandidate> {
    let mut candidates = Vec::new();

    let walker = WalkDir::new(scan_root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            // Prune excluded directories without descending. The scan root
            // itself (depth 0) is always kept.
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            !is_excluded_name(&e.file_name().to_string_lossy(), &rules.exclude_dirs)
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                if verbose > 0 {
                    eprintln!("{} {}", "skipping unreadable entry:".yellow(), err);
                }
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let rel = match path.strip_prefix(repo_root) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let rel_str = rel_path_string(rel);
        let rel_lower = rel_str.to_lowercase();

        // Scan roots nested under an excluded directory still produce paths
        // containing the excluded segment; catch those here.
        if rel
            .components()
            .any(|c| is_excluded_name(&c.as_os_str().to_string_lossy(), &rules.exclude_dirs))
        {
            continue;
        }

        let name_lower = entry.file_name().to_string_lossy().to_lowercase();
        let ext_lower = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if matches_extension(&name_lower, &ext_lower, &rules.exclude_extensions)
            || matches_extension(&name_lower, &ext_lower, &rules.binary_extensions)
        {
            continue;
        }
        if name_lower.starts_with('.')
            && !rules.allowed_dotfiles.iter().any(|d| d.eq_ignore_ascii_case(&name_lower))
        {
            continue;
        }
        if under_asset_dir(rel, rules) && !contains_ignore_case(&rules.asset_keep_extensions, &ext_lower)
        {
            continue;
        }

        let size = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(err) => {
                if verbose > 0 {
                    eprintln!("{} {}: {}", "cannot stat".yellow(), rel_str.dimmed(), err);
                }
                continue;
            }
        };
        if size == 0 || size > rules.max_scan_file_size {
            continue;
        }

        let priority = score_priority(&name_lower, &ext_lower, &rel_lower, rules);

        candidates.push(FileCandidate {
            rel_path: rel_str,
            abs_path: path.to_path_buf(),
            priority,
            size,
        });
    }

    candidates
}

/// Base table lookup (filename first, extension second), then the first
/// matching boost rule. Boosts adjust, never replace, and floor at 1.
fn score_priority(name_lower: &str, ext_lower: &str, rel_lower: &str, rules: &SelectionConfig) -> i32 {
    let base = rules
        .priorities
        .get(name_lower)
        .or_else(|| rules.priorities.get(ext_lower))
        .copied()
        .unwrap_or(DEFAULT_PRIORITY);

    for rule in &rules.boosts {
        if rule.prefixes.iter().any(|p| rel_lower.starts_with(p.as_str())) {
            return (base - rule.adjustment).max(1);
        }
    }

    if rules.entrypoint_files.iter().any(|f| f == name_lower)
        && rules
            .entrypoint_prefixes
            .iter()
            .any(|p| rel_lower.starts_with(p.as_str()))
    {
        return (base - rules.entrypoint_adjustment).max(1);
    }

    base
}

/// Greedy pass over the sorted candidates. Stops at the file cap or once the
/// running total reaches the character budget; a single candidate that would
/// overflow is skipped without ending the pass.
fn pack_bundle(candidates: &[FileCandidate], rules: &SelectionConfig, verbose: u8) -> Vec<ContextFile> {
    let mut bundle: Vec<ContextFile> = Vec::new();
    let mut total_chars = 0usize;

    for candidate in candidates {
        if bundle.len() >= rules.max_files {
            if verbose > 0 {
                eprintln!("{}", format!("file limit of {} reached", rules.max_files).yellow());
            }
            break;
        }
        if total_chars >= rules.max_total_chars {
            if verbose > 0 {
                eprintln!(
                    "{}",
                    format!("total content limit of {} chars reached", rules.max_total_chars)
                        .yellow()
                );
            }
            break;
        }

        let content = match read_text_lossy(&candidate.abs_path, rules.max_chars_per_file) {
            Ok(content) => content,
            Err(err) => {
                eprintln!(
                    "{} {}: {}",
                    "✗ could not read".red(),
                    candidate.rel_path.dimmed(),
                    err
                );
                continue;
            }
        };
        // Non-empty on disk but empty after decoding: skip silently, no
        // budget consumed.
        if content.is_empty() {
            continue;
        }

        let chars = content.chars().count();
        if total_chars + chars <= rules.max_total_chars {
            total_chars += chars;
            if verbose > 0 {
                eprintln!(
                    "  {} {} (priority {}, {} chars)",
                    "✓".green(),
                    candidate.rel_path.dimmed(),
                    candidate.priority,
                    chars
                );
            }
            bundle.push(ContextFile {
                path: candidate.rel_path.clone(),
                content,
            });
        } else if verbose > 0 {
            eprintln!(
                "  {} {} (would exceed total content limit)",
                "✗".yellow(),
                candidate.rel_path.dimmed()
            );
        }
    }

    bundle
}

/// Read a file as text, detecting the encoding from a bounded head sample and
/// substituting replacement characters for undecodable sequences. The result
/// is truncated to `max_chars` characters.
pub fn read_text_lossy(path: &Path, max_chars: usize) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    if bytes.is_empty() {
        return Ok(String::new());
    }

    let mut text = match std::str::from_utf8(&bytes) {
        Ok(valid) => valid.to_string(),
        Err(_) => {
            let sniff = &bytes[..bytes.len().min(ENCODING_SNIFF_BYTES)];
            let mut detector = chardetng::EncodingDetector::new();
            detector.feed(sniff, sniff.len() == bytes.len());
            let encoding = detector.guess(None, true);
            let (decoded, _, _) = encoding.decode(&bytes);
            decoded.into_owned()
        }
    };

    if let Some((idx, _)) = text.char_indices().nth(max_chars) {
        text.truncate(idx);
    }
    Ok(text)
}

fn is_excluded_name(name: &str, excluded: &[String]) -> bool {
    excluded.iter().any(|d| d.eq_ignore_ascii_case(name))
}

fn contains_ignore_case(haystack: &[String], needle: &str) -> bool {
    haystack.iter().any(|h| h.eq_ignore_ascii_case(needle))
}

/// Entries with a dot ("min.js") match the filename tail; plain entries match
/// the extension.
fn matches_extension(name_lower: &str, ext_lower: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pat| {
        let pat = pat.to_lowercase();
        if pat.contains('.') {
            name_lower.ends_with(&format!(".{pat}"))
        } else {
            ext_lower == pat
        }
    })
}

/// True when any parent segment of the repo-relative path is a static-asset
/// directory name.
fn under_asset_dir(rel: &Path, rules: &SelectionConfig) -> bool {
    let mut parts: Vec<_> = rel.components().collect();
    parts.pop(); // the filename itself
    parts.iter().any(|c| {
        let seg = c.as_os_str().to_string_lossy();
        rules.asset_dirs.iter().any(|d| d.eq_ignore_ascii_case(&seg))
    })
}

fn rel_path_string(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectionConfig;
    use std::fs;

    fn rules() -> SelectionConfig {
        SelectionConfig::default()
    }

    #[test]
    fn invalid_scan_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = select_files(&missing, dir.path(), &rules(), 0).unwrap_err();
        assert!(matches!(err, SelectError::InvalidScanPath(_)));

        let file = dir.path().join("plain.txt");
        fs::write(&file, "x").unwrap();
        assert!(select_files(&file, dir.path(), &rules(), 0).is_err());
    }

    #[test]
    fn empty_tree_yields_empty_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = select_files(dir.path(), dir.path(), &rules(), 0).unwrap();
        assert!(bundle.is_empty());
    }

    #[test]
    fn excluded_directories_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("node_modules/foo")).unwrap();
        fs::write(dir.path().join("node_modules/foo/bar.js"), "content").unwrap();
        fs::create_dir_all(dir.path().join("NODE_MODULES")).unwrap();
        fs::write(dir.path().join("NODE_MODULES/deep.js"), "content").unwrap();
        fs::write(dir.path().join("kept.js"), "let a = 1;").unwrap();

        let bundle = select_files(dir.path(), dir.path(), &rules(), 0).unwrap();
        let paths: Vec<_> = bundle.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["kept.js"]);
    }

    #[test]
    fn scan_root_inside_excluded_dir_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("node_modules/pkg");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("index.js"), "module.exports = {}").unwrap();

        let bundle = select_files(&nested, dir.path(), &rules(), 0).unwrap();
        assert!(bundle.is_empty());
    }

    #[test]
    fn binary_and_excluded_extensions_are_filtered() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("photo.PNG"), [0u8; 32]).unwrap();
        fs::write(dir.path().join("trace.log"), "line").unwrap();
        fs::write(dir.path().join("app.min.js"), "x()").unwrap();
        fs::write(dir.path().join("app.js"), "function x() {}").unwrap();

        let bundle = select_files(dir.path(), dir.path(), &rules(), 0).unwrap();
        let paths: Vec<_> = bundle.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["app.js"]);
    }

    #[test]
    fn dotfiles_need_an_allowlist_entry() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "target/\n").unwrap();
        fs::write(dir.path().join(".secret"), "hidden").unwrap();

        let bundle = select_files(dir.path(), dir.path(), &rules(), 0).unwrap();
        let paths: Vec<_> = bundle.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec![".gitignore"]);
    }

    #[test]
    fn asset_dirs_keep_only_web_sources() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("public")).unwrap();
        fs::write(dir.path().join("public/robots.txt"), "User-agent: *").unwrap();
        fs::write(dir.path().join("public/index.html"), "<html></html>").unwrap();

        let bundle = select_files(dir.path(), dir.path(), &rules(), 0).unwrap();
        let paths: Vec<_> = bundle.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["public/index.html"]);
    }

    #[test]
    fn zero_and_oversized_files_never_become_candidates() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("empty.rs"), "").unwrap();
        let mut r = rules();
        r.max_scan_file_size = 100;
        fs::write(dir.path().join("huge.rs"), "x".repeat(101)).unwrap();
        fs::write(dir.path().join("ok.rs"), "fn main() {}").unwrap();

        let bundle = select_files(dir.path(), dir.path(), &r, 0).unwrap();
        let paths: Vec<_> = bundle.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["ok.rs"]);
    }

    #[test]
    fn priority_prefers_filename_over_extension() {
        let r = rules();
        assert_eq!(score_priority("readme.md", "md", "readme.md", &r), 1);
        assert_eq!(score_priority("notes.md", "md", "notes.md", &r), 8);
        assert_eq!(score_priority("mystery.xyz", "xyz", "mystery.xyz", &r), 99);
    }

    #[test]
    fn boost_rules_apply_first_match_and_floor_at_one() {
        let r = rules();
        // tsx base 3, pages boost -3, floored at 1
        assert_eq!(
            score_priority("home.tsx", "tsx", "src/pages/home.tsx", &r),
            1
        );
        // ts base 4, core boost -1
        assert_eq!(score_priority("util.ts", "ts", "src/core/util.ts", &r), 3);
        // entry point under src/: base 2 - 1
        assert_eq!(score_priority("main.tsx", "tsx", "src/main.tsx", &r), 1);
        // no boost outside recognized prefixes
        assert_eq!(score_priority("util.ts", "ts", "scripts/util.ts", &r), 4);
    }

    #[test]
    fn bundle_respects_file_and_char_budgets() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..6 {
            fs::write(dir.path().join(format!("f{i}.ts")), "a".repeat(50)).unwrap();
        }
        let mut r = rules();
        r.max_files = 3;
        r.max_total_chars = 120;
        r.max_chars_per_file = 100;

        let bundle = select_files(dir.path(), dir.path(), &r, 0).unwrap();
        assert!(bundle.len() <= 3);
        let total: usize = bundle.iter().map(|f| f.content.chars().count()).sum();
        assert!(total <= 120);
        // 50 + 50 fit, a third 50 would exceed 120
        assert_eq!(bundle.len(), 2);
    }

    #[test]
    fn per_file_content_is_truncated_not_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("big.ts"), "b".repeat(500)).unwrap();
        let mut r = rules();
        r.max_chars_per_file = 100;
        r.max_scan_file_size = 10_000;

        let bundle = select_files(dir.path(), dir.path(), &r, 0).unwrap();
        assert_eq!(bundle.len(), 1);
        assert_eq!(bundle[0].content.chars().count(), 100);
    }

    #[test]
    fn oversized_candidate_is_skipped_but_pass_continues() {
        let dir = tempfile::tempdir().unwrap();
        // readme.md gets priority 1 and comes first despite being large
        fs::write(dir.path().join("README.md"), "r".repeat(90)).unwrap();
        fs::write(dir.path().join("small.ts"), "s".repeat(20)).unwrap();
        let mut r = rules();
        r.max_total_chars = 50;
        r.max_chars_per_file = 100;

        let bundle = select_files(dir.path(), dir.path(), &r, 0).unwrap();
        let paths: Vec<_> = bundle.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["small.ts"]);
    }

    #[test]
    fn bundle_order_is_nondecreasing_in_priority_then_size() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("README.md"), "readme body".repeat(40)).unwrap();
        fs::write(dir.path().join("src/index.ts"), "export {};").unwrap();
        fs::write(dir.path().join("style.css"), "body {}").unwrap();

        let bundle = select_files(dir.path(), dir.path(), &rules(), 0).unwrap();
        let r = rules();
        let ranks: Vec<i32> = bundle
            .iter()
            .map(|f| {
                let name = f.path.rsplit('/').next().unwrap().to_lowercase();
                let ext = name.rsplit('.').next().unwrap().to_string();
                score_priority(&name, &ext, &f.path.to_lowercase(), &r)
            })
            .collect();
        let mut sorted = ranks.clone();
        sorted.sort();
        assert_eq!(ranks, sorted);
        assert_eq!(bundle[0].path, "README.md");
    }

    #[test]
    fn non_utf8_content_is_decoded_with_replacement() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin.txt");
        // "café" in latin-1: 0xE9 is not valid UTF-8
        fs::write(&path, [0x63, 0x61, 0x66, 0xE9, 0x0A]).unwrap();

        let text = read_text_lossy(&path, 1000).unwrap();
        assert!(!text.is_empty());
        assert!(text.starts_with("caf"));
    }

    #[test]
    fn read_text_lossy_truncates_on_char_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uni.txt");
        fs::write(&path, "héllo wörld").unwrap();

        let text = read_text_lossy(&path, 4).unwrap();
        assert_eq!(text, "héll");
    }
}
