use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub repos: RepoConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct RepoConfig {
    /// Directory holding managed clones. Defaults to the platform data dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,
}

impl RepoConfig {
    pub fn base_path(&self) -> PathBuf {
        self.base_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("repoagent")
                .join("repositories")
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_base: String,
    /// Fallback model when neither saved state nor auto-selection yields one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            default_model: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub expiration_seconds: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            expiration_seconds: 3600,
        }
    }
}

/// Boost applied when a repo-relative path starts with any of the prefixes.
/// Rules are ordered; the first match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostRule {
    pub prefixes: Vec<String>,
    pub adjustment: i32,
}

/// Rules and budgets driving context-file selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Directory names never descended into (case-insensitive).
    #[serde(default = "SelectionConfig::default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
    /// Extensions rejected outright. Entries containing a dot match the
    /// filename tail instead (`min.js` matches `app.min.js`).
    #[serde(default = "SelectionConfig::default_exclude_extensions")]
    pub exclude_extensions: Vec<String>,
    #[serde(default = "SelectionConfig::default_binary_extensions")]
    pub binary_extensions: Vec<String>,
    /// Leading-dot filenames that stay in despite being hidden.
    #[serde(default = "SelectionConfig::default_allowed_dotfiles")]
    pub allowed_dotfiles: Vec<String>,
    /// Static-asset directory names; files below them are dropped unless
    /// their extension is in `asset_keep_extensions`.
    #[serde(default = "SelectionConfig::default_asset_dirs")]
    pub asset_dirs: Vec<String>,
    #[serde(default = "SelectionConfig::default_asset_keep_extensions")]
    pub asset_keep_extensions: Vec<String>,
    /// Priority by exact lowercased filename or lowercased extension.
    /// Lower number = more important; unknown files fall back to 99.
    #[serde(default = "SelectionConfig::default_priorities")]
    pub priorities: BTreeMap<String, i32>,
    #[serde(default = "SelectionConfig::default_boosts")]
    pub boosts: Vec<BoostRule>,
    /// Application entry points that get a small boost when located under
    /// one of `entrypoint_prefixes`.
    #[serde(default = "SelectionConfig::default_entrypoint_files")]
    pub entrypoint_files: Vec<String>,
    #[serde(default = "SelectionConfig::default_entrypoint_prefixes")]
    pub entrypoint_prefixes: Vec<String>,
    #[serde(default = "SelectionConfig::default_entrypoint_adjustment")]
    pub entrypoint_adjustment: i32,
    #[serde(default = "SelectionConfig::default_max_files")]
    pub max_files: usize,
    #[serde(default = "SelectionConfig::default_max_chars_per_file")]
    pub max_chars_per_file: usize,
    #[serde(default = "SelectionConfig::default_max_total_chars")]
    pub max_total_chars: usize,
    /// Files larger than this are never even read (10x the per-file cap).
    #[serde(default = "SelectionConfig::default_max_scan_file_size")]
    pub max_scan_file_size: u64,
}

impl SelectionConfig {
    fn default_exclude_dirs() -> Vec<String> {
        [
            ".git",
            ".venv",
            "venv",
            "env",
            "node_modules",
            "__pycache__",
            "target",
            "build",
            "dist",
            ".vscode",
            ".idea",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn default_exclude_extensions() -> Vec<String> {
        [
            "log",
            "tmp",
            "lock",
            "bak",
            "swp",
            "map",
            "min.js",
            "min.css",
            "svg",
            "ico",
            "webmanifest",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn default_binary_extensions() -> Vec<String> {
        [
            "png", "jpg", "jpeg", "gif", "bmp", "tiff", "pdf", "doc", "docx", "xls", "xlsx",
            "ppt", "pptx", "zip", "tar", "gz", "rar", "exe", "dll", "so", "o", "a", "lib",
            "jar", "war", "ear", "class", "pyc", "pyo", "mp3", "mp4", "avi", "mkv", "webm",
            "mov", "wav", "ogg", "flac", "iso", "img", "dmg", "sqlite", "db", "eot", "ttf",
            "woff", "woff2",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn default_allowed_dotfiles() -> Vec<String> {
        [
            ".gitignore",
            ".env",
            ".dockerignore",
            ".npmrc",
            ".yarnrc",
            ".prettierrc",
            ".eslintrc.cjs",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn default_asset_dirs() -> Vec<String> {
        vec!["public".to_string(), "assets".to_string()]
    }

    fn default_asset_keep_extensions() -> Vec<String> {
        ["html", "js", "css", "ts", "tsx", "jsx"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn default_priorities() -> BTreeMap<String, i32> {
        let table: &[(&str, i32)] = &[
            // Project documentation and top-level configuration
            ("readme.md", 1),
            ("readme.rst", 1),
            ("readme.txt", 1),
            ("readme", 1),
            ("package.json", 1),
            ("vite.config.js", 2),
            ("vite.config.ts", 2),
            ("tailwind.config.js", 2),
            ("tailwind.config.ts", 2),
            ("postcss.config.js", 2),
            ("tsconfig.json", 2),
            ("firebase.json", 2),
            // Entry points and routing
            ("main.jsx", 2),
            ("main.tsx", 2),
            ("app.jsx", 2),
            ("app.tsx", 2),
            ("index.html", 3),
            ("server.js", 2),
            ("index.js", 2),
            ("app.js", 2),
            ("main.py", 2),
            ("app.py", 2),
            // Application code by extension
            ("tsx", 3),
            ("jsx", 3),
            ("ts", 4),
            ("js", 4),
            ("py", 5),
            ("java", 5),
            ("go", 5),
            ("rb", 5),
            ("php", 5),
            ("rs", 5),
            ("requirements.txt", 4),
            ("pyproject.toml", 4),
            ("setup.py", 4),
            ("cargo.toml", 4),
            ("docker-compose.yml", 4),
            ("dockerfile", 4),
            (".env.example", 4),
            (".env", 4),
            (".eslintrc.js", 5),
            (".prettierrc.js", 5),
            ("netlify.toml", 3),
            // Markup and styles
            ("html", 6),
            ("json", 6),
            ("css", 7),
            ("scss", 7),
            ("less", 7),
            ("pcss", 7),
            // Low signal
            ("md", 8),
            ("txt", 8),
            ("ipynb", 9),
        ];
        table.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn default_boosts() -> Vec<BoostRule> {
        vec![
            BoostRule {
                prefixes: vec!["frontend/src/pages/".into(), "src/pages/".into()],
                adjustment: 3,
            },
            BoostRule {
                prefixes: vec![
                    "frontend/src/components/".into(),
                    "src/components/".into(),
                    "frontend/src/layouts/".into(),
                    "src/layouts/".into(),
                ],
                adjustment: 2,
            },
            BoostRule {
                prefixes: vec![
                    "frontend/src/core/".into(),
                    "src/core/".into(),
                    "frontend/src/lib/".into(),
                    "src/lib/".into(),
                    "frontend/src/hooks/".into(),
                    "src/hooks/".into(),
                ],
                adjustment: 1,
            },
            BoostRule {
                prefixes: vec!["backend/".into(), "server/".into(), "api/".into()],
                adjustment: 2,
            },
        ]
    }

    fn default_entrypoint_files() -> Vec<String> {
        [
            "app.tsx", "app.jsx", "main.tsx", "main.jsx", "_app.tsx", "_app.jsx", "index.ts",
            "index.js",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn default_entrypoint_prefixes() -> Vec<String> {
        vec!["frontend/src/".to_string(), "src/".to_string()]
    }

    fn default_entrypoint_adjustment() -> i32 {
        1
    }

    fn default_max_files() -> usize {
        10
    }

    fn default_max_chars_per_file() -> usize {
        7000
    }

    fn default_max_total_chars() -> usize {
        60_000
    }

    fn default_max_scan_file_size() -> u64 {
        Self::default_max_chars_per_file() as u64 * 10
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            exclude_dirs: Self::default_exclude_dirs(),
            exclude_extensions: Self::default_exclude_extensions(),
            binary_extensions: Self::default_binary_extensions(),
            allowed_dotfiles: Self::default_allowed_dotfiles(),
            asset_dirs: Self::default_asset_dirs(),
            asset_keep_extensions: Self::default_asset_keep_extensions(),
            priorities: Self::default_priorities(),
            boosts: Self::default_boosts(),
            entrypoint_files: Self::default_entrypoint_files(),
            entrypoint_prefixes: Self::default_entrypoint_prefixes(),
            entrypoint_adjustment: Self::default_entrypoint_adjustment(),
            max_files: Self::default_max_files(),
            max_chars_per_file: Self::default_max_chars_per_file(),
            max_total_chars: Self::default_max_total_chars(),
            max_scan_file_size: Self::default_max_scan_file_size(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = get_config_path();

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = get_config_path();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    pub fn create_default() -> Result<PathBuf> {
        let config = Config::default();
        config.save()?;
        Ok(get_config_path())
    }
}

pub fn config_base_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("repoagent")
}

fn get_config_path() -> PathBuf {
    config_base_dir().join("config.toml")
}

pub fn show_config() -> Result<()> {
    let path = get_config_path();
    println!("Config: {}", path.display());
    println!();

    if path.exists() {
        let config = Config::load()?;
        println!("{}", toml::to_string_pretty(&config)?);
    } else {
        println!("(default config, file not created)");
        println!();
        let config = Config::default();
        println!("{}", toml::to_string_pretty(&config)?);
    }

    Ok(())
}
