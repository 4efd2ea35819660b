//! Weighted rule classification of files into a fixed category set.
//!
//! Each category owns a static rule: an extension set (worth 50 points), a
//! keyword set (worth 20 points, at most once) and a default priority. The
//! highest strictly-greater score wins, so ties resolve to the category
//! listed first in [`Category::ALL`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::model::FileRecord;

const EXTENSION_WEIGHT: u32 = 50;
const KEYWORD_WEIGHT: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Images,
    Documents,
    Spreadsheets,
    Presentations,
    Videos,
    Audio,
    Archives,
    Code,
    Web,
    Config,
    Temporary,
    Installers,
    Databases,
    Uncategorized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Organize,
    Archive,
    Keep,
    Delete,
    Cleanup,
}

#[derive(Debug)]
pub struct CategoryRule {
    pub extensions: &'static [&'static str],
    pub keywords: &'static [&'static str],
    pub priority: Priority,
}

static IMAGES: CategoryRule = CategoryRule {
    extensions: &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".svg", ".webp", ".ico", ".tiff", ".heic"],
    keywords: &["photo", "image", "img", "pic", "screenshot", "wallpaper", "avatar", "icon"],
    priority: Priority::Organize,
};

static DOCUMENTS: CategoryRule = CategoryRule {
    extensions: &[".pdf", ".doc", ".docx", ".txt", ".rtf", ".odt", ".pages"],
    keywords: &["report", "doc", "letter", "resume", "cv", "notes", "invoice", "receipt"],
    priority: Priority::Archive,
};

static SPREADSHEETS: CategoryRule = CategoryRule {
    extensions: &[".xls", ".xlsx", ".csv", ".ods", ".numbers"],
    keywords: &["data", "sheet", "budget", "finance", "expense", "tracking"],
    priority: Priority::Archive,
};

static PRESENTATIONS: CategoryRule = CategoryRule {
    extensions: &[".ppt", ".pptx", ".key", ".odp"],
    keywords: &["presentation", "slides", "deck"],
    priority: Priority::Archive,
};

static VIDEOS: CategoryRule = CategoryRule {
    extensions: &[".mp4", ".avi", ".mkv", ".mov", ".wmv", ".flv", ".webm", ".m4v"],
    keywords: &["video", "movie", "clip", "recording", "screen"],
    priority: Priority::Organize,
};

static AUDIO: CategoryRule = CategoryRule {
    extensions: &[".mp3", ".wav", ".flac", ".aac", ".ogg", ".m4a", ".wma"],
    keywords: &["audio", "music", "song", "sound", "podcast", "voice"],
    priority: Priority::Organize,
};

static ARCHIVES: CategoryRule = CategoryRule {
    extensions: &[".zip", ".rar", ".7z", ".tar", ".gz", ".bz2", ".xz"],
    keywords: &["archive", "backup", "compressed"],
    priority: Priority::Archive,
};

static CODE: CategoryRule = CategoryRule {
    extensions: &[
        ".py", ".js", ".jsx", ".ts", ".tsx", ".java", ".cpp", ".c", ".h", ".cs", ".go", ".rs", ".php", ".rb",
        ".swift",
    ],
    keywords: &["src", "source", "code", "script", "main", "test"],
    priority: Priority::Keep,
};

static WEB: CategoryRule = CategoryRule {
    extensions: &[".html", ".htm", ".css", ".scss", ".sass", ".less"],
    keywords: &["web", "site", "page", "index", "style"],
    priority: Priority::Keep,
};

static CONFIG: CategoryRule = CategoryRule {
    extensions: &[".json", ".yaml", ".yml", ".toml", ".ini", ".cfg", ".conf", ".xml"],
    keywords: &["config", "settings", "package", "manifest"],
    priority: Priority::Keep,
};

static TEMPORARY: CategoryRule = CategoryRule {
    extensions: &[".tmp", ".temp", ".bak", ".old", ".cache", ".log", ".swp", ".swo", "~"],
    keywords: &["temp", "backup", "copy", "old", "cache", "log"],
    priority: Priority::Delete,
};

static INSTALLERS: CategoryRule = CategoryRule {
    extensions: &[".exe", ".msi", ".dmg", ".pkg", ".deb", ".rpm", ".appimage"],
    keywords: &["setup", "install", "installer", "download"],
    priority: Priority::Cleanup,
};

static DATABASES: CategoryRule = CategoryRule {
    extensions: &[".db", ".sqlite", ".sql", ".mdb", ".accdb"],
    keywords: &["database", "data", "backup"],
    priority: Priority::Keep,
};

static UNCATEGORIZED: CategoryRule = CategoryRule {
    extensions: &[],
    keywords: &[],
    priority: Priority::Keep,
};

impl Category {
    /// Evaluation order. `Uncategorized` is the fallback and never scored.
    pub const ALL: [Category; 13] = [
        Category::Images,
        Category::Documents,
        Category::Spreadsheets,
        Category::Presentations,
        Category::Videos,
        Category::Audio,
        Category::Archives,
        Category::Code,
        Category::Web,
        Category::Config,
        Category::Temporary,
        Category::Installers,
        Category::Databases,
    ];

    pub const MEDIA: [Category; 3] = [Category::Images, Category::Videos, Category::Audio];

    pub fn rule(&self) -> &'static CategoryRule {
        match self {
            Category::Images => &IMAGES,
            Category::Documents => &DOCUMENTS,
            Category::Spreadsheets => &SPREADSHEETS,
            Category::Presentations => &PRESENTATIONS,
            Category::Videos => &VIDEOS,
            Category::Audio => &AUDIO,
            Category::Archives => &ARCHIVES,
            Category::Code => &CODE,
            Category::Web => &WEB,
            Category::Config => &CONFIG,
            Category::Temporary => &TEMPORARY,
            Category::Installers => &INSTALLERS,
            Category::Databases => &DATABASES,
            Category::Uncategorized => &UNCATEGORIZED,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Images => "images",
            Category::Documents => "documents",
            Category::Spreadsheets => "spreadsheets",
            Category::Presentations => "presentations",
            Category::Videos => "videos",
            Category::Audio => "audio",
            Category::Archives => "archives",
            Category::Code => "code",
            Category::Web => "web",
            Category::Config => "config",
            Category::Temporary => "temporary",
            Category::Installers => "installers",
            Category::Databases => "databases",
            Category::Uncategorized => "uncategorized",
        }
    }

    /// Capitalized label, used for folder names and reports.
    pub fn title(&self) -> String {
        let name = self.as_str();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    pub fn matches_extension(&self, extension: &str) -> bool {
        self.rule().extensions.contains(&extension)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub score: u32,
}

impl Classification {
    pub fn priority(&self) -> Priority {
        self.category.rule().priority
    }
}

/// Score a single category against a file.
fn score(rule: &CategoryRule, extension: &str, lowered_name: &str) -> u32 {
    let mut score = 0;
    if rule.extensions.contains(&extension) {
        score += EXTENSION_WEIGHT;
    }
    if rule.keywords.iter().any(|k| lowered_name.contains(k)) {
        score += KEYWORD_WEIGHT;
    }
    score
}

pub fn classify(file: &FileRecord) -> Classification {
    let extension = file.extension.to_lowercase();
    let name = file.name.to_lowercase();

    let mut best = Classification {
        category: Category::Uncategorized,
        score: 0,
    };
    for category in Category::ALL {
        let s = score(category.rule(), &extension, &name);
        if s > best.score {
            best = Classification { category, score: s };
        }
    }
    best
}

/// Group a batch by category. Keys iterate in evaluation order.
pub fn categorize(files: &[FileRecord]) -> BTreeMap<Category, Vec<FileRecord>> {
    let mut categorized: BTreeMap<Category, Vec<FileRecord>> = BTreeMap::new();
    for file in files {
        categorized
            .entry(classify(file).category)
            .or_default()
            .push(file.clone());
    }
    categorized
}

/// Text suggestion of a per-category folder layout for the given extensions.
pub fn suggest_folder_structure(base_path: &str, extensions: &[String]) -> String {
    let mut structure: BTreeMap<Category, Vec<&str>> = BTreeMap::new();
    for ext in extensions {
        let lowered = ext.to_lowercase();
        if let Some(category) = Category::ALL.iter().find(|c| c.matches_extension(&lowered)) {
            let entry = structure.entry(*category).or_default();
            if !entry.contains(&ext.as_str()) {
                entry.push(ext.as_str());
            }
        }
    }

    let mut suggestion = format!("Suggested structure for {}:\n\n", base_path);
    for (category, exts) in structure {
        suggestion.push_str(&format!("{}/\n   Extensions: {}\n\n", category.title(), exts.join(", ")));
    }
    suggestion
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> FileRecord {
        FileRecord::new(format!("/data/{}", name), 1024, None)
    }

    #[test]
    fn test_temp_extensions_classify_as_temporary() {
        for name in ["a.tmp", "data.bak", "backup.old", "thumbs.cache", "IMAGE.TMP"] {
            let c = classify(&record(name));
            assert_eq!(c.category, Category::Temporary, "{}", name);
            assert!(c.score >= 50, "{} scored {}", name, c.score);
        }
    }

    #[test]
    fn test_extension_plus_keyword() {
        let c = classify(&record("holiday_photo.jpg"));
        assert_eq!(c, Classification { category: Category::Images, score: 70 });
        assert_eq!(c.priority(), Priority::Organize);
    }

    #[test]
    fn test_keyword_only_tie_goes_to_first_category() {
        // "data" is a keyword of both spreadsheets and databases
        let c = classify(&record("data"));
        assert_eq!(c, Classification { category: Category::Spreadsheets, score: 20 });
    }

    #[test]
    fn test_no_match_is_uncategorized() {
        let c = classify(&record("qwerty"));
        assert_eq!(c, Classification { category: Category::Uncategorized, score: 0 });
    }

    #[test]
    fn test_classification_is_deterministic() {
        let file = record("Screenshot 2024-01-01.png");
        assert_eq!(classify(&file), classify(&file));
    }

    #[test]
    fn test_categorize_orders_by_category() {
        let files = vec![record("setup.exe"), record("song.mp3"), record("pic.png")];
        let keys: Vec<Category> = categorize(&files).keys().copied().collect();
        assert_eq!(keys, vec![Category::Images, Category::Audio, Category::Installers]);
    }

    #[test]
    fn test_suggest_folder_structure() {
        let text = suggest_folder_structure("/downloads", &[".jpg".into(), ".pdf".into(), ".xyz".into()]);
        assert!(text.contains("Images/"));
        assert!(text.contains("Documents/"));
        assert!(!text.contains(".xyz"));
    }
}
