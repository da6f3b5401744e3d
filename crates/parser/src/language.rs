use crate::error::{ParserError, Result};
use argus_core::FilePath;
use std::collections::BTreeMap;

/// Supported programming language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    C,
    Cpp,
    CSharp,
    Ruby,
    Php,
}

impl Language {
    /// Detect language from a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "rs" => Some(Language::Rust),
            "py" | "pyw" => Some(Language::Python),
            "js" | "mjs" | "cjs" | "jsx" => Some(Language::JavaScript),
            "ts" | "tsx" | "mts" => Some(Language::TypeScript),
            "go" => Some(Language::Go),
            "java" => Some(Language::Java),
            "c" | "h" => Some(Language::C),
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Some(Language::Cpp),
            "cs" => Some(Language::CSharp),
            "rb" => Some(Language::Ruby),
            "php" => Some(Language::Php),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "rust" => Some(Language::Rust),
            "python" => Some(Language::Python),
            "javascript" => Some(Language::JavaScript),
            "typescript" => Some(Language::TypeScript),
            "go" => Some(Language::Go),
            "java" => Some(Language::Java),
            "c" => Some(Language::C),
            "cpp" | "c++" => Some(Language::Cpp),
            "csharp" | "c#" => Some(Language::CSharp),
            "ruby" => Some(Language::Ruby),
            "php" => Some(Language::Php),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Ruby => "ruby",
            Language::Php => "php",
        }
    }

    /// Get the tree-sitter grammar for this language.
    pub fn tree_sitter_language(self) -> tree_sitter::Language {
        match self {
            Language::Rust => tree_sitter_rust::LANGUAGE.into(),
            Language::Python => tree_sitter_python::LANGUAGE.into(),
            Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Go => tree_sitter_go::LANGUAGE.into(),
            Language::Java => tree_sitter_java::LANGUAGE.into(),
            Language::C => tree_sitter_c::LANGUAGE.into(),
            Language::Cpp => tree_sitter_cpp::LANGUAGE.into(),
            Language::CSharp => tree_sitter_c_sharp::LANGUAGE.into(),
            Language::Ruby => tree_sitter_ruby::LANGUAGE.into(),
            Language::Php => tree_sitter_php::LANGUAGE_PHP.into(),
        }
    }
}

/// Closed extension table over the eleven supported languages, plus the
/// configured extra-extension overlay.
///
/// Extra entries come from configuration as `"ext=language"` pairs; a bare
/// extension with no language mapping is rejected at load time so the table
/// stays closed.
#[derive(Debug, Clone, Default)]
pub struct LanguageTable {
    extra: BTreeMap<String, Language>,
}

impl LanguageTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table with extra extensions from configuration.
    ///
    /// Malformed entries are logged and skipped rather than failing the run.
    pub fn with_extra(entries: &[String]) -> Self {
        let mut extra = BTreeMap::new();
        for entry in entries {
            let Some((ext, lang_name)) = entry.split_once('=') else {
                log::warn!("ignoring extra extension {entry:?}: expected \"ext=language\"");
                continue;
            };
            let ext = ext.trim().trim_start_matches('.').to_lowercase();
            match Language::from_name(lang_name.trim()) {
                Some(lang) if !ext.is_empty() => {
                    extra.insert(ext, lang);
                }
                _ => log::warn!("ignoring extra extension {entry:?}: unknown language"),
            }
        }
        LanguageTable { extra }
    }

    /// Detect the language for a path, or `Err` if it is not a source file.
    pub fn language_for(&self, path: &FilePath) -> Result<Language> {
        let ext = path.extension().ok_or_else(|| ParserError::UnsupportedLanguage {
            path: path.to_string(),
        })?;
        if let Some(lang) = self.extra.get(&ext.to_lowercase()) {
            return Ok(*lang);
        }
        Language::from_extension(ext).ok_or_else(|| ParserError::UnsupportedLanguage {
            path: path.to_string(),
        })
    }

    /// Whether the path maps to any supported language.
    pub fn is_source_file(&self, path: &FilePath) -> bool {
        self.language_for(path).is_ok()
    }
}
