// ABOUTME: Maps file extensions to Tree-sitter grammars and the per-language capability
// ABOUTME: bundle the hierarchy builder and reference resolver drive definitions from.
use crate::languages::CapabilityBundle;
use codegraph_core::Language;
use std::collections::HashMap;
use tree_sitter::Parser;

pub struct LanguageConfig {
    pub language: tree_sitter::Language,
    pub file_extensions: Vec<&'static str>,
    pub bundle: CapabilityBundle,
}

pub struct LanguageRegistry {
    configs: HashMap<Language, LanguageConfig>,
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageRegistry {
    pub fn new() -> Self {
        let mut configs = HashMap::new();

        configs.insert(
            Language::Python,
            LanguageConfig {
                language: tree_sitter_python::LANGUAGE.into(),
                file_extensions: vec!["py", "pyi"],
                bundle: crate::languages::python::bundle(),
            },
        );

        configs.insert(
            Language::Ruby,
            LanguageConfig {
                language: tree_sitter_ruby::LANGUAGE.into(),
                file_extensions: vec!["rb", "rake", "gemspec"],
                bundle: crate::languages::ruby::bundle(),
            },
        );

        configs.insert(
            Language::Go,
            LanguageConfig {
                language: tree_sitter_go::LANGUAGE.into(),
                file_extensions: vec!["go"],
                bundle: crate::languages::go::bundle(),
            },
        );

        configs.insert(
            Language::JavaScript,
            LanguageConfig {
                language: tree_sitter_javascript::LANGUAGE.into(),
                file_extensions: vec!["js", "jsx", "mjs", "cjs"],
                bundle: crate::languages::javascript::bundle(Language::JavaScript),
            },
        );

        configs.insert(
            Language::TypeScript,
            LanguageConfig {
                language: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
                file_extensions: vec!["ts", "tsx"],
                bundle: crate::languages::javascript::bundle(Language::TypeScript),
            },
        );

        configs.insert(
            Language::Rust,
            LanguageConfig {
                language: tree_sitter_rust::LANGUAGE.into(),
                file_extensions: vec!["rs"],
                bundle: crate::languages::rust::bundle(),
            },
        );

        // The remaining languages get a registered grammar plus the general fallback
        // policy from `languages::general`; nothing in the spec singles out their
        // relationship rules the way it does for Ruby and Go.
        configs.insert(
            Language::Java,
            LanguageConfig {
                language: tree_sitter_java::LANGUAGE.into(),
                file_extensions: vec!["java"],
                bundle: crate::languages::general::bundle(
                    &["class_declaration", "interface_declaration", "enum_declaration"],
                    &["method_declaration", "constructor_declaration"],
                    "name",
                ),
            },
        );

        configs.insert(
            Language::Cpp,
            LanguageConfig {
                language: tree_sitter_cpp::LANGUAGE.into(),
                file_extensions: vec!["cpp", "cxx", "cc", "hpp", "hxx", "h"],
                bundle: crate::languages::general::bundle(
                    &["class_specifier", "struct_specifier"],
                    &["function_definition"],
                    "name",
                ),
            },
        );

        configs.insert(
            Language::CSharp,
            LanguageConfig {
                language: tree_sitter_c_sharp::LANGUAGE.into(),
                file_extensions: vec!["cs"],
                bundle: crate::languages::general::bundle(
                    &["class_declaration", "interface_declaration", "struct_declaration"],
                    &["method_declaration", "constructor_declaration"],
                    "name",
                ),
            },
        );

        configs.insert(
            Language::Php,
            LanguageConfig {
                language: tree_sitter_php::LANGUAGE_PHP.into(),
                file_extensions: vec!["php", "phtml"],
                bundle: crate::languages::general::bundle(
                    &["class_declaration", "interface_declaration"],
                    &["function_definition", "method_declaration"],
                    "name",
                ),
            },
        );

        configs.insert(
            Language::Swift,
            LanguageConfig {
                language: tree_sitter_swift::LANGUAGE.into(),
                file_extensions: vec!["swift"],
                bundle: crate::languages::general::bundle(
                    &["class_declaration"],
                    &["function_declaration"],
                    "name",
                ),
            },
        );

        Self { configs }
    }

    pub fn detect_language(&self, file_path: &str) -> Option<Language> {
        let extension = std::path::Path::new(file_path)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();

        self.configs
            .iter()
            .find(|(_, config)| config.file_extensions.contains(&extension.as_str()))
            .map(|(lang, _)| *lang)
    }

    pub fn get_config(&self, language: &Language) -> Option<&LanguageConfig> {
        self.configs.get(language)
    }

    pub fn create_parser(&self, language: &Language) -> Option<Parser> {
        let config = self.get_config(language)?;
        let mut parser = Parser::new();
        parser.set_language(&config.language).ok()?;
        Some(parser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::{LANGUAGE_VERSION, MIN_COMPATIBLE_LANGUAGE_VERSION};

    #[test]
    fn registered_languages_use_supported_versions() {
        let registry = LanguageRegistry::new();
        for (language, config) in &registry.configs {
            let version = config.language.version();
            assert!(
                (MIN_COMPATIBLE_LANGUAGE_VERSION..=LANGUAGE_VERSION).contains(&version),
                "Language {:?} uses incompatible Tree-sitter version {} (supported {}..={})",
                language,
                version,
                MIN_COMPATIBLE_LANGUAGE_VERSION,
                LANGUAGE_VERSION
            );
        }
    }

    #[test]
    fn detect_language_matches_extension() {
        let registry = LanguageRegistry::new();
        assert_eq!(registry.detect_language("foo/bar.py"), Some(Language::Python));
        assert_eq!(registry.detect_language("foo/bar.rb"), Some(Language::Ruby));
        assert_eq!(registry.detect_language("foo/bar.unknown"), None);
    }
}
