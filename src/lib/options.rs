//! Generation options, and the configuration layers they are built from
//!
//! Every configuration source (YAML files, command line flags) produces a
//! [`Layer`]. Layers are merged in order, later ones winning, and the result
//! is turned into [`Options`] on top of the defaults.
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Error;

/// How embedded fields are lifted into their parent.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedMode {
    /// Replace the embedded field by the fields of its type
    #[default]
    Flatten,
    /// Keep the embedded field, and also add the fields of its type
    Include,
}

impl EmbedMode {
    /// Turns the `flatten-embedded` and `include-embedded` switches into a mode.
    /// Exactly one of them has to be set.
    pub fn from_flags(flatten: bool, include: bool) -> Result<EmbedMode, Error> {
        match (flatten, include) {
            (true, false) => Ok(EmbedMode::Flatten),
            (false, true) => Ok(EmbedMode::Include),
            (true, true) => Err(Error::Config(
                "flatten-embedded and include-embedded are mutually exclusive".to_string(),
            )),
            (false, false) => Err(Error::Config(
                "one of flatten-embedded or include-embedded has to be set".to_string(),
            )),
        }
    }
}

/// Drops a field whose tag has `key`, with `value` being one of the
/// `;`-delimited parts of its value.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TagFilter {
    pub key: String,
    pub value: String,
}

impl TagFilter {
    pub fn new<K: Into<String>, V: Into<String>>(key: K, value: V) -> TagFilter {
        TagFilter {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl FromStr for TagFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((key, value)) if !key.trim().is_empty() && !value.is_empty() => {
                Ok(TagFilter::new(key.trim(), value))
            }
            _ => Err(Error::Config(format!(
                "invalid tag filter '{}', expected 'key:value'",
                s
            ))),
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct Options {
    /// Directory which is scanned for declarations
    pub in_dir: PathBuf,
    /// Directory the generated file is written to, its base name is the package name
    pub out_dir: PathBuf,
    pub out_file: String,
    /// Appended to the name of every generated type
    pub suffix: String,
    /// Appended to the name of a generated type to name its patch type
    pub patch_suffix: String,
    /// Keep `gorm` and `db` tags on generated fields
    pub keep_orm_tags: bool,
    pub embed: EmbedMode,
    /// Drop types and fields whose comment mentions deprecation
    pub exclude_deprecated: bool,
    /// Names of types which are never generated, matched case-insensitively
    pub exclude_types: Vec<String>,
    pub exclude_by_tags: Vec<TagFilter>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            in_dir: PathBuf::from("."),
            out_dir: PathBuf::from("api"),
            out_file: "api_gen.go".to_string(),
            suffix: String::new(),
            patch_suffix: "Patch".to_string(),
            keep_orm_tags: false,
            embed: EmbedMode::Flatten,
            exclude_deprecated: false,
            exclude_types: Vec::new(),
            exclude_by_tags: Vec::new(),
        }
    }
}

impl Options {
    pub fn from_layer(layer: Layer) -> Result<Options, Error> {
        let defaults = Options::default();
        let exclude_by_tags = layer
            .exclude_by_tags
            .unwrap_or_default()
            .iter()
            .map(|s| s.parse())
            .collect::<Result<Vec<TagFilter>, Error>>()?;
        let mut opts = Options {
            in_dir: layer.in_dir.unwrap_or(defaults.in_dir),
            out_dir: layer.out_dir.unwrap_or(defaults.out_dir),
            out_file: layer.out_file.unwrap_or(defaults.out_file),
            suffix: layer.suffix.unwrap_or(defaults.suffix),
            patch_suffix: layer.patch_suffix.unwrap_or(defaults.patch_suffix),
            keep_orm_tags: layer.keep_orm_tags.unwrap_or(defaults.keep_orm_tags),
            embed: layer.embed.unwrap_or(defaults.embed),
            exclude_deprecated: layer.exclude_deprecated.unwrap_or(defaults.exclude_deprecated),
            exclude_types: layer.exclude_types.unwrap_or(defaults.exclude_types),
            exclude_by_tags,
        };
        opts.normalize();
        Ok(opts)
    }

    /// Fills in defaults for values which were explicitly left empty.
    pub fn normalize(&mut self) {
        if self.out_dir.as_os_str().is_empty() {
            self.out_dir = PathBuf::from("api");
        }
        if self.out_file.is_empty() {
            self.out_file = "api_gen.go".to_string();
        }
        if self.patch_suffix.is_empty() {
            self.patch_suffix = "Patch".to_string();
        }
        self.exclude_types = self
            .exclude_types
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
    }

    pub fn is_type_excluded(&self, name: &str) -> bool {
        !name.is_empty() && self.exclude_types.iter().any(|t| t.eq_ignore_ascii_case(name))
    }

    /// Adds the suffix to `name`, unless it already ends with it.
    pub fn resolve_name(&self, name: &str) -> String {
        if !self.suffix.is_empty() && !name.ends_with(&self.suffix) {
            format!("{}{}", name, self.suffix)
        } else {
            name.to_string()
        }
    }

    /// Strips the suffix from `name`, if it ends with it.
    pub fn base_name<'a>(&self, name: &'a str) -> &'a str {
        if self.suffix.is_empty() {
            name
        } else {
            name.strip_suffix(self.suffix.as_str()).unwrap_or(name)
        }
    }

    pub fn out_path(&self) -> PathBuf { self.out_dir.join(&self.out_file) }
}

/// One source of configuration. Every value is optional, so that layers
/// can be stacked.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Layer {
    pub in_dir: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub out_file: Option<String>,
    pub suffix: Option<String>,
    pub patch_suffix: Option<String>,
    pub keep_orm_tags: Option<bool>,
    pub embed: Option<EmbedMode>,
    pub flatten_embedded: Option<bool>,
    pub include_embedded: Option<bool>,
    pub exclude_deprecated: Option<bool>,
    pub exclude_types: Option<Vec<String>>,
    /// `key:value` strings
    pub exclude_by_tags: Option<Vec<String>>,
}

impl Layer {
    pub fn parse(yaml: &str) -> Result<Layer, Error> {
        if yaml.trim().is_empty() {
            return Ok(Layer::default());
        }
        let mut layer: Layer = serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
        layer.resolve_embed()?;
        Ok(layer)
    }

    pub fn load(path: &Path) -> Result<Layer, Error> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("unable to read config file {}: {}", path.display(), e)))?;
        Layer::parse(&contents)
            .map_err(|e| Error::Config(format!("in config file {}: {}", path.display(), e)))
    }

    /// Folds the `flatten_embedded` and `include_embedded` switches into `embed`.
    pub fn resolve_embed(&mut self) -> Result<(), Error> {
        if self.flatten_embedded.is_none() && self.include_embedded.is_none() {
            return Ok(());
        }
        let mode = EmbedMode::from_flags(
            self.flatten_embedded.take().unwrap_or(false),
            self.include_embedded.take().unwrap_or(false),
        )?;
        match self.embed {
            Some(embed) if embed != mode => Err(Error::Config(format!(
                "embed is set to {:?}, but the embedding switches select {:?}",
                embed, mode
            ))),
            _ => {
                self.embed = Some(mode);
                Ok(())
            }
        }
    }

    /// Stacks `over` on top of `self`, values set in `over` win.
    pub fn merge(self, over: Layer) -> Layer {
        Layer {
            in_dir: over.in_dir.or(self.in_dir),
            out_dir: over.out_dir.or(self.out_dir),
            out_file: over.out_file.or(self.out_file),
            suffix: over.suffix.or(self.suffix),
            patch_suffix: over.patch_suffix.or(self.patch_suffix),
            keep_orm_tags: over.keep_orm_tags.or(self.keep_orm_tags),
            embed: over.embed.or(self.embed),
            flatten_embedded: over.flatten_embedded.or(self.flatten_embedded),
            include_embedded: over.include_embedded.or(self.include_embedded),
            exclude_deprecated: over.exclude_deprecated.or(self.exclude_deprecated),
            exclude_types: over.exclude_types.or(self.exclude_types),
            exclude_by_tags: over.exclude_by_tags.or(self.exclude_by_tags),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn embed_mode_is_exclusive() {
        assert_eq!(EmbedMode::from_flags(true, false).unwrap(), EmbedMode::Flatten);
        assert_eq!(EmbedMode::from_flags(false, true).unwrap(), EmbedMode::Include);
        assert!(matches!(EmbedMode::from_flags(true, true), Err(Error::Config(_))));
        assert!(matches!(EmbedMode::from_flags(false, false), Err(Error::Config(_))));
    }

    #[test]
    fn parses_tag_filters() {
        assert_eq!("gorm:<-:create".parse::<TagFilter>().unwrap(), TagFilter::new("gorm", "<-:create"));
        assert_eq!("json:-".parse::<TagFilter>().unwrap(), TagFilter::new("json", "-"));
        assert!("gorm".parse::<TagFilter>().is_err());
        assert!(":value".parse::<TagFilter>().is_err());
        assert!("key:".parse::<TagFilter>().is_err());
    }

    #[test]
    fn defaults() {
        let opts = Options::from_layer(Layer::default()).unwrap();
        assert_eq!(opts, Options::default());
        assert_eq!(opts.out_path(), PathBuf::from("api/api_gen.go"));
    }

    #[test]
    fn later_layers_win() {
        let base = Layer::parse(
            "
suffix: DTO
out_dir: dto
exclude_types: [Secret]
include_embedded: true
",
        )
        .unwrap();
        let over = Layer::parse(
            "
suffix: Model
exclude_by_tags: ['json:-']
",
        )
        .unwrap();
        let opts = Options::from_layer(base.merge(over)).unwrap();
        assert_eq!(opts.suffix, "Model");
        assert_eq!(opts.out_dir, PathBuf::from("dto"));
        assert_eq!(opts.embed, EmbedMode::Include);
        assert_eq!(opts.exclude_types, vec!["Secret".to_string()]);
        assert_eq!(opts.exclude_by_tags, vec![TagFilter::new("json", "-")]);
    }

    #[test]
    fn conflicting_embed_switches_fail() {
        assert!(Layer::parse("flatten_embedded: true\ninclude_embedded: true\n").is_err());
        assert!(Layer::parse("flatten_embedded: false\n").is_err());
        assert!(Layer::parse("embed: flatten\ninclude_embedded: true\n").is_err());
        assert_eq!(
            Layer::parse("embed: include\n").unwrap().embed,
            Some(EmbedMode::Include)
        );
    }

    #[test]
    fn empty_values_fall_back_to_defaults() {
        let mut opts = Options {
            out_dir: PathBuf::new(),
            out_file: String::new(),
            patch_suffix: String::new(),
            exclude_types: vec![" Widget ".to_string(), "".to_string()],
            ..Options::default()
        };
        opts.normalize();
        assert_eq!(opts.out_dir, PathBuf::from("api"));
        assert_eq!(opts.out_file, "api_gen.go");
        assert_eq!(opts.patch_suffix, "Patch");
        assert_eq!(opts.exclude_types, vec!["Widget".to_string()]);
        assert!(opts.is_type_excluded("widget"));
    }

    #[test]
    fn names() {
        let opts = Options {
            suffix: "DTO".to_string(),
            ..Options::default()
        };
        assert_eq!(opts.resolve_name("Widget"), "WidgetDTO");
        assert_eq!(opts.resolve_name("WidgetDTO"), "WidgetDTO");
        assert_eq!(opts.base_name("WidgetDTO"), "Widget");
        assert_eq!(opts.base_name("Widget"), "Widget");
    }
}
