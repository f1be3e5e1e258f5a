use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Highest number of tags a tag bitmask can carry
pub const MAX_TAGS: usize = 32;

/// Name of the implicit tag every unmatched client receives
pub const DEFAULT_TAG: &str = "default";

/// Error types for configuration operations
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration format: {reason}")]
    InvalidFormat { reason: String },

    #[error("Invalid color value: {value}")]
    InvalidColor { value: String },

    #[error("Invalid gravity {name}: {reason}")]
    InvalidGravity { name: String, reason: String },

    #[error("Too many tags: {count} (max {MAX_TAGS})")]
    TooManyTags { count: usize },

    #[error("View {view} references unknown tag {tag}")]
    UnknownTag { view: String, tag: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Modifier used together with the mouse buttons to move or resize clients
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Shift,
    Control,
    Mod1,
    Mod4,
}

/// Client mode names as used by tag rules
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Float,
    Full,
    Stick,
    Urgent,
}

/// Client property a tag pattern is matched against
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchField {
    Class,
    Instance,
    Role,
    Name,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Options {
    /// Border width of client windows
    pub border: u16,
    /// Gap around tiled clients
    pub gap: u16,
    /// Edge snapping distance while moving
    pub snap: u16,
    /// Keyboard move/resize step
    pub step: u16,
    pub panel_height: u16,
    pub top_panel: bool,
    pub bottom_panel: bool,
    /// Screen padding (left, right, top, bottom)
    pub padding: [u16; 4],
    pub focus_follows_mouse: bool,
    pub modifier: Modifier,
    /// Gravity slot for clients no tag places
    pub default_gravity: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            border: 2,
            gap: 0,
            snap: 10,
            step: 5,
            panel_height: 16,
            top_panel: false,
            bottom_panel: false,
            padding: [0, 0, 0, 0],
            focus_follows_mouse: true,
            modifier: Modifier::Mod4,
            default_gravity: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Colors {
    pub focus: String,
    pub normal: String,
    pub panel: String,
}

impl Default for Colors {
    fn default() -> Self {
        Self {
            focus: "#ff00a8".to_string(),
            normal: "#5d5d5d".to_string(),
            panel: "#3d3d3d".to_string(),
        }
    }
}

/// Gravity definition; percentages of the screen extent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GravitySpec {
    pub name: String,
    /// Replace this slot of the built-in table instead of appending
    #[serde(default)]
    pub slot: Option<usize>,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagSpec {
    pub name: String,
    /// Regular expression; a tag without one only applies when set explicitly
    #[serde(rename = "match", default)]
    pub pattern: Option<String>,
    #[serde(default = "TagSpec::default_match_on")]
    pub match_on: Vec<MatchField>,
    #[serde(default)]
    pub modes: Vec<Mode>,
    /// Modes this tag forbids for the client's lifetime
    #[serde(default)]
    pub policies: Vec<Mode>,
    #[serde(default)]
    pub gravity: Option<usize>,
    #[serde(default)]
    pub screen: Option<usize>,
    /// Fixed geometry `[x, y, width, height]`, implies float
    #[serde(default)]
    pub geometry: Option<[i32; 4]>,
}

impl TagSpec {
    fn default_match_on() -> Vec<MatchField> {
        vec![MatchField::Class, MatchField::Instance]
    }

    pub fn new(name: &str, pattern: &str) -> Self {
        Self {
            name: name.to_string(),
            pattern: Some(pattern.to_string()),
            match_on: Self::default_match_on(),
            modes: Vec::new(),
            policies: Vec::new(),
            gravity: None,
            screen: None,
            geometry: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewSpec {
    pub name: String,
    /// Names of the tags shown on this view
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Main configuration. The built-in tags and views of [`Config::default`]
/// only apply without a file; sections missing from a file are empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub options: Options,
    #[serde(default)]
    pub colors: Colors,
    #[serde(default)]
    pub gravities: Vec<GravitySpec>,
    #[serde(default)]
    pub tags: Vec<TagSpec>,
    #[serde(default)]
    pub views: Vec<ViewSpec>,
}

impl Default for Config {
    fn default() -> Self {
        let mut float = TagSpec::new("float", "gimp|imagemagick|mplayer");
        float.modes.push(Mode::Float);

        Self {
            options: Options::default(),
            colors: Colors::default(),
            gravities: Vec::new(),
            tags: vec![
                TagSpec::new("terms", "xterm|[u]?rxvt|alacritty"),
                TagSpec::new("browser", "firefox|chromium"),
                TagSpec::new("editor", "[g]?vim|emacs"),
                float,
            ],
            views: vec![
                ViewSpec { name: "work".to_string(), tags: vec![DEFAULT_TAG.to_string(), "terms".to_string(), "float".to_string()] },
                ViewSpec { name: "dev".to_string(), tags: vec!["editor".to_string(), "terms".to_string()] },
                ViewSpec { name: "web".to_string(), tags: vec!["browser".to_string()] },
            ],
        }
    }
}

impl Config {
    /// Default location of the configuration file
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gravwm")
            .join("config.toml")
    }

    /// Parse and validate a configuration document
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(content)?;
        if config.views.is_empty() {
            config.views.push(ViewSpec { name: DEFAULT_TAG.to_string(), tags: vec![DEFAULT_TAG.to_string()] });
        }
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file; a missing file yields the defaults
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            info!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config = Self::parse(&content)?;
        debug!(
            "Loaded configuration from {}: {} tags, {} views, {} gravities",
            path.display(),
            config.tags.len(),
            config.views.len(),
            config.gravities.len()
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // The default tag occupies the first bit
        if self.tags.len() + 1 > MAX_TAGS {
            return Err(ConfigError::TooManyTags { count: self.tags.len() + 1 });
        }

        for g in &self.gravities {
            for (field, value) in [("x", g.x), ("y", g.y), ("width", g.width), ("height", g.height)] {
                if value > 100 {
                    return Err(ConfigError::InvalidGravity {
                        name: g.name.clone(),
                        reason: format!("{} = {} is not a percentage", field, value),
                    });
                }
            }
            if g.width == 0 || g.height == 0 {
                return Err(ConfigError::InvalidGravity { name: g.name.clone(), reason: "empty extent".to_string() });
            }
        }

        for view in &self.views {
            for tag in &view.tags {
                if tag != DEFAULT_TAG && !self.tags.iter().any(|t| &t.name == tag) {
                    return Err(ConfigError::UnknownTag { view: view.name.clone(), tag: tag.clone() });
                }
            }
        }

        for value in [&self.colors.focus, &self.colors.normal, &self.colors.panel] {
            parse_color(value)?;
        }

        if self.views.is_empty() {
            return Err(ConfigError::InvalidFormat { reason: "at least one view is required".to_string() });
        }

        Ok(())
    }
}

/// Parse a `#rrggbb` color into a pixel value
pub fn parse_color(value: &str) -> Result<u32, ConfigError> {
    let hex = value.strip_prefix('#').unwrap_or(value);
    if hex.len() != 6 {
        return Err(ConfigError::InvalidColor { value: value.to_string() });
    }
    u32::from_str_radix(hex, 16).map_err(|_| ConfigError::InvalidColor { value: value.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r##"
[options]
border = 3
gap = 4
modifier = "mod1"

[colors]
focus = "#00ff00"

[[gravities]]
name = "wide"
x = 50
y = 0
width = 80
height = 100

[[tags]]
name = "terms"
match = "xterm"
gravity = 4

[[tags]]
name = "gimp"
match = "gimp"
match_on = ["class", "role"]
modes = ["float"]
policies = ["full"]
geometry = [10, 10, 640, 480]

[[views]]
name = "one"
tags = ["default", "terms"]

[[views]]
name = "two"
tags = ["gimp"]
"##;

    #[test]
    fn test_parse_sample() {
        let config = Config::parse(SAMPLE).unwrap();
        assert_eq!(config.options.border, 3);
        assert_eq!(config.options.gap, 4);
        assert_eq!(config.options.snap, 10);
        assert_eq!(config.options.modifier, Modifier::Mod1);
        assert_eq!(config.colors.focus, "#00ff00");
        assert_eq!(config.colors.normal, "#5d5d5d");
        assert_eq!(config.gravities[0].slot, None);
        assert_eq!(config.tags[0].match_on, vec![MatchField::Class, MatchField::Instance]);
        assert_eq!(config.tags[1].policies, vec![Mode::Full]);
        assert_eq!(config.tags[1].geometry, Some([10, 10, 640, 480]));
        assert_eq!(config.views.len(), 2);
    }

    #[test]
    fn test_empty_document_synthesizes_view() {
        let config = Config::parse("").unwrap();
        assert!(config.tags.is_empty());
        assert_eq!(config.views.len(), 1);
        assert_eq!(config.views[0].tags, vec![DEFAULT_TAG.to_string()]);
    }

    #[test]
    fn test_tags_only_document() {
        let config = Config::parse("[[tags]]\nname = \"mail\"\nmatch = \"thunderbird\"\n").unwrap();
        assert_eq!(config.tags.len(), 1);
        assert_eq!(config.tags[0].pattern.as_deref(), Some("thunderbird"));
        assert_eq!(config.views, vec![ViewSpec { name: DEFAULT_TAG.to_string(), tags: vec![DEFAULT_TAG.to_string()] }]);
        assert_eq!(config.options, Options::default());
    }

    #[test]
    fn test_validation_errors() {
        let bad_gravity = "[[gravities]]\nname = \"x\"\nx = 101\ny = 0\nwidth = 10\nheight = 10\n";
        assert!(matches!(Config::parse(bad_gravity), Err(ConfigError::InvalidGravity { .. })));

        let bad_view = "[[views]]\nname = \"v\"\ntags = [\"missing\"]\n";
        assert!(matches!(Config::parse(bad_view), Err(ConfigError::UnknownTag { .. })));

        let bad_color = "[colors]\nfocus = \"red\"\n";
        assert!(matches!(Config::parse(bad_color), Err(ConfigError::InvalidColor { .. })));

        assert!(matches!(Config::parse("[options\n"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#ff00a8").unwrap(), 0xff00a8);
        assert_eq!(parse_color("000000").unwrap(), 0);
        assert!(parse_color("#fff").is_err());
    }

    #[tokio::test]
    async fn test_load_missing_file_yields_defaults() {
        let temp_dir = tempdir().unwrap();
        let config = Config::load(temp_dir.path().join("nope.toml")).await.unwrap();
        assert_eq!(config, Config::default());
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, SAMPLE).unwrap();

        let config = Config::load(&config_path).await.unwrap();
        assert_eq!(config.tags.len(), 2);
        assert_eq!(config.views[1].name, "two");
    }
}
