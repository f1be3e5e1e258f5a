//! Views of the published window manager state and the helpers that
//! turn command line arguments into message words.

use anyhow::{anyhow, bail, Result};
use gravwm_proto::WindowFlags;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use x11rb::protocol::xproto::Window;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientInfo {
    pub id: Window,
    pub name: String,
    pub instance: String,
    pub class: String,
    pub mode: String,
    pub flags: u32,
    pub tags: Vec<String>,
    pub gravity: Option<String>,
    pub screen: u32,
    pub view: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewInfo {
    pub id: usize,
    pub name: String,
    pub tags: Vec<String>,
    /// Screens currently showing this view
    pub screens: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagInfo {
    pub id: usize,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenInfo {
    pub id: usize,
    pub view: u32,
    pub workarea: [u32; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GravityInfo {
    pub id: usize,
    pub name: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// How clients are picked on the command line
#[derive(Debug, Clone)]
pub enum Selector {
    Id(Window),
    Pattern(Regex),
}

impl Selector {
    pub fn parse(value: &str) -> Result<Self> {
        if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
            let id = u32::from_str_radix(hex, 16).map_err(|e| anyhow!("Invalid window id {}: {}", value, e))?;
            return Ok(Selector::Id(id));
        }
        let regex = RegexBuilder::new(value).case_insensitive(true).build()?;
        Ok(Selector::Pattern(regex))
    }

    pub fn matches(&self, client: &ClientInfo) -> bool {
        match self {
            Selector::Id(id) => client.id == *id,
            Selector::Pattern(re) => {
                re.is_match(&client.instance) || re.is_match(&client.class) || re.is_match(&client.name)
            }
        }
    }

    /// Matching clients; none at all is an error
    pub fn select<'a>(&self, clients: &'a [ClientInfo]) -> Result<Vec<&'a ClientInfo>> {
        let selected: Vec<_> = clients.iter().filter(|c| self.matches(c)).collect();
        if selected.is_empty() {
            bail!("No client matches {}", self.describe());
        }
        Ok(selected)
    }

    fn describe(&self) -> String {
        match self {
            Selector::Id(id) => format!("{:#x}", id),
            Selector::Pattern(re) => format!("/{}/", re.as_str()),
        }
    }
}

/// Resolve an entry of a published list by index or by name
pub fn resolve(names: &[String], key: &str, what: &str) -> Result<u32> {
    if let Ok(index) = key.parse::<usize>() {
        if index < names.len() {
            return Ok(index as u32);
        }
        bail!("No {} with index {} ({} known)", what, index, names.len());
    }
    names
        .iter()
        .position(|n| n == key)
        .map(|i| i as u32)
        .ok_or_else(|| anyhow!("No {} named {}", what, key))
}

/// Split a property of null-terminated strings
pub fn split_strings(raw: &[u8]) -> Vec<String> {
    raw.split(|&b| b == 0)
        .filter(|s| !s.is_empty())
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect()
}

/// Names of the tags set in a bitmask
pub fn tag_names(mask: u32, tags: &[String]) -> Vec<String> {
    tags.iter()
        .enumerate()
        .filter(|(i, _)| *i < 32 && mask & (1 << i) != 0)
        .map(|(_, name)| name.clone())
        .collect()
}

/// `name x y width height` as published in `GRAVWM_GRAVITY_LIST`
pub fn parse_gravity(id: usize, entry: &str) -> Result<GravityInfo> {
    let fields: Vec<&str> = entry.split_whitespace().collect();
    let [name, x, y, width, height] = fields.as_slice() else {
        bail!("Malformed gravity entry: {:?}", entry);
    };
    Ok(GravityInfo {
        id,
        name: name.to_string(),
        x: x.parse()?,
        y: y.parse()?,
        width: width.parse()?,
        height: height.parse()?,
    })
}

pub fn mode_string(flags: u32) -> String {
    WindowFlags::from_bits_truncate(flags).mode_string()
}

pub fn format_client(client: &ClientInfo) -> String {
    let view = client.view.map_or_else(|| "-".to_string(), |v| v.to_string());
    format!(
        "{:#010x} {} {} {} {} {} ({}) {}",
        client.id,
        client.mode,
        view,
        client.screen,
        client.gravity.as_deref().unwrap_or("-"),
        client.instance,
        client.class,
        client.name
    )
}

pub fn format_view(view: &ViewInfo) -> String {
    let marker = if view.screens.is_empty() { ' ' } else { '*' };
    format!("{:>2} {} {} [{}]", view.id, marker, view.name, view.tags.join(" "))
}

pub fn format_gravity(gravity: &GravityInfo) -> String {
    format!(
        "{:>2} {} {}x{}+{}+{}",
        gravity.id, gravity.name, gravity.width, gravity.height, gravity.x, gravity.y
    )
}

pub fn format_screen(screen: &ScreenInfo) -> String {
    let [x, y, w, h] = screen.workarea;
    format!("{:>2} view {} {}x{}+{}+{}", screen.id, screen.view, w, h, x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(id: Window, instance: &str, name: &str) -> ClientInfo {
        ClientInfo {
            id,
            name: name.to_string(),
            instance: instance.to_string(),
            class: instance.to_uppercase(),
            mode: "----".to_string(),
            flags: 0,
            tags: vec!["default".to_string()],
            gravity: Some("center".to_string()),
            screen: 0,
            view: Some(0),
        }
    }

    #[test]
    fn test_selector_by_id_and_pattern() {
        let clients = vec![client(0x400001, "xterm", "shell"), client(0x600002, "firefox", "Mozilla Firefox")];

        let by_id = Selector::parse("0x600002").unwrap();
        assert_eq!(by_id.select(&clients).unwrap()[0].instance, "firefox");

        let by_name = Selector::parse("mozilla").unwrap();
        assert_eq!(by_name.select(&clients).unwrap().len(), 1);

        let by_class = Selector::parse("^XTERM$").unwrap();
        assert_eq!(by_class.select(&clients).unwrap()[0].id, 0x400001);

        assert!(Selector::parse("gimp").unwrap().select(&clients).is_err());
        assert!(Selector::parse("0xzz").is_err());
    }

    #[test]
    fn test_resolve_by_index_or_name() {
        let names = vec!["default".to_string(), "terms".to_string(), "www".to_string()];
        assert_eq!(resolve(&names, "terms", "tag").unwrap(), 1);
        assert_eq!(resolve(&names, "2", "tag").unwrap(), 2);
        assert!(resolve(&names, "3", "tag").is_err());
        assert!(resolve(&names, "missing", "tag").is_err());
    }

    #[test]
    fn test_split_strings_and_tag_names() {
        let tags = split_strings(b"default\0terms\0www\0");
        assert_eq!(tags, vec!["default", "terms", "www"]);
        assert_eq!(tag_names(0b101, &tags), vec!["default", "www"]);
        assert!(split_strings(b"").is_empty());
    }

    #[test]
    fn test_parse_gravity_entry() {
        let g = parse_gravity(4, "left 0 0 50 100").unwrap();
        assert_eq!((g.id, g.name.as_str(), g.x, g.y, g.width, g.height), (4, "left", 0, 0, 50, 100));
        assert_eq!(format_gravity(&g), " 4 left 50x100+0+0");
        assert!(parse_gravity(0, "broken 1 2").is_err());
    }

    #[test]
    fn test_client_line() {
        let mut c = client(0x400001, "xterm", "shell");
        c.mode = mode_string((WindowFlags::FLOAT | WindowFlags::STICK).bits());
        assert_eq!(format_client(&c), "0x00400001 -OS- 0 0 center xterm (XTERM) shell");
    }

    #[test]
    fn test_client_json() {
        let json = serde_json::to_value(client(1, "xterm", "shell")).unwrap();
        assert_eq!(json["instance"], "xterm");
        assert_eq!(json["tags"][0], "default");
    }
}
