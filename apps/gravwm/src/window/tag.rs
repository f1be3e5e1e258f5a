use gravwm_config::{MatchField, Mode, TagSpec, DEFAULT_TAG};
use regex::{Regex, RegexBuilder};

use crate::core::geometry::Rect;
use crate::window::client::{Client, ClientFlags};

/// Bit of the implicit default tag
pub const DEFAULT_TAG_BIT: u32 = 1;

#[derive(Debug, Clone)]
pub struct Tag {
    pub name: String,
    pub pattern: Option<Regex>,
    pub match_on: Vec<MatchField>,
    /// Mode bits applied on match
    pub modes: ClientFlags,
    /// Veto bits applied on match
    pub policies: ClientFlags,
    pub gravity: Option<usize>,
    pub screen: Option<usize>,
    pub geometry: Option<Rect>,
}

fn mode_flag(mode: Mode) -> ClientFlags {
    match mode {
        Mode::Float => ClientFlags::MODE_FLOAT,
        Mode::Full => ClientFlags::MODE_FULL,
        Mode::Stick => ClientFlags::MODE_STICK,
        Mode::Urgent => ClientFlags::MODE_URGENT,
    }
}

impl Tag {
    /// Tag without a rule; only applied explicitly
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pattern: None,
            match_on: vec![MatchField::Class, MatchField::Instance],
            modes: ClientFlags::empty(),
            policies: ClientFlags::empty(),
            gravity: None,
            screen: None,
            geometry: None,
        }
    }

    pub fn default_tag() -> Self {
        Self::named(DEFAULT_TAG)
    }

    pub fn from_spec(spec: &TagSpec) -> Result<Self, regex::Error> {
        let pattern = match &spec.pattern {
            Some(p) => Some(RegexBuilder::new(p).case_insensitive(true).build()?),
            None => None,
        };

        let modes = spec.modes.iter().fold(ClientFlags::empty(), |acc, &m| acc | mode_flag(m));
        let policies = spec
            .policies
            .iter()
            .fold(ClientFlags::empty(), |acc, &m| acc | ClientFlags::veto_for(mode_flag(m)));

        Ok(Self {
            name: spec.name.clone(),
            pattern,
            match_on: spec.match_on.clone(),
            modes,
            policies,
            gravity: spec.gravity,
            screen: spec.screen,
            geometry: spec.geometry.map(|[x, y, w, h]| Rect::new(x, y, w.max(1), h.max(1))),
        })
    }

    pub fn matches(&self, client: &Client) -> bool {
        let Some(pattern) = &self.pattern else { return false; };
        self.match_on
            .iter()
            .filter_map(|&field| client.match_field(field))
            .any(|value| pattern.is_match(value))
    }
}

/// Bit for tag index `id`
pub fn tag_bit(id: usize) -> u32 {
    if id < 32 { 1 << id } else { 0 }
}

/// Remove bit `id` from `mask` and shift the higher bits down by one
pub fn remove_bit(mask: u32, id: usize) -> u32 {
    if id >= 32 {
        return mask;
    }
    let low = mask & ((1u32 << id) - 1);
    let high = if id == 31 { 0 } else { (mask >> (id + 1)) << id };
    low | high
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(instance: &str, class: &str) -> Client {
        let mut c = Client::new(1, Rect::new(0, 0, 10, 10), 1, 5, 0);
        c.instance = instance.to_string();
        c.class = class.to_string();
        c
    }

    #[test]
    fn test_matching_fields() {
        let mut spec = TagSpec::new("terms", "xterm|urxvt");
        let tag = Tag::from_spec(&spec).unwrap();
        assert!(tag.matches(&client("xterm", "XTerm")));
        assert!(tag.matches(&client("foo", "URxvt")));
        assert!(!tag.matches(&client("firefox", "Firefox")));

        spec.match_on = vec![MatchField::Role];
        let tag = Tag::from_spec(&spec).unwrap();
        assert!(!tag.matches(&client("xterm", "XTerm")));
    }

    #[test]
    fn test_modes_and_policies() {
        let mut spec = TagSpec::new("gimp", "gimp");
        spec.modes = vec![Mode::Float, Mode::Stick];
        spec.policies = vec![Mode::Full];
        spec.geometry = Some([10, 20, 300, 0]);
        let tag = Tag::from_spec(&spec).unwrap();
        assert_eq!(tag.modes, ClientFlags::MODE_FLOAT | ClientFlags::MODE_STICK);
        assert_eq!(tag.policies, ClientFlags::NO_FULL);
        assert_eq!(tag.geometry, Some(Rect::new(10, 20, 300, 1)));
    }

    #[test]
    fn test_unruled_tag_never_matches() {
        assert!(!Tag::named("manual").matches(&client("manual", "manual")));
        assert!(Tag::from_spec(&TagSpec::new("bad", "(")).is_err());
    }

    #[test]
    fn test_remove_bit() {
        assert_eq!(remove_bit(0b1011, 1), 0b101);
        assert_eq!(remove_bit(0b1011, 3), 0b011);
        assert_eq!(remove_bit(0b1, 0), 0);
        assert_eq!(remove_bit(u32::MAX, 31), u32::MAX >> 1);
        assert_eq!(tag_bit(3), 8);
        assert_eq!(tag_bit(40), 0);
    }
}
