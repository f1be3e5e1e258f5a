/// Virtual desktop selecting clients by tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub name: String,
    pub tags: u32,
}

impl View {
    pub fn new(name: &str, tags: u32) -> Self {
        Self { name: name.to_string(), tags }
    }

    /// Whether a client with `client_tags` is visible on this view
    pub fn shows(&self, client_tags: u32) -> bool {
        self.tags & client_tags != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shows() {
        let view = View::new("work", 0b101);
        assert!(view.shows(0b001));
        assert!(view.shows(0b110));
        assert!(!view.shows(0b010));
        assert!(!View::new("empty", 0).shows(u32::MAX));
    }
}
