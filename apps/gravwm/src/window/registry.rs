use std::collections::HashMap;

use x11rb::protocol::xproto::Window;

use crate::window::client::Client;

/// Managed clients in management order with a window id index.
///
/// The order is the order of `_NET_CLIENT_LIST`; removing a client keeps the
/// relative order of the others.
#[derive(Default)]
pub struct Registry {
    clients: Vec<Client>,
    index: HashMap<Window, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn contains(&self, window: Window) -> bool {
        self.index.contains_key(&window)
    }

    pub fn insert(&mut self, client: Client) {
        if let Some(&i) = self.index.get(&client.window) {
            self.clients[i] = client;
            return;
        }
        self.index.insert(client.window, self.clients.len());
        self.clients.push(client);
    }

    pub fn remove(&mut self, window: Window) -> Option<Client> {
        let i = self.index.remove(&window)?;
        let client = self.clients.remove(i);
        for idx in self.index.values_mut() {
            if *idx > i {
                *idx -= 1;
            }
        }
        Some(client)
    }

    pub fn get(&self, window: Window) -> Option<&Client> {
        self.index.get(&window).map(|&i| &self.clients[i])
    }

    pub fn get_mut(&mut self, window: Window) -> Option<&mut Client> {
        match self.index.get(&window) {
            Some(&i) => self.clients.get_mut(i),
            None => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.clients.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Client> {
        self.clients.iter_mut()
    }

    /// Window ids in registry order
    pub fn windows(&self) -> Vec<Window> {
        self.clients.iter().map(|c| c.window).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::Rect;

    fn client(window: Window) -> Client {
        Client::new(window, Rect::new(0, 0, 10, 10), 1, 5, 0)
    }

    #[test]
    fn test_order_survives_removal() {
        let mut registry = Registry::new();
        for w in [10, 20, 30, 40] {
            registry.insert(client(w));
        }
        assert_eq!(registry.remove(20).map(|c| c.window), Some(20));
        assert_eq!(registry.windows(), vec![10, 30, 40]);
        assert_eq!(registry.get(40).map(|c| c.window), Some(40));
        assert!(registry.remove(20).is_none());

        registry.insert(client(50));
        assert_eq!(registry.windows(), vec![10, 30, 40, 50]);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut registry = Registry::new();
        registry.insert(client(1));
        registry.insert(client(2));
        let mut updated = client(1);
        updated.name = "again".into();
        registry.insert(updated);
        assert_eq!(registry.windows(), vec![1, 2]);
        assert_eq!(registry.get(1).map(|c| c.name.as_str()), Some("again"));
    }
}
