use std::collections::HashMap;

use tracing::debug;
use x11rb::protocol::xproto::Window;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    ClientCreate,
    ClientConfigure,
    ClientFocus,
    ClientKill,
    ViewJump,
    TileWeight,
}

/// Data handed to a hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookArgs {
    Client(Window),
    View { view: usize, screen: usize },
    Weight { window: Window, weight: u8 },
}

pub type Hook = Box<dyn FnMut(&HookArgs)>;

/// Callbacks standing in for a scripting layer
#[derive(Default)]
pub struct Hooks {
    hooks: HashMap<HookEvent, Vec<Hook>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, event: HookEvent, hook: Hook) {
        self.hooks.entry(event).or_default().push(hook);
    }

    pub fn fire(&mut self, event: HookEvent, args: HookArgs) {
        if let Some(hooks) = self.hooks.get_mut(&event) {
            debug!("Hook {:?}: {:?} ({} callbacks)", event, args, hooks.len());
            for hook in hooks.iter_mut() {
                hook(&args);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_fire_only_matching_event() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut hooks = Hooks::new();
        let sink = Rc::clone(&seen);
        hooks.add(HookEvent::ClientFocus, Box::new(move |args| sink.borrow_mut().push(*args)));

        hooks.fire(HookEvent::ClientKill, HookArgs::Client(1));
        hooks.fire(HookEvent::ClientFocus, HookArgs::Client(2));
        assert_eq!(*seen.borrow(), vec![HookArgs::Client(2)]);
    }
}
