use anyhow::{anyhow, Result};
use tracing::info;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{AtomEnum, ConnectionExt, CreateWindowAux, EventMask, PropMode, Window, WindowClass};
use x11rb::wrapper::ConnectionExt as _;

use crate::core::backend::Backend;
use crate::core::context::Context;
use crate::ewmh::atoms::Prop;

pub const WM_NAME: &str = "gravwm";

/// Windows owned by the window manager itself
pub struct Support {
    pub check_window: Window,
    pub selection_window: Window,
}

/// Take the `WM_Sn` manager selection. An existing owner is only replaced
/// with `replace`.
pub fn acquire_wm_selection(ctx: &Context, replace: bool) -> Result<Window> {
    let atom_name = format!("WM_S{}", ctx.screen_num);
    let selection = ctx.conn.intern_atom(false, atom_name.as_bytes())?.reply()?.atom;

    let owner = ctx.conn.get_selection_owner(selection)?.reply()?.owner;
    if owner != x11rb::NONE {
        if !replace {
            return Err(anyhow!(
                "Another window manager is already running on screen {}. Use --replace to replace it.",
                ctx.screen_num
            ));
        }
        info!("Another window manager owns {} ({:#x}), replacing", atom_name, owner);
    }

    let window = ctx.conn.generate_id()?;
    ctx.conn.create_window(
        x11rb::COPY_DEPTH_FROM_PARENT,
        window,
        ctx.root_window,
        -1,
        -1,
        1,
        1,
        0,
        WindowClass::INPUT_ONLY,
        x11rb::COPY_FROM_PARENT,
        &CreateWindowAux::new().event_mask(EventMask::STRUCTURE_NOTIFY),
    )?;
    ctx.conn.set_selection_owner(window, selection, x11rb::CURRENT_TIME)?;

    let new_owner = ctx.conn.get_selection_owner(selection)?.reply()?.owner;
    if new_owner != window {
        return Err(anyhow!("Failed to acquire WM selection {}", atom_name));
    }
    info!("Acquired WM selection: {}", atom_name);
    Ok(window)
}

/// Announce EWMH compliance: the supporting check window and `_NET_SUPPORTED`
pub fn setup_hints(ctx: &Context) -> Result<Window> {
    let check = ctx.conn.generate_id()?;
    ctx.conn.create_window(
        x11rb::COPY_DEPTH_FROM_PARENT,
        check,
        ctx.root_window,
        -1,
        -1,
        1,
        1,
        0,
        WindowClass::INPUT_OUTPUT,
        0,
        &CreateWindowAux::new().override_redirect(1),
    )?;

    let check_atom = ctx.atoms._NET_SUPPORTING_WM_CHECK;
    ctx.conn.change_property32(PropMode::REPLACE, check, check_atom, AtomEnum::WINDOW, &[check])?;
    ctx.conn.change_property32(PropMode::REPLACE, ctx.root_window, check_atom, AtomEnum::WINDOW, &[check])?;
    ctx.conn.change_property8(
        PropMode::REPLACE,
        check,
        ctx.atoms._NET_WM_NAME,
        ctx.atoms.UTF8_STRING,
        WM_NAME.as_bytes(),
    )?;

    let supported: Vec<u32> = Prop::supported().into_iter().map(|prop| ctx.atom(prop)).collect();
    ctx.conn.change_property32(
        PropMode::REPLACE,
        ctx.root_window,
        ctx.atoms._NET_SUPPORTED,
        AtomEnum::ATOM,
        &supported,
    )?;

    info!("EWMH hints set, {} atoms supported", supported.len());
    Ok(check)
}

/// Drop the root properties a restarted or replacing manager would
/// otherwise see as stale
pub fn teardown_hints(ctx: &Context, support: &Support) -> Result<()> {
    ctx.conn.delete_property(ctx.root_window, ctx.atoms._NET_SUPPORTING_WM_CHECK)?;
    ctx.conn.delete_property(ctx.root_window, ctx.atoms._NET_SUPPORTED)?;
    ctx.conn.destroy_window(support.check_window)?;
    ctx.conn.destroy_window(support.selection_window)?;
    Ok(())
}
