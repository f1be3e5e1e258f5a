mod display;
mod model;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gravwm_proto::{pack_name, Message, Restack, StateAction, DATA_WORDS};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use x11rb::protocol::xproto::Window;

use crate::display::Display;
use crate::model::{resolve, Selector};

/// Source indication for pager requests
const SOURCE_PAGER: u32 = 2;

#[derive(Parser, Debug)]
#[command(name = "gravwmctl")]
#[command(about = "Remote control for the gravwm window manager")]
struct Cli {
    /// Print list output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// X display to talk to
    #[arg(long, global = true)]
    display: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Managed windows
    Client {
        #[command(subcommand)]
        command: ClientCommands,
    },
    /// Views (desktops)
    View {
        #[command(subcommand)]
        command: ViewCommands,
    },
    Tag {
        #[command(subcommand)]
        command: TagCommands,
    },
    Screen {
        #[command(subcommand)]
        command: ListCommand,
    },
    Gravity {
        #[command(subcommand)]
        command: ListCommand,
    },
    /// Reload the configuration
    Reload,
    /// Leave the window manager
    Quit,
}

/// Clients are given as `0x…` window id or as regex over class, instance and name
#[derive(Subcommand, Debug)]
enum ClientCommands {
    List,
    Find { client: String },
    Focus { client: String },
    /// Toggle fullscreen
    Full { client: String },
    /// Toggle floating
    Float { client: String },
    /// Toggle sticky
    Stick { client: String },
    Tag { client: String, tag: String },
    Untag { client: String, tag: String },
    Gravity { client: String, gravity: String },
    Screen { client: String, screen: u32 },
    /// Close gracefully
    Kill { client: String },
    Raise { client: String },
    Lower { client: String },
}

/// Views and tags are given by index or name
#[derive(Subcommand, Debug)]
enum ViewCommands {
    List,
    Jump { view: String },
    New { name: String },
    Kill { view: String },
    Tag { view: String, tag: String },
    Untag { view: String, tag: String },
}

#[derive(Subcommand, Debug)]
enum TagCommands {
    List,
    New { name: String },
    Kill { tag: String },
}

#[derive(Subcommand, Debug)]
enum ListCommand {
    List,
}

fn words(values: &[u32]) -> [u32; DATA_WORDS] {
    let mut data = [0; DATA_WORDS];
    for (slot, value) in data.iter_mut().zip(values) {
        *slot = *value;
    }
    data
}

fn print_list<T: Serialize>(items: &[T], json: bool, line: impl Fn(&T) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
    } else {
        for item in items {
            println!("{}", line(item));
        }
    }
    Ok(())
}

fn selected(display: &Display, client: &str) -> Result<Vec<Window>> {
    let selector = Selector::parse(client)?;
    let clients = display.clients()?;
    Ok(selector.select(&clients)?.iter().map(|c| c.id).collect())
}

/// Send one root message per selected client, the client id in the first word
fn for_each_client(display: &Display, client: &str, message: Message, rest: &[u32]) -> Result<()> {
    for window in selected(display, client)? {
        let mut values = vec![window];
        values.extend_from_slice(rest);
        display.send(message, None, words(&values))?;
    }
    Ok(())
}

fn toggle_state(display: &Display, client: &str, state: &str) -> Result<()> {
    let atom = display.atom(state)?;
    for window in selected(display, client)? {
        let data = words(&[StateAction::Toggle as u32, atom, 0, SOURCE_PAGER]);
        display.send(Message::WmState, Some(window), data)?;
    }
    Ok(())
}

fn restack(display: &Display, client: &str, detail: Restack) -> Result<()> {
    for window in selected(display, client)? {
        display.send(Message::RestackWindow, None, words(&[SOURCE_PAGER, window, detail as u32]))?;
    }
    Ok(())
}

fn client_command(display: &Display, command: ClientCommands, json: bool) -> Result<()> {
    match command {
        ClientCommands::List => print_list(&display.clients()?, json, model::format_client),
        ClientCommands::Find { client } => {
            let selector = Selector::parse(&client)?;
            let clients = display.clients()?;
            let found: Vec<_> = selector.select(&clients)?.into_iter().cloned().collect();
            print_list(&found, json, model::format_client)
        }
        ClientCommands::Focus { client } => {
            for window in selected(display, &client)? {
                display.send(Message::ActiveWindow, Some(window), words(&[SOURCE_PAGER]))?;
            }
            Ok(())
        }
        ClientCommands::Full { client } => toggle_state(display, &client, "_NET_WM_STATE_FULLSCREEN"),
        ClientCommands::Float { client } => toggle_state(display, &client, "_NET_WM_STATE_ABOVE"),
        ClientCommands::Stick { client } => toggle_state(display, &client, "_NET_WM_STATE_STICKY"),
        ClientCommands::Tag { client, tag } => {
            let tag = resolve(&display.tag_names()?, &tag, "tag")?;
            for_each_client(display, &client, Message::WindowTag, &[tag])
        }
        ClientCommands::Untag { client, tag } => {
            let tag = resolve(&display.tag_names()?, &tag, "tag")?;
            for_each_client(display, &client, Message::WindowUntag, &[tag])
        }
        ClientCommands::Gravity { client, gravity } => {
            let gravity = resolve(&display.gravity_names()?, &gravity, "gravity")?;
            for_each_client(display, &client, Message::WindowGravity, &[gravity])
        }
        ClientCommands::Screen { client, screen } => {
            for_each_client(display, &client, Message::WindowScreen, &[screen])
        }
        ClientCommands::Kill { client } => {
            for window in selected(display, &client)? {
                display.send(Message::CloseWindow, Some(window), words(&[x11rb::CURRENT_TIME, SOURCE_PAGER]))?;
            }
            Ok(())
        }
        ClientCommands::Raise { client } => restack(display, &client, Restack::Above),
        ClientCommands::Lower { client } => restack(display, &client, Restack::Below),
    }
}

fn view_command(display: &Display, command: ViewCommands, json: bool) -> Result<()> {
    match command {
        ViewCommands::List => print_list(&display.views()?, json, model::format_view),
        ViewCommands::Jump { view } => {
            let view = resolve(&display.view_names()?, &view, "view")?;
            display.send(Message::CurrentDesktop, None, words(&[view, x11rb::CURRENT_TIME]))
        }
        ViewCommands::New { name } => display.send(Message::ViewNew, None, pack_name(&name)?),
        ViewCommands::Kill { view } => {
            let view = resolve(&display.view_names()?, &view, "view")?;
            display.send(Message::ViewKill, None, words(&[view]))
        }
        ViewCommands::Tag { view, tag } => view_tag(display, &view, &tag, Message::ViewTag),
        ViewCommands::Untag { view, tag } => view_tag(display, &view, &tag, Message::ViewUntag),
    }
}

fn view_tag(display: &Display, view: &str, tag: &str, message: Message) -> Result<()> {
    let view = resolve(&display.view_names()?, view, "view")?;
    let tag = resolve(&display.tag_names()?, tag, "tag")?;
    display.send(message, None, words(&[view, tag]))
}

fn tag_command(display: &Display, command: TagCommands, json: bool) -> Result<()> {
    match command {
        TagCommands::List => print_list(&display.tags()?, json, |t| format!("{:>2} {}", t.id, t.name)),
        TagCommands::New { name } => display.send(Message::TagNew, None, pack_name(&name)?),
        TagCommands::Kill { tag } => {
            let tag = resolve(&display.tag_names()?, &tag, "tag")?;
            display.send(Message::TagKill, None, words(&[tag]))
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let display = Display::open(cli.display.as_deref())?;

    match cli.command {
        Commands::Client { command } => client_command(&display, command, cli.json),
        Commands::View { command } => view_command(&display, command, cli.json),
        Commands::Tag { command } => tag_command(&display, command, cli.json),
        Commands::Screen { command: ListCommand::List } => {
            print_list(&display.screens()?, cli.json, model::format_screen)
        }
        Commands::Gravity { command: ListCommand::List } => {
            print_list(&display.gravities()?, cli.json, model::format_gravity)
        }
        Commands::Reload => display.send(Message::Reload, None, words(&[])),
        Commands::Quit => display.send(Message::Quit, None, words(&[])),
    }
}
