use crate::{
    client::ClaudeCli,
    clock::{Clock, SystemClock},
    config::Settings,
    display,
    error::SessionError,
    manager::SessionManager,
    storage::FileSessionStore,
    Args, Commands,
};
use anyhow::Result;

type Manager = SessionManager<FileSessionStore, ClaudeCli, SystemClock>;

pub fn run(args: &Args, command: Commands) -> Result<()> {
    let settings = Settings::load(args.config.as_deref())?;
    tracing::debug!(?settings, "settings loaded");

    let store = FileSessionStore::new(settings.session_file.clone());
    tracing::debug!(path = %store.path().display(), "using session file");

    let manager = SessionManager::new(
        store,
        ClaudeCli::new(&settings),
        SystemClock,
        settings.session_duration()?,
    );

    match command {
        Commands::StartNow { force } => start_now(&manager, force),
        Commands::Status => status(&manager),
        Commands::Refresh => refresh(&manager),
        Commands::Stop => stop(&manager),
    }
}

fn start_now(manager: &Manager, force: bool) -> Result<()> {
    if !force && manager.is_session_active()? {
        let current = manager.get_session_info()?;
        println!("{}", display::success("A session is already active."));
        println!("{}", display::format_session_info(&current, SystemClock.now()));
        println!("Use --force to start a new one.");
        return Ok(());
    }

    println!("Contacting Claude CLI...");
    let session = manager.activate_session()?;
    println!("{}", display::success("Session activated."));
    println!("{}", display::format_session_info(&session, SystemClock.now()));
    Ok(())
}

fn status(manager: &Manager) -> Result<()> {
    match manager.get_session_info() {
        Ok(session) => {
            println!("{}", display::format_session_info(&session, SystemClock.now()));
            Ok(())
        }
        Err(SessionError::NotFound(_)) => {
            println!("{}", display::failure("No active session."));
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn refresh(manager: &Manager) -> Result<()> {
    let session = manager.refresh_session()?;
    println!("{}", display::success("Session refreshed."));
    println!("{}", display::format_session_info(&session, SystemClock.now()));
    Ok(())
}

fn stop(manager: &Manager) -> Result<()> {
    manager.delete_session()?;
    println!("{}", display::success("Session deleted."));
    Ok(())
}
