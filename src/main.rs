// Runs one agent session from the command line
//
// Usage: kodegen-agent-sessions <provider> <workspace> <cwd> <message...>
//
// Events are printed as they arrive; Ctrl-C stops the session. Configuration
// comes from KODEGEN_AGENT_CONFIG / KODEGEN_AGENT_DATA_DIR.

use anyhow::{Context, Result, bail};
use kodegen_agent_sessions::{
    OrchestratorConfig, SessionError, SessionEvent, SessionKey, SessionOrchestrator,
    SessionRequest,
};
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let (Some(provider), Some(workspace), Some(cwd)) = (args.next(), args.next(), args.next())
    else {
        bail!("usage: kodegen-agent-sessions <provider> <workspace> <cwd> <message...>");
    };
    let message = args.collect::<Vec<_>>().join(" ");
    if message.trim().is_empty() {
        bail!("message must not be empty");
    }

    let config = OrchestratorConfig::from_env().context("Failed to load configuration")?;
    let orchestrator = SessionOrchestrator::new(config)?;
    let mut events = orchestrator.subscribe();

    let key = SessionKey::new(provider, workspace);
    match orchestrator
        .start(key.clone(), SessionRequest::new(message, cwd))
        .await
    {
        Ok(session_id) => log::info!("[{key}] Session {session_id} running"),
        Err(SessionError::CliNotFound(instructions)) => bail!("{instructions}"),
        Err(e) if e.is_launch_failure() => bail!("Failed to launch agent: {e}"),
        Err(e) => return Err(e.into()),
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SessionEvent::Output { key: from, text }) if from == key => {
                    println!("{}", text.trim_end_matches('\n'));
                }
                Ok(SessionEvent::Error { key: from, text, terminal }) if from == key => {
                    eprintln!("{text}");
                    if terminal {
                        log::error!("[{key}] Session failed");
                        std::process::exit(1);
                    }
                }
                Ok(SessionEvent::Complete { key: from, exit_code }) if from == key => {
                    let code = exit_code.unwrap_or(130);
                    log::info!("[{key}] Session finished with {code}");
                    std::process::exit(code);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("[{key}] Dropped {skipped} events");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                log::info!("[{key}] Interrupted, stopping session");
                if !orchestrator.stop(&key).await {
                    log::warn!("[{key}] Session did not acknowledge cancellation");
                }
            }
        }
    }

    Ok(())
}
