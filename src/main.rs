use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use chat_agent::app::{ChatApp, SubmitOutcome};
use chat_agent::config::AppConfig;
use chat_agent::logging::init_tracing;
use chat_agent::mediator::{ApprovalDecision, ToolCallMediator};
use chat_agent::providers::provider_from_config;
use chat_agent::session::{SessionManager, SystemPromptTemplate};
use chat_agent::tools::ShellExecutor;
use chat_agent::ui::{ChatUi, InputEvent, TerminalUi, USER_PROMPT};
use session_store::SessionStore;

fn main() -> io::Result<()> {
    let config = AppConfig::from_env().map_err(io::Error::other)?;
    if let Err(error) = init_tracing(&config.log_filter) {
        eprintln!("{error}");
    }

    let provider = provider_from_config(&config).map_err(io::Error::other)?;
    let profile = provider.profile();
    tracing::info!(provider = %profile.provider_id, model = %profile.model_id, "starting chat");

    let prompt = SystemPromptTemplate::load(&config.prompt_file);
    let session = SessionManager::new(SessionStore::new(&config.sessions_dir), prompt);
    let executor = ShellExecutor::new().with_timeout(config.shell_timeout);
    let mediator = ToolCallMediator::new(provider, Box::new(executor));
    let app = Arc::new(Mutex::new(ChatApp::new(session, mediator)));

    install_interrupt_handler(Arc::clone(&app))?;

    let mut ui = TerminalUi::stdio();
    ui.render_log(&format!(
        "Chatting with {} via {}. Type /help for commands, /quit to exit.",
        profile.model_id, profile.provider_id
    ))?;

    loop {
        let mut outcome = match ui.read_input(USER_PROMPT)? {
            InputEvent::Text(text) => lock_unpoisoned(&app).on_submit(&text),
            InputEvent::EndOfInput => {
                lock_unpoisoned(&app).shutdown();
                SubmitOutcome::Exit
            }
        };

        loop {
            render_pending_output(&app, &mut ui)?;
            outcome = match outcome {
                SubmitOutcome::Ready => break,
                SubmitOutcome::Exit => return Ok(()),
                SubmitOutcome::NeedsApproval(pending) => {
                    let decision = ui.request_shell_confirmation(&pending.command)?;
                    if decision == ApprovalDecision::Cancel {
                        ui.render_log("Command cancelled.")?;
                    }
                    lock_unpoisoned(&app).on_approval(decision)
                }
                SubmitOutcome::NeedsAttachmentPrompt(pending) => match ui.read_input(pending.prompt())? {
                    InputEvent::Text(text) => lock_unpoisoned(&app).on_attachment_prompt(&text),
                    InputEvent::EndOfInput => {
                        lock_unpoisoned(&app).shutdown();
                        SubmitOutcome::Exit
                    }
                },
            };
        }
    }
}

fn render_pending_output(app: &Mutex<ChatApp>, ui: &mut impl ChatUi) -> io::Result<()> {
    let lines = lock_unpoisoned(app).take_output();
    for line in lines {
        ui.render_log(&line)?;
    }
    Ok(())
}

#[cfg(unix)]
fn install_interrupt_handler(app: Arc<Mutex<ChatApp>>) -> io::Result<()> {
    use std::io::Write;

    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    const INTERRUPTED_EXIT_CODE: i32 = 130;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    std::thread::Builder::new()
        .name("chat-interrupt".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                tracing::info!(signal, "interrupted; saving session");
                // Blocks until an in-flight turn releases the app.
                let mut app = lock_unpoisoned(&app);
                app.shutdown();
                let mut stdout = io::stdout().lock();
                let _ = writeln!(stdout);
                for line in app.take_output() {
                    let _ = writeln!(stdout, "{line}");
                }
                let _ = stdout.flush();
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
        })?;
    Ok(())
}

#[cfg(not(unix))]
fn install_interrupt_handler(_app: Arc<Mutex<ChatApp>>) -> io::Result<()> {
    Ok(())
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
