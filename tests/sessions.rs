mod support;

use std::fs;

use agent_provider::{Message, Role};
use chat_agent::app::{SubmitOutcome, APPROVAL_PENDING_NOTICE};
use chat_agent::mediator::{ApprovalDecision, PendingApproval};
use chat_agent::session::SystemPromptTemplate;
use pretty_assertions::assert_eq;
use support::{harness, harness_with_prompt, requesting, shell_call};

#[test]
fn resume_of_unknown_session_starts_empty_with_notice() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut h = harness(dir.path(), Vec::new());

    assert_eq!(
        h.app.on_submit("/chat resume nosuchname"),
        SubmitOutcome::Ready
    );

    assert!(h.app.session().log().is_empty());
    assert_eq!(h.app.session().name(), "nosuchname");
    assert_eq!(
        h.app.take_output(),
        vec!["No session named 'nosuchname' found. Starting a new one.".to_string()]
    );
}

#[test]
fn saved_session_resumes_in_a_fresh_app() {
    let dir = tempfile::tempdir().expect("tempdir");
    let prompt = SystemPromptTemplate::from_text("You are terse.");
    let mut first = harness_with_prompt(
        dir.path(),
        vec![Ok(Message::assistant("hi"))],
        prompt.clone(),
    );
    first.app.on_submit("hello");
    first.app.on_submit("/chat save work");
    assert_eq!(
        first.app.take_output().last().map(String::as_str),
        Some("Session 'work' saved.")
    );

    let mut second = harness_with_prompt(dir.path(), Vec::new(), prompt);
    second.app.on_submit("/chat resume work");

    assert_eq!(
        second.app.session().log().all_messages(),
        first.app.session().log().all_messages()
    );
    assert_eq!(
        second.app.take_output(),
        vec![
            "Resumed session: work".to_string(),
            "You: hello\nLLM: hi".to_string(),
        ]
    );
}

#[test]
fn resume_reapplies_current_system_prompt() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut old = harness_with_prompt(
        dir.path(),
        Vec::new(),
        SystemPromptTemplate::from_text("old prompt"),
    );
    old.app.on_submit("/chat save notes");

    let mut new = harness_with_prompt(
        dir.path(),
        Vec::new(),
        SystemPromptTemplate::from_text("new prompt"),
    );
    new.app.on_submit("/chat resume notes");

    let log = new.app.session().log().all_messages();
    assert_eq!(log, &[Message::system("new prompt")]);
}

#[test]
fn save_without_name_uses_current_session_name() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut h = harness(dir.path(), Vec::new());

    h.app.on_submit("/chat save");

    assert!(dir.path().join("chats").join("default.json").is_file());
    assert_eq!(h.app.take_output(), vec!["Session 'default' saved.".to_string()]);
}

#[test]
fn new_session_clears_log_and_keeps_prompt() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut h = harness_with_prompt(
        dir.path(),
        vec![Ok(Message::assistant("hi"))],
        SystemPromptTemplate::from_text("P"),
    );
    h.app.on_submit("hello");

    h.app.on_submit("/chat new");

    assert_eq!(h.app.session().log().all_messages(), &[Message::system("P")]);
}

#[test]
fn list_shows_saved_sessions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut h = harness(dir.path(), Vec::new());

    h.app.on_submit("/chat list");
    h.app.on_submit("/chat save beta");
    h.app.on_submit("/chat save alpha");
    h.app.take_output();
    h.app.on_submit("/chat list");

    assert_eq!(
        h.app.take_output(),
        vec!["Saved sessions: alpha, beta".to_string()]
    );
}

#[test]
fn corrupt_session_file_is_reported_and_replaced_by_empty_log() {
    let dir = tempfile::tempdir().expect("tempdir");
    let chats = dir.path().join("chats");
    fs::create_dir_all(&chats).expect("create chats dir");
    fs::write(chats.join("broken.json"), "not json").expect("write corrupt session");
    let mut h = harness(dir.path(), Vec::new());

    h.app.on_submit("/chat resume broken");

    assert!(h.app.session().log().is_empty());
    let output = h.app.take_output();
    assert!(output[0].starts_with("Session 'broken' could not be loaded"));
}

#[test]
fn invalid_session_name_is_refused() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut h = harness(dir.path(), Vec::new());

    h.app.on_submit("/chat save ../outside");

    assert!(!dir.path().join("outside.json").exists());
    assert!(h.app.take_output()[0].starts_with("Error: failed to save session"));
    assert_eq!(h.app.session().name(), "default");
}

#[test]
fn quit_saves_and_exits() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut h = harness(dir.path(), vec![Ok(Message::assistant("hi"))]);
    h.app.on_submit("hello");
    h.app.take_output();

    assert_eq!(h.app.on_submit("/exit"), SubmitOutcome::Exit);

    assert!(h.app.should_exit());
    assert_eq!(h.app.take_output(), vec!["Session 'default' saved.".to_string()]);
    let saved = fs::read_to_string(dir.path().join("chats").join("default.json"))
        .expect("session saved on quit");
    assert!(saved.contains("\"hello\""));
}

#[test]
fn shutdown_during_pending_approval_saves_only_resolved_messages() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut h = harness(dir.path(), vec![requesting(vec![shell_call("c1", "ls")])]);
    let outcome = h.app.on_submit("list files");
    assert!(matches!(outcome, SubmitOutcome::NeedsApproval(_)));

    h.app.shutdown();

    let saved = session_store::SessionStore::new(dir.path().join("chats"))
        .load("default")
        .expect("load succeeds")
        .expect("session exists");
    let roles = saved.iter().map(|message| message.role).collect::<Vec<_>>();
    assert_eq!(roles, vec![Role::User]);

    // A late decision has nothing left to resolve.
    assert_eq!(h.app.on_approval(ApprovalDecision::Allow), SubmitOutcome::Ready);
    assert!(h.executor.commands().is_empty());
}

#[test]
fn session_switch_waits_for_pending_approval() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut h = harness(
        dir.path(),
        vec![
            requesting(vec![shell_call("call_1", "ls")]),
            Ok(Message::assistant("Not listing.")),
        ],
    );
    h.app.on_submit("list files");
    let pending = SubmitOutcome::NeedsApproval(PendingApproval {
        call_id: "call_1".to_string(),
        command: "ls".to_string(),
    });

    assert_eq!(h.app.on_submit("/chat new"), pending);
    assert_eq!(h.app.on_submit("/chat resume other"), pending);
    assert_eq!(
        h.app.take_output(),
        vec![
            APPROVAL_PENDING_NOTICE.to_string(),
            APPROVAL_PENDING_NOTICE.to_string()
        ]
    );
    assert_eq!(h.app.session().name(), "default");

    assert_eq!(h.app.on_approval(ApprovalDecision::Deny), SubmitOutcome::Ready);
    let roles: Vec<Role> = h
        .app
        .session()
        .log()
        .all_messages()
        .iter()
        .map(|message| message.role)
        .collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]
    );
}
