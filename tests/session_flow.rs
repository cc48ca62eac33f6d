use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use portablemind::prompts::SYSTEM_PROMPT;
use portablemind::{
    CompletionClient, EndpointError, OnFragment, Role, Session, SessionError, SessionState,
    Turn,
};
use tokio::sync::mpsc;

/// Replies with canned fragments, one script per request.
struct Scripted {
    replies: Mutex<Vec<Vec<&'static str>>>,
    contexts: Mutex<Vec<Vec<Turn>>>,
}

impl Scripted {
    fn new(replies: Vec<Vec<&'static str>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().rev().collect()),
            contexts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CompletionClient for Scripted {
    async fn send(
        &self,
        turns: &[Turn],
        on_fragment: &mut OnFragment<'_>,
    ) -> Result<String, EndpointError> {
        self.contexts.lock().unwrap().push(turns.to_vec());
        let fragments = self.replies.lock().unwrap().pop().expect("no scripted reply left");
        let mut text = String::new();
        for fragment in fragments {
            on_fragment(fragment);
            text.push_str(fragment);
        }
        Ok(text)
    }
}

enum Step {
    Fragment(&'static str),
    Finish,
    Fail,
}

/// Delivers fragments only when the test releases them.
struct Gated {
    steps: tokio::sync::Mutex<mpsc::UnboundedReceiver<Step>>,
}

fn gated() -> (Arc<Gated>, mpsc::UnboundedSender<Step>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        Arc::new(Gated {
            steps: tokio::sync::Mutex::new(rx),
        }),
        tx,
    )
}

#[async_trait]
impl CompletionClient for Gated {
    async fn send(
        &self,
        _turns: &[Turn],
        on_fragment: &mut OnFragment<'_>,
    ) -> Result<String, EndpointError> {
        let mut steps = self.steps.lock().await;
        let mut text = String::new();
        while let Some(step) = steps.recv().await {
            match step {
                Step::Fragment(fragment) => {
                    on_fragment(fragment);
                    text.push_str(fragment);
                }
                Step::Finish => return Ok(text),
                Step::Fail => {
                    return Err(EndpointError::Api {
                        message: "overloaded".to_string(),
                    });
                }
            }
        }
        Err(EndpointError::Interrupted)
    }
}

async fn live_buffer_reaches(session: &Session, expected: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while session.live_buffer().as_deref() != Some(expected) {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("live buffer never reached expected text");
}

fn shown(session: &Session) -> Vec<Turn> {
    session.transcript().cloned().collect()
}

#[tokio::test]
async fn hello_scenario_then_reset() {
    let client = Scripted::new(vec![vec!["Hi", " there", "!"]]);
    let mut session = Session::new(client.clone());

    let reply = session.ask("Hello").await.unwrap();
    assert_eq!(reply, Turn::assistant("Hi there!"));
    assert_eq!(shown(&session), [Turn::user("Hello"), Turn::assistant("Hi there!")]);

    session.reset().unwrap();
    assert!(shown(&session).is_empty());
    assert_eq!(session.full_transcript().len(), 1);
}

#[tokio::test]
async fn context_includes_system_turn_and_history() {
    let client = Scripted::new(vec![vec!["A1"], vec!["A2"]]);
    let mut session = Session::new(client.clone());

    session.ask("U1").await.unwrap();
    session.ask("U2").await.unwrap();

    assert_eq!(
        shown(&session),
        [
            Turn::user("U1"),
            Turn::assistant("A1"),
            Turn::user("U2"),
            Turn::assistant("A2"),
        ]
    );

    let contexts = client.contexts.lock().unwrap();
    assert_eq!(contexts[0], [Turn::system(SYSTEM_PROMPT), Turn::user("U1")]);
    assert_eq!(contexts[1].len(), 4);
    assert_eq!(contexts[1][0].role, Role::System);
    assert_eq!(contexts[1][3], Turn::user("U2"));
}

#[tokio::test]
async fn live_buffer_tracks_fragments_mid_stream() {
    let (client, steps) = gated();
    let mut session = Session::new(client);

    session.submit("Hello").unwrap();
    assert_eq!(session.state(), SessionState::AwaitingResponse);
    assert_eq!(session.live_buffer().as_deref(), Some(""));

    steps.send(Step::Fragment("Hi")).unwrap();
    live_buffer_reaches(&session, "Hi").await;
    // Nothing reaches the transcript while streaming.
    assert_eq!(shown(&session), [Turn::user("Hello")]);
    assert!(session.poll_response().is_none());

    steps.send(Step::Fragment("")).unwrap();
    steps.send(Step::Fragment(" there")).unwrap();
    steps.send(Step::Fragment("!")).unwrap();
    live_buffer_reaches(&session, "Hi there!").await;

    steps.send(Step::Finish).unwrap();
    let reply = session.wait_response().await.unwrap();
    assert_eq!(reply.content, "Hi there!");
    assert_eq!(session.live_buffer(), None);
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn submit_while_awaiting_is_rejected() {
    let (client, steps) = gated();
    let mut session = Session::new(client);

    session.submit("first").unwrap();
    steps.send(Step::Fragment("par")).unwrap();
    live_buffer_reaches(&session, "par").await;

    let err = session.submit("second").unwrap_err();
    assert!(matches!(
        err,
        SessionError::InvalidState {
            state: SessionState::AwaitingResponse,
            ..
        }
    ));
    assert!(matches!(
        session.reset(),
        Err(SessionError::InvalidState { .. })
    ));
    assert_eq!(shown(&session), [Turn::user("first")]);
    assert_eq!(session.live_buffer().as_deref(), Some("par"));

    steps.send(Step::Fragment("tial")).unwrap();
    steps.send(Step::Finish).unwrap();
    session.wait_response().await.unwrap();
    assert_eq!(shown(&session), [Turn::user("first"), Turn::assistant("partial")]);
}

#[tokio::test]
async fn endpoint_error_keeps_unanswered_question() {
    let (client, steps) = gated();
    let mut session = Session::new(client);

    session.submit("Hello").unwrap();
    steps.send(Step::Fragment("Hi")).unwrap();
    steps.send(Step::Fail).unwrap();

    let err = session.wait_response().await.unwrap_err();
    assert!(matches!(err, SessionError::Endpoint(EndpointError::Api { .. })));
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.live_buffer(), None);
    assert_eq!(shown(&session), [Turn::user("Hello")]);

    // The caller may resubmit; the earlier question stays in context.
    session.submit("Hello again").unwrap();
    steps.send(Step::Finish).unwrap();
    session.wait_response().await.unwrap();
    assert_eq!(
        shown(&session),
        [
            Turn::user("Hello"),
            Turn::user("Hello again"),
            Turn::assistant(""),
        ]
    );
}

#[tokio::test]
async fn dropped_request_reports_interrupted() {
    let (client, steps) = gated();
    let mut session = Session::new(client);

    session.submit("Hello").unwrap();
    drop(steps);

    let err = session.wait_response().await.unwrap_err();
    assert!(matches!(err, SessionError::Endpoint(EndpointError::Interrupted)));
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn submit_works_immediately_after_reset() {
    let client = Scripted::new(vec![vec!["one"], vec!["two"]]);
    let mut session = Session::new(client.clone());

    session.ask("first").await.unwrap();
    session.reset().unwrap();
    session.ask("second").await.unwrap();

    assert_eq!(shown(&session), [Turn::user("second"), Turn::assistant("two")]);
    let contexts = client.contexts.lock().unwrap();
    assert_eq!(contexts[1], [Turn::system(SYSTEM_PROMPT), Turn::user("second")]);
}

#[tokio::test]
async fn polling_drives_a_request_to_completion() {
    let client = Scripted::new(vec![vec!["po", "lled"]]);
    let mut session = Session::new(client);

    session.submit("poll me").unwrap();
    let reply = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(reply) = session.poll_response() {
                break reply;
            }
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("request never finished")
    .unwrap();

    assert_eq!(reply, Turn::assistant("polled"));
    assert!(session.poll_response().is_none());
}
