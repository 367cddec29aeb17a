use super::*;
use sage_llm::{MockProvider, MockReply};

fn roster() -> Roster {
    Roster::reference()
}

#[test]
fn test_parse_accepted_shapes() {
    let r = roster();
    assert_eq!(
        parse_route(r#"{"next": "researcher"}"#, &r).unwrap(),
        Route::worker("researcher")
    );
    assert_eq!(parse_route(r#""comedian""#, &r).unwrap(), Route::worker("comedian"));
    assert_eq!(parse_route("  FINISH\n", &r).unwrap(), Route::Finish);
}

#[test]
fn test_parse_rejects_everything_else() {
    let r = roster();
    for raw in [
        "Researcher",
        "the researcher",
        r#"{"next": "poet"}"#,
        r#"{"next": ["researcher"]}"#,
        r#"{"next": "researcher", "why": "facts"}"#,
        r#"{"worker": "researcher"}"#,
        "42",
        "",
    ] {
        let err = parse_route(raw, &r).unwrap_err();
        match err {
            Error::RoutingDecision { raw: got, allowed } => {
                assert_eq!(got, raw);
                assert_eq!(allowed, vec!["FINISH", "comedian", "researcher"]);
            }
            other => panic!("unexpected error for {:?}: {}", raw, other),
        }
    }
}

#[test]
fn test_roster_validation() {
    assert!(Roster::new(vec![]).is_err());
    assert!(Roster::new(vec![WorkerProfile::new("", "nobody")]).is_err());
    assert!(Roster::new(vec![WorkerProfile::new("finish", "sneaky")]).is_err());
    assert!(Roster::new(vec![WorkerProfile::new("supervisor", "sneaky")]).is_err());
    assert!(Roster::new(vec![
        WorkerProfile::new("a", "x"),
        WorkerProfile::new("a", "y"),
    ])
    .is_err());
    assert!(Roster::new(vec![WorkerProfile::new("poet", "Writes poems.")]).is_ok());
}

#[test]
fn test_prompts_name_members_and_options() {
    let r = roster();
    let system = system_prompt(&r);
    assert!(system.contains("following workers: comedian, researcher."));
    assert!(system.contains("is not good for telling jokes"));

    let closing = closing_prompt(&r);
    assert!(closing.ends_with("Select one of: ['FINISH', 'comedian', 'researcher']"));
}

#[tokio::test]
async fn test_request_is_constrained() {
    let provider = Arc::new(MockProvider::always(r#"{"next":"FINISH"}"#));
    let supervisor = Supervisor::new(provider.clone(), roster());

    let history = vec![Message::user("tell me a joke about the heart")];
    assert_eq!(supervisor.decide(&history).await.unwrap(), Route::Finish);

    let request = &provider.requests()[0];
    assert_eq!(
        request.choices.as_deref(),
        Some(&["FINISH".to_string(), "comedian".into(), "researcher".into()][..])
    );
    // system, history, closing instruction
    assert_eq!(request.messages.len(), 3);
    assert_eq!(request.messages[1].content, "tell me a joke about the heart");
}

#[tokio::test]
async fn test_unguided_provider_is_detected() {
    let guided = Supervisor::new(Arc::new(MockProvider::new()), roster());
    assert!(guided.choices_enforced());

    let provider = MockProvider::always("researcher").unguided();
    let supervisor = Supervisor::new(Arc::new(provider.clone()), roster());
    assert!(!supervisor.choices_enforced());

    // Options are still sent and the answer is still validated
    assert_eq!(
        supervisor.decide(&[Message::user("q")]).await.unwrap(),
        Route::worker("researcher")
    );
    assert!(provider.requests()[0].choices.is_some());
}

#[tokio::test]
async fn test_bounded_retry_on_bad_answer() {
    let provider = MockProvider::new()
        .with_reply("I think the researcher")
        .with_reply(r#"{"next":"researcher"}"#);
    let supervisor = Supervisor::new(Arc::new(provider.clone()), roster())
        .with_retry(RetryConfig::new().with_initial_delay(Duration::from_millis(1)));

    let route = supervisor.decide(&[Message::user("q")]).await.unwrap();
    assert_eq!(route, Route::worker("researcher"));
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn test_retry_exhaustion_fails_closed() {
    let provider = MockProvider::always("poet");
    let supervisor = Supervisor::new(Arc::new(provider.clone()), roster()).with_retry(
        RetryConfig::new()
            .with_max_attempts(3)
            .with_initial_delay(Duration::from_millis(1)),
    );

    let err = supervisor.decide(&[Message::user("q")]).await.unwrap_err();
    assert!(matches!(err, Error::RoutingDecision { .. }));
    assert_eq!(provider.call_count(), 3);
}

#[tokio::test]
async fn test_provider_error_not_retried() {
    let provider = MockProvider::new().with_failure("model not found");
    let supervisor = Supervisor::new(Arc::new(provider.clone()), roster());

    let err = supervisor.decide(&[Message::user("q")]).await.unwrap_err();
    assert!(matches!(err, Error::Llm(sage_llm::Error::Api(_))));
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_then_success() {
    let provider = MockProvider::new();
    provider.push(MockReply::Delayed(Duration::from_secs(60), "FINISH".into()));
    provider.push(MockReply::Text("comedian".into()));
    let supervisor = Supervisor::new(Arc::new(provider.clone()), roster())
        .with_timeout(Duration::from_secs(1));

    let route = supervisor.decide(&[Message::user("q")]).await.unwrap();
    assert_eq!(route, Route::worker("comedian"));
}
