//! Integration tests for the research pipeline end-to-end flow
//!
//! These tests drive the orchestrator against stub capabilities:
//! 1. Three clarifying questions, each conditioned on the previous ones
//! 2. Planning with the collected answers
//! 3. Concurrent searches with failures dropped
//! 4. Report synthesis and a single delivery attempt
//! 5. Abort on model failure

mod common;

use common::{
    five_searches_two_failing, services, CallKind, ScriptedModel, StubSearch, StubTransport,
};
use deep_research_backend::research::{
    AnswerOutcome, DeliveryOutcome, ModelInvocationError, Orchestrator, ProgressReporter,
    ResearchConfig, ResearchError, ResearchPhase, StatusKind, TransportStatus,
};

fn config() -> ResearchConfig {
    ResearchConfig {
        search_timeout_secs: 5,
        ..Default::default()
    }
}

/// Test 1: "AI safety trends" with three answers
///
/// Verifies:
/// - exactly three questions before planning
/// - planning once, with all three answers in its input
/// - five concurrent searches, two failing, three results to the writer
/// - one delivery with the rendered report, final phase Done
#[tokio::test]
async fn test_full_research_flow_with_answers() {
    let model = ScriptedModel::new(five_searches_two_failing());
    let search = StubSearch::new();
    let transport = StubTransport::accepting();
    let services = services(model.clone(), search.clone(), transport.clone());

    let (progress, mut rx) = ProgressReporter::channel();
    let mut orchestrator = Orchestrator::new(&services, &config()).with_progress(progress);

    let answers = [
        "Focus on Europe".to_string(),
        "The last five years".to_string(),
        "Written for policy makers".to_string(),
    ];
    let outcome = orchestrator
        .run_research("AI safety trends", &answers)
        .await
        .unwrap();

    // Questions: three, each seeing the ones before it
    let question_inputs = model.inputs(CallKind::Question);
    assert_eq!(question_inputs.len(), 3);
    assert!(!question_inputs[0].contains("Previously asked questions"));
    assert!(question_inputs[1].contains("- Clarifying question 1?"));
    assert!(question_inputs[2].contains("- Clarifying question 1?\n- Clarifying question 2?"));

    // Planning: once, with every answer
    let plan_inputs = model.inputs(CallKind::Plan);
    assert_eq!(plan_inputs.len(), 1);
    for answer in &answers {
        assert!(plan_inputs[0].contains(answer.as_str()), "missing {}", answer);
    }

    // Searching: concurrent, failures dropped
    assert!(search.max_concurrency() > 1);
    let session = orchestrator.session().unwrap();
    assert_eq!(session.search_tasks.len(), 5);
    assert_eq!(session.search_results.len(), 3);
    assert_eq!(session.failed_searches, 2);

    // Writing: once, with only the successful results
    let report_inputs = model.inputs(CallKind::Report);
    assert_eq!(report_inputs.len(), 1);
    assert!(report_inputs[0].contains("Summary for AI safety research 2024"));
    assert!(report_inputs[0].contains("Summary for interpretability progress"));
    assert!(!report_inputs[0].contains("alignment funding"));

    // Delivery: once, with the markdown rendered
    assert_eq!(transport.send_count(), 1);
    let (subject, html) = transport.sent.lock().unwrap()[0].clone();
    assert_eq!(subject, "AI Safety Trends");
    assert!(html.contains("<h1>AI Safety Trends</h1>"));

    assert_eq!(outcome.delivery, DeliveryOutcome::Success);
    assert_eq!(session.phase(), &ResearchPhase::Done);
    assert!(outcome
        .narrative
        .iter()
        .any(|line| line == "✓ Searches planned (5 searches), starting to search..."));
    assert!(outcome
        .narrative
        .last()
        .unwrap()
        .starts_with("## Research Report\n\n# AI Safety Trends"));

    // Progress stream mirrors the narrative plus search ticks
    drop(orchestrator);
    let mut statuses = Vec::new();
    while let Some(status) = rx.recv().await {
        statuses.push(status);
    }
    let ticks = statuses
        .iter()
        .filter(|s| s.status == StatusKind::Progress)
        .count();
    assert_eq!(ticks, 5);
    assert_eq!(statuses.last().unwrap().status, StatusKind::Completed);
}

/// Test 2: interactive API of the orchestrator, one answer at a time
#[tokio::test]
async fn test_interactive_session_progression() {
    let model = ScriptedModel::new(vec!["one", "two"]);
    let services = services(model.clone(), StubSearch::new(), StubTransport::accepting());
    let mut orchestrator = Orchestrator::new(&services, &config());

    let first = orchestrator.start_session("AI safety trends").await.unwrap();
    assert_eq!(first.text, "Clarifying question 1?");
    assert_eq!(
        orchestrator.session().unwrap().phase(),
        &ResearchPhase::Clarifying(1)
    );

    // Planning is not reachable yet
    assert!(matches!(
        orchestrator.run().await,
        Err(ResearchError::InvalidTransition { .. })
    ));
    assert!(model.inputs(CallKind::Plan).is_empty());

    match orchestrator.submit_answer("Europe").await.unwrap() {
        AnswerOutcome::NextQuestion { question } => assert_eq!(question.ordinal, 2),
        other => panic!("expected a second question, got {:?}", other),
    }
    orchestrator.submit_answer("Recent").await.unwrap();
    assert_eq!(
        orchestrator.submit_answer("Policy").await.unwrap(),
        AnswerOutcome::ReadyForResearch
    );
    assert!(matches!(
        orchestrator.submit_answer("Extra").await,
        Err(ResearchError::InvalidInput(_))
    ));

    let outcome = orchestrator.run().await.unwrap();
    assert_eq!(outcome.delivery, DeliveryOutcome::Success);
    assert_eq!(model.inputs(CallKind::Question).len(), 3);
}

/// Test 3: pre-baked clarifications skip the question loop
#[tokio::test]
async fn test_direct_entry_skips_questions() {
    let model = ScriptedModel::new(vec!["one", "two", "three"]);
    let search = StubSearch::new();
    let services = services(model.clone(), search.clone(), StubTransport::accepting());
    let mut orchestrator = Orchestrator::new(&services, &config());

    let outcome = orchestrator
        .run_research_with_clarifications("AI safety trends", "Only peer-reviewed sources")
        .await
        .unwrap();

    assert!(model.inputs(CallKind::Question).is_empty());
    assert!(model.inputs(CallKind::Plan)[0].contains("Only peer-reviewed sources"));
    assert!(outcome
        .narrative
        .iter()
        .any(|line| line.starts_with("**Using your clarifications to tune the research:**")));
    let contexts = search.contexts.lock().unwrap();
    assert_eq!(contexts.len(), 3);
    assert!(contexts
        .iter()
        .all(|c| c.as_deref() == Some("Only peer-reviewed sources")));
    assert!(outcome.delivery.is_success());
}

/// Test 4: empty clarifications proceed as general research
#[tokio::test]
async fn test_direct_entry_with_empty_clarifications() {
    let model = ScriptedModel::new(vec!["one"]);
    let search = StubSearch::new();
    let services = services(model.clone(), search.clone(), StubTransport::accepting());
    let mut orchestrator = Orchestrator::new(&services, &config());

    let outcome = orchestrator
        .run_research_with_clarifications("AI safety trends", "   ")
        .await
        .unwrap();

    assert_eq!(
        model.inputs(CallKind::Plan)[0],
        "Original query: AI safety trends\n\nPlan web searches to answer this query."
    );
    assert_eq!(search.contexts.lock().unwrap()[0], None);
    assert!(outcome
        .narrative
        .iter()
        .any(|line| line.contains("No answers provided")));
}

/// Test 5: every search fails, the report is still written
#[tokio::test]
async fn test_all_searches_failing_still_writes_report() {
    let model = ScriptedModel::new(vec!["fail a", "fail b"]);
    let services = services(model.clone(), StubSearch::new(), StubTransport::accepting());
    let mut orchestrator = Orchestrator::new(&services, &config());

    let outcome = orchestrator
        .run_research_with_clarifications("AI safety trends", "")
        .await
        .unwrap();

    assert!(!outcome.report.markdown_report.is_empty());
    assert!(model.inputs(CallKind::Report)[0].contains("(no search results were available)"));
    assert_eq!(orchestrator.session().unwrap().failed_searches, 2);
}

/// Test 6: a forbidden delivery still ends in Done
#[tokio::test]
async fn test_forbidden_delivery_reaches_done() {
    let transport = StubTransport::new(TransportStatus::Forbidden {
        code: 403,
        message: "Forbidden".to_string(),
    });
    let services = services(
        ScriptedModel::new(vec!["one"]),
        StubSearch::new(),
        transport.clone(),
    );
    let mut orchestrator = Orchestrator::new(&services, &config());

    let outcome = orchestrator
        .run_research_with_clarifications("AI safety trends", "")
        .await
        .unwrap();

    match &outcome.delivery {
        DeliveryOutcome::Failure {
            diagnostic_hint: Some(hint),
            ..
        } => assert!(hint.contains("'Mail Send' permission")),
        other => panic!("expected a forbidden failure, got {:?}", other),
    }
    assert_eq!(transport.send_count(), 1);
    assert_eq!(
        orchestrator.session().unwrap().phase(),
        &ResearchPhase::Done
    );
    assert!(outcome
        .narrative
        .iter()
        .any(|line| line.starts_with("⚠️ Email sending issue: HTTP Error 403")));
}

/// Test 7: planning failure aborts before any search or delivery
#[tokio::test]
async fn test_planning_failure_aborts_session() {
    let model = ScriptedModel::failing_on(vec!["one"], CallKind::Plan);
    let search = StubSearch::new();
    let transport = StubTransport::accepting();
    let services = services(model.clone(), search.clone(), transport.clone());
    let mut orchestrator = Orchestrator::new(&services, &config());

    let err = orchestrator
        .run_research_with_clarifications("AI safety trends", "")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ResearchError::Model(ModelInvocationError::Status { status: 500, .. })
    ));
    assert!(err.to_string().contains("Plan model unavailable"));
    assert!(search.contexts.lock().unwrap().is_empty());
    assert_eq!(transport.send_count(), 0);
    assert!(matches!(
        orchestrator.session().unwrap().phase(),
        ResearchPhase::Aborted(_)
    ));
}

/// Test 8: clarifying question failure aborts the interactive session
#[tokio::test]
async fn test_question_failure_aborts_session() {
    let model = ScriptedModel::failing_on(vec!["one"], CallKind::Question);
    let services = services(model, StubSearch::new(), StubTransport::accepting());
    let mut orchestrator = Orchestrator::new(&services, &config());

    assert!(orchestrator.start_session("AI safety trends").await.is_err());
    assert!(matches!(
        orchestrator.session().unwrap().phase(),
        ResearchPhase::Aborted(_)
    ));
    // An aborted session accepts no answers
    assert!(orchestrator.submit_answer("Europe").await.is_err());
}

/// Test 9: a zero search target never reaches the search stage
#[tokio::test]
async fn test_zero_search_target_aborts_before_searching() {
    let model = ScriptedModel::new(five_searches_two_failing());
    let search = StubSearch::new();
    let transport = StubTransport::accepting();
    let services = services(model, search.clone(), transport.clone());
    let config = ResearchConfig {
        num_searches: 0,
        ..config()
    };
    let mut orchestrator = Orchestrator::new(&services, &config);

    let err = orchestrator
        .run_research_with_clarifications("AI safety trends", "Europe only")
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ResearchError::Model(ModelInvocationError::MalformedOutput(
            "Search plan contains no searches".to_string()
        ))
    );
    assert!(search.contexts.lock().unwrap().is_empty());
    assert_eq!(transport.send_count(), 0);
    let session = orchestrator.session().unwrap();
    assert!(session.search_tasks.is_empty());
    assert!(matches!(session.phase(), ResearchPhase::Aborted(_)));
}

/// Test 10: batch clarification asks the model once for all three questions
#[tokio::test]
async fn test_batch_clarification_flow() {
    let model = ScriptedModel::new(vec!["one"]);
    let services = services(model.clone(), StubSearch::new(), StubTransport::accepting());
    let mut orchestrator = Orchestrator::new(&services, &config());

    let questions = orchestrator
        .start_session_batch("AI safety trends")
        .await
        .unwrap();
    assert_eq!(
        questions.iter().map(|q| q.text.as_str()).collect::<Vec<_>>(),
        vec!["Which region?", "Which period?", "Which audience?"]
    );

    for answer in ["Europe", "Recent"] {
        assert!(matches!(
            orchestrator.submit_answer(answer).await.unwrap(),
            AnswerOutcome::NextQuestion { .. }
        ));
    }
    assert_eq!(
        orchestrator.submit_answer("Policy").await.unwrap(),
        AnswerOutcome::ReadyForResearch
    );

    let outcome = orchestrator.run().await.unwrap();
    assert!(outcome.delivery.is_success());
    assert_eq!(model.inputs(CallKind::Batch).len(), 1);
    assert!(model.inputs(CallKind::Question).is_empty());
    assert!(model.inputs(CallKind::Plan)[0].contains("Europe"));
}
