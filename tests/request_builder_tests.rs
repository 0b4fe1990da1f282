//! Request builder tests: history conversion, turn modes, settings merge.

use pretty_assertions::assert_eq;
use serde_json::json;

use tern::error::TernError;
use tern::pipeline::{build_request, RequestInput, TurnMode};
use tern::provider::{ProviderRequest, TurnRole};
use tern::tools::{DirWorkspace, ReadFileTool, Tool, Workspace};
use tern::types::{
    BuiltinTool, ChatMessage, GenerationSettings, MessageFile, Part, Role, ThinkingLevel,
};

async fn build(input: RequestInput<'_>) -> Result<ProviderRequest, TernError> {
    build_request(input, None, &[]).await
}

fn input<'a>(
    model: &'a str,
    history: &'a [ChatMessage],
    text: &'a str,
    settings: &'a GenerationSettings,
) -> RequestInput<'a> {
    RequestInput {
        model,
        history,
        text,
        files: &[],
        settings,
        system_instruction: None,
        mode: TurnMode::Normal,
    }
}

#[tokio::test]
async fn new_turn_carries_text_and_encoded_files() {
    let settings = GenerationSettings::default();
    let files = vec![
        MessageFile::inline("a.txt", "text/plain", b"hi".to_vec()),
        MessageFile::remote("big.pdf", "application/pdf", "files/xyz"),
    ];
    let mut req = input("gemini-2.5-pro", &[], "look at these", &settings);
    req.files = &files;

    let request = build(req).await.unwrap();
    assert_eq!(request.contents.len(), 1);
    let turn = &request.contents[0];
    assert_eq!(turn.role, TurnRole::User);
    assert_eq!(
        turn.parts,
        vec![
            Part::text("look at these"),
            Part::FileData {
                mime_type: "text/plain".into(),
                data: "aGk=".into(),
            },
            Part::FileRef {
                mime_type: "application/pdf".into(),
                uri: "files/xyz".into(),
            },
        ]
    );
}

#[tokio::test]
async fn error_messages_never_reach_the_provider() {
    let mut failed = ChatMessage::loading_model(chrono::Utc::now());
    failed.role = Role::Error;
    failed.content = "Error: boom".into();
    failed.is_loading = false;

    let mut reply = ChatMessage::loading_model(chrono::Utc::now());
    reply.content = "fine".into();
    reply.is_loading = false;

    let history = vec![ChatMessage::user("q", Vec::new()), failed, reply];
    let settings = GenerationSettings::default();
    let request = build(input("gemini-2.5-pro", &history, "next", &settings))
        .await
        .unwrap();

    let roles: Vec<TurnRole> = request.contents.iter().map(|c| c.role).collect();
    assert_eq!(roles, vec![TurnRole::User, TurnRole::Model, TurnRole::User]);
    assert_eq!(request.contents[1].parts, vec![Part::text("fine")]);
}

#[tokio::test]
async fn model_history_prefers_raw_parts_over_plain_text() {
    let mut reply = ChatMessage::loading_model(chrono::Utc::now());
    reply.content = "flattened".into();
    reply.raw_parts = vec![Part::thought("pondering"), Part::text("flattened")];
    reply.is_loading = false;

    let history = vec![ChatMessage::user("q", Vec::new()), reply.clone()];
    let settings = GenerationSettings::default();
    let request = build(input("gemini-2.5-pro", &history, "next", &settings))
        .await
        .unwrap();

    assert_eq!(request.contents[1].parts, reply.raw_parts);
}

#[tokio::test]
async fn empty_model_messages_are_skipped() {
    let empty = ChatMessage::loading_model(chrono::Utc::now());
    let history = vec![ChatMessage::user("q", Vec::new()), empty];
    let settings = GenerationSettings::default();
    let request = build(input("gemini-2.5-pro", &history, "next", &settings))
        .await
        .unwrap();
    assert_eq!(request.contents.len(), 2);
    assert_eq!(request.contents[1].role, TurnRole::User);
}

#[tokio::test]
async fn continue_mode_seeds_a_model_turn() {
    let settings = GenerationSettings::default();
    let mut req = input("gemini-2.5-pro", &[], "", &settings);
    req.mode = TurnMode::Continue;
    let request = build(req).await.unwrap();
    let seed = request.contents.last().unwrap();
    assert_eq!(seed.role, TurnRole::Model);
    assert_eq!(seed.parts, vec![Part::text(" ")]);

    // Models with an explicit reasoning delimiter seed with its close tag.
    let mut req = input("local-qwq-think", &[], "", &settings);
    req.mode = TurnMode::Continue;
    let request = build(req).await.unwrap();
    assert_eq!(
        request.contents.last().unwrap().parts,
        vec![Part::text("</think>")]
    );
}

#[tokio::test]
async fn raw_mode_opens_an_unterminated_reasoning_turn() {
    let settings = GenerationSettings::default();
    let mut req = input("local-qwq-think", &[], "solve it", &settings);
    req.mode = TurnMode::Raw;
    let request = build(req).await.unwrap();

    assert_eq!(request.contents.len(), 2);
    assert_eq!(request.contents[0].role, TurnRole::User);
    assert_eq!(request.contents[0].parts, vec![Part::text("solve it")]);
    assert_eq!(request.contents[1].role, TurnRole::Model);
    assert_eq!(request.contents[1].parts, vec![Part::text("<think>\n")]);
}

#[tokio::test]
async fn raw_mode_is_rejected_for_unsupporting_models() {
    let settings = GenerationSettings::default();
    let mut req = input("gemini-2.5-pro", &[], "solve it", &settings);
    req.mode = TurnMode::Raw;
    let err = build(req).await.unwrap_err();
    assert!(matches!(err, TernError::Configuration(_)));
    assert!(err.is_preflight());
}

#[tokio::test]
async fn builtin_tools_clear_the_response_schema() {
    let settings = GenerationSettings {
        tools: vec![BuiltinTool::WebSearch],
        response_schema: Some(json!({ "type": "object" })),
        ..Default::default()
    };
    let request = build(input("gemini-2.5-pro", &[], "q", &settings))
        .await
        .unwrap();
    assert_eq!(request.config.response_schema, None);
    assert_eq!(request.config.builtin_tools, vec![BuiltinTool::WebSearch]);

    let settings = GenerationSettings {
        response_schema: Some(json!({ "type": "object" })),
        ..Default::default()
    };
    let request = build(input("gemini-2.5-pro", &[], "q", &settings))
        .await
        .unwrap();
    assert!(request.config.response_schema.is_some());
}

#[tokio::test]
async fn positive_thinking_budget_wins_over_the_level() {
    let settings = GenerationSettings::builder()
        .thinking_budget(2048)
        .thinking_level(ThinkingLevel::High)
        .build();
    let request = build(input("gemini-2.5-pro", &[], "q", &settings))
        .await
        .unwrap();
    assert_eq!(request.config.thinking_budget, Some(2048));
    assert_eq!(request.config.thinking_level, None);

    // A zero budget does not count as set.
    let settings = GenerationSettings::builder()
        .thinking_budget(0)
        .thinking_level(ThinkingLevel::Low)
        .build();
    let request = build(input("gemini-2.5-pro", &[], "q", &settings))
        .await
        .unwrap();
    assert_eq!(request.config.thinking_budget, None);
    assert_eq!(request.config.thinking_level, Some(ThinkingLevel::Low));
}

#[tokio::test]
async fn workspace_adds_preamble_and_tool_declarations() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
    let workspace: std::sync::Arc<dyn Workspace> =
        std::sync::Arc::new(DirWorkspace::new(dir.path()));
    let tools: Vec<Box<dyn Tool>> = vec![Box::new(ReadFileTool::new(workspace.clone()))];

    let settings = GenerationSettings::default();
    let mut req = input("gemini-2.5-pro", &[], "what's in my notes?", &settings);
    req.system_instruction = Some("Be terse.");

    let request = build_request(req, Some(workspace.as_ref()), &tools)
        .await
        .unwrap();

    let sys = request.system_instruction.unwrap();
    assert!(sys.starts_with("Be terse."));
    assert!(sys.contains("notes.txt"));
    assert_eq!(request.config.function_declarations.len(), 1);
    assert_eq!(request.config.function_declarations[0].name, "read_file");
}

#[tokio::test]
async fn missing_model_id_is_a_preflight_error() {
    let settings = GenerationSettings::default();
    let err = build(input("", &[], "q", &settings)).await.unwrap_err();
    assert!(err.is_preflight());
}
