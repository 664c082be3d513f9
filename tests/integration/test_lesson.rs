//! Integration tests for the local lesson pipeline: content directory,
//! parser, renderer, progress persistence and the local backend.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use academy_core::parser::{code_cells, exercise_ids};
use academy_core::{
    parse, Config, ContentLibrary, ContentSegment, Difficulty, FileStore, IssueKind,
    PreferencesStore, ProgressStore, Theme,
};
use academy_render::{CurriculumOverview, LessonRenderer};
use academy_runtime::{ExecutionGateway, GatewayState};

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/content")
}

fn library() -> ContentLibrary {
    let mut config = Config::default();
    config.content_dir = fixtures().display().to_string();
    ContentLibrary::from_config(&config)
}

fn python_available() -> bool {
    std::process::Command::new("python3")
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success())
}

// ============================================================================
// Content
// ============================================================================

#[test]
fn test_curriculum_from_fixtures() {
    let curriculum = library().curriculum().expect("curriculum");

    assert_eq!(curriculum.total_modules, 2);
    assert_eq!(curriculum.total_estimated_minutes, 60);

    let sections: Vec<_> = curriculum.sections.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(sections, vec!["fundamentals", "autograd"]);

    let autograd = curriculum.module("05-autograd").expect("module");
    assert_eq!(autograd.order, 5);
    assert_eq!(autograd.section, "autograd");
    assert_eq!(autograd.prerequisites, vec!["01-tensors", "00-setup"]);
}

#[test]
fn test_lesson_parses_in_document_order() {
    let lesson = library().load_module("01-tensors").expect("lesson");
    assert_eq!(lesson.metadata.title, "Tensors");
    assert_eq!(lesson.metadata.estimated_minutes, 20);

    let segments = parse(&lesson.raw_body);

    let kinds: Vec<&str> = segments
        .iter()
        .filter(|s| !s.content.is_markdown())
        .map(|s| match &s.content {
            ContentSegment::CodeCell { .. } => "cell",
            ContentSegment::Exercise { .. } => "exercise",
            ContentSegment::Callout { .. } => "callout",
            ContentSegment::DocReference { .. } => "docref",
            ContentSegment::Markdown { .. } => "markdown",
        })
        .collect();
    assert_eq!(kinds, vec!["docref", "cell", "callout", "cell", "exercise"]);

    // Spans are contiguous and cover the whole body.
    let rebuilt: String = segments
        .iter()
        .map(|s| &lesson.raw_body[s.span.clone()])
        .collect();
    assert_eq!(rebuilt, lesson.raw_body);

    let cells = code_cells(&segments);
    assert_eq!(cells[0], ("shapes", "shape = (2, 3)\nprint(shape[0] * shape[1])"));
    assert_eq!(exercise_ids(&segments), vec!["ex-zeros"]);
}

#[test]
fn test_difficulty_override_beats_definition() {
    let lesson = library().load_module("01-tensors").expect("lesson");
    let spec = lesson.exercise("ex-zeros").expect("exercise");
    assert_eq!(spec.difficulty, Difficulty::Medium);
    assert_eq!(spec.hints.len(), 2);

    let segments = parse(&lesson.raw_body);
    let rendered =
        LessonRenderer::new(&lesson, &Default::default()).render(&segments);
    assert!(rendered.markdown.contains("Exercise `ex-zeros` (easy)"));
    assert!(rendered.markdown.contains("> **Shapes**"));
    assert!(rendered.markdown.contains("torch.zeros.html"));
}

#[test]
fn test_missing_exercise_renders_with_issue() {
    let lesson = library().load_module("05-autograd").expect("lesson");
    let rendered = LessonRenderer::new(&lesson, &Default::default()).render(&parse(&lesson.raw_body));

    assert_eq!(rendered.issues.len(), 1);
    assert!(rendered.issues[0].to_string().contains("ex-missing"));
    assert!(rendered.markdown.contains("Exercise `ex-grad` (hard)"));
    assert!(rendered.markdown.contains("Exercise not found"));
}

#[test]
fn test_verify_fixtures() {
    let report = library().verify().expect("verify");
    assert_eq!(report.modules_checked, 2);

    let kinds: Vec<_> = report
        .issues
        .iter()
        .map(|i| (i.module_id.as_str(), i.kind.clone()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("05-autograd", IssueKind::MissingFrontMatterField("order".into())),
            ("05-autograd", IssueKind::UnknownPrerequisite("00-setup".into())),
            ("05-autograd", IssueKind::UndefinedExercise("ex-missing".into())),
            ("05-autograd", IssueKind::UnusedExercise("ex-unused".into())),
        ]
    );
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_progress_survives_restart() {
    let data_dir = tempfile::tempdir().expect("tempdir");
    let curriculum = library().curriculum().expect("curriculum");

    {
        let mut store = ProgressStore::load(Arc::new(FileStore::new(data_dir.path())), "academy");
        store.set_current_module("01-tensors").expect("save");
        store.complete_exercise("01-tensors", "ex-zeros").expect("save");
        store.complete_module("01-tensors").expect("save");
    }

    let store = ProgressStore::load(Arc::new(FileStore::new(data_dir.path())), "academy");
    assert!(store.is_module_completed("01-tensors"));
    assert_eq!(store.module_progress_percent("01-tensors", 1), 100);
    assert_eq!(store.ledger().current_module.as_deref(), Some("01-tensors"));

    let summary = store.curriculum_progress(&curriculum);
    assert_eq!((summary.completed_modules, summary.total_modules, summary.percent), (1, 2, 50));

    let overview = CurriculumOverview::new(&curriculum, store.ledger()).render();
    assert!(overview.contains("1/2 modules (50%)"));

    let record = std::fs::read_to_string(data_dir.path().join("academy-progress.json"))
        .expect("record file");
    let json: serde_json::Value = serde_json::from_str(&record).expect("json");
    assert_eq!(json["version"], 0);
    assert_eq!(json["state"]["completedModules"][0], "01-tensors");
}

#[test]
fn test_theme_survives_restart_but_panels_do_not() {
    let data_dir = tempfile::tempdir().expect("tempdir");

    {
        let mut prefs = PreferencesStore::load(Arc::new(FileStore::new(data_dir.path())), "academy");
        prefs.set_theme(Theme::Light).expect("save");
        prefs.set_sidebar_open(false).expect("save");
    }

    let prefs = PreferencesStore::load(Arc::new(FileStore::new(data_dir.path())), "academy");
    assert_eq!(prefs.state().theme, Theme::Light);
    assert!(prefs.state().sidebar_open);
}

// ============================================================================
// Local execution
// ============================================================================

#[tokio::test]
async fn test_local_gateway_runs_fixture_cells() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let lesson = library().load_module("01-tensors").expect("lesson");
    let segments = parse(&lesson.raw_body);

    let gateway = ExecutionGateway::from_config(&Config::default()).expect("gateway");
    assert_eq!(gateway.backend_name(), "local");
    gateway.initialize().await.expect("python warm-up");
    assert_eq!(gateway.state(), GatewayState::Ready);

    let mut outputs = Vec::new();
    for (_, source) in code_cells(&segments) {
        let result = gateway.execute(source).await;
        assert!(result.success, "{result:?}");
        assert!(result.execution_time_ms.is_some());
        outputs.push(result.stdout);
    }
    assert_eq!(outputs, vec!["6\n", "6\n"]);
}

#[tokio::test]
async fn test_local_gateway_bad_preload_fails_initialize() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let mut config = Config::default();
    config.execution.preload_modules = vec!["module_that_does_not_exist".to_string()];
    let gateway = ExecutionGateway::from_config(&config).expect("gateway");

    let err = gateway.initialize().await.expect_err("preload fails");
    assert!(err.to_string().contains("module_that_does_not_exist"));
    assert!(matches!(gateway.state(), GatewayState::Failed(_)));

    let result = gateway.execute("print(1)").await;
    assert_eq!(result.error.as_deref(), Some("Execution runtime not ready"));
    assert!(tokio::time::timeout(Duration::from_secs(1), gateway.execute("x")).await.is_ok());
}
