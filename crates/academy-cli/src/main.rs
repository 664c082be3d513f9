//! Academy CLI
//!
//! Reads lessons, runs their code cells, grades exercises and tracks
//! learner progress from the terminal.

use std::io::Read;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use academy_client::{submit_exercise, ApiClient, ValidationClient, VerdictStatus};
use academy_core::parser::code_cells;
use academy_core::{
    parse, BackendKind, Config, ContentLibrary, Curriculum, FileStore, LessonContent,
    PreferencesStore, ProgressStore, Theme,
};
use academy_render::{doc_url, CurriculumOverview, LessonRenderer};
use academy_runtime::{ExecutionGateway, ExecutionResult};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Academy - interactive lessons in the terminal
///
/// Lessons come from a content directory (or the lesson API with
/// --from-api). Code runs on a local Python interpreter or a remote
/// execution service, selected by the `backend` setting.
#[derive(Parser, Debug)]
#[command(name = "academy")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: academy.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Execution backend: local or remote
    #[arg(long, value_name = "BACKEND", global = true)]
    backend: Option<String>,

    /// Base URL of the lesson, execution and validation service
    #[arg(long, value_name = "URL", global = true)]
    api_url: Option<String>,

    /// Directory holding the lesson modules
    #[arg(long, value_name = "DIR", global = true)]
    content_dir: Option<String>,

    /// Fetch lessons and curriculum from the lesson API instead of the content directory
    #[arg(long, global = true)]
    from_api: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the curriculum with completion marks
    Curriculum,

    /// Render a lesson and make it the current module
    Lesson {
        /// Module id, e.g. 01-tensors
        module: String,
    },

    /// List the code cells of a lesson
    Cells {
        /// Module id
        module: String,
    },

    /// Run code cells; with no module, every cell of every lesson
    Run {
        /// Module id
        module: Option<String>,

        /// Run only this cell
        #[arg(long, value_name = "ID", requires = "module")]
        cell: Option<String>,
    },

    /// Run a file of code ('-' reads standard input)
    Exec {
        /// Source file
        file: String,
    },

    /// Grade an exercise attempt and record it if it passes
    Validate {
        /// Module id
        module: String,
        /// Exercise id
        exercise: String,
        /// File with the attempt ('-' reads standard input)
        file: String,
    },

    /// Look up API documentation for a symbol
    Doc {
        /// Symbol, e.g. torch.zeros
        symbol: String,
    },

    /// Show or change learner progress
    Progress {
        #[command(subcommand)]
        action: Option<ProgressAction>,
    },

    /// Show or change the theme
    Theme {
        /// dark, light or toggle
        value: Option<String>,
    },

    /// Check lesson content for broken references
    Verify,

    /// Bring the execution backend up and report its state
    Check,
}

#[derive(Subcommand, Debug)]
enum ProgressAction {
    /// Print the progress ledger
    Show,
    /// Mark a module complete
    Complete {
        /// Module id
        module: String,
    },
    /// Clear all progress
    Reset,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(config = ?args.config, command = ?args.command, "Academy starting");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(&args)?;
    let app = App {
        config,
        from_api: args.from_api,
    };

    match args.command {
        Command::Curriculum => app.show_curriculum().await,
        Command::Lesson { module } => app.show_lesson(&module).await,
        Command::Cells { module } => app.list_cells(&module).await,
        Command::Run { module, cell } => app.run_cells(module.as_deref(), cell.as_deref()).await,
        Command::Exec { file } => app.exec_file(&file).await,
        Command::Validate {
            module,
            exercise,
            file,
        } => app.validate(&module, &exercise, &file).await,
        Command::Doc { symbol } => app.show_doc(&symbol).await,
        Command::Progress { action } => app.progress(action.unwrap_or(ProgressAction::Show)).await,
        Command::Theme { value } => app.theme(value.as_deref()),
        Command::Verify => app.verify(),
        Command::Check => app.check().await,
    }
}

/// Loads configuration and applies CLI overrides.
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match args.config.as_deref() {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path)?
        }
        None => Config::load()?,
    };

    if let Some(ref backend) = args.backend {
        config.backend = BackendKind::from_str_case_insensitive(backend).ok_or_else(|| {
            anyhow::anyhow!("Invalid backend '{backend}'\n\nSuggestion: Use --backend local or --backend remote")
        })?;
    }
    if let Some(ref api_url) = args.api_url {
        config.api_url.clone_from(api_url);
    }
    if let Some(ref content_dir) = args.content_dir {
        config.content_dir.clone_from(content_dir);
    }

    // Re-validate after overrides
    config.validate()?;
    tracing::debug!(
        backend = %config.backend,
        api_url = %config.api_url,
        content_dir = %config.content_dir,
        "Configuration loaded"
    );
    Ok(config)
}

/// Reads a source file, or standard input for `-`.
fn read_source(file: &str) -> anyhow::Result<String> {
    if file == "-" {
        let mut code = String::new();
        std::io::stdin().read_to_string(&mut code)?;
        return Ok(code);
    }
    std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("Failed to read '{file}': {e}"))
}

struct App {
    config: Config,
    from_api: bool,
}

impl App {
    fn storage(&self) -> Arc<FileStore> {
        Arc::new(FileStore::new(self.config.data_path()))
    }

    fn progress_store(&self) -> ProgressStore {
        ProgressStore::load(self.storage(), &self.config.namespace)
    }

    fn library(&self) -> ContentLibrary {
        ContentLibrary::from_config(&self.config)
    }

    async fn load_lesson(&self, module_id: &str) -> anyhow::Result<LessonContent> {
        if self.from_api {
            Ok(ApiClient::from_config(&self.config)?.get_module(module_id).await?)
        } else {
            Ok(self.library().load_module(module_id)?)
        }
    }

    async fn load_curriculum(&self) -> anyhow::Result<Curriculum> {
        if self.from_api {
            Ok(ApiClient::from_config(&self.config)?.get_curriculum().await?)
        } else {
            Ok(self.library().curriculum()?)
        }
    }

    /// Builds the gateway and waits for the backend handshake.
    async fn ready_gateway(&self) -> anyhow::Result<ExecutionGateway> {
        let gateway = ExecutionGateway::from_config(&self.config)?;
        eprintln!("Starting {} execution backend...", gateway.backend_name());
        gateway.initialize().await?;
        Ok(gateway)
    }

    async fn show_curriculum(&self) -> anyhow::Result<()> {
        let curriculum = self.load_curriculum().await?;
        let store = self.progress_store();
        print!("{}", CurriculumOverview::new(&curriculum, store.ledger()).render());
        Ok(())
    }

    async fn show_lesson(&self, module_id: &str) -> anyhow::Result<()> {
        let lesson = self.load_lesson(module_id).await?;
        let segments = parse(&lesson.raw_body);

        let mut store = self.progress_store();
        if let Err(e) = store.set_current_module(module_id) {
            tracing::warn!(error = %e, "Could not save current module");
        }

        let rendered = LessonRenderer::new(&lesson, store.ledger()).render(&segments);
        print!("{}", rendered.markdown);
        for issue in &rendered.issues {
            tracing::warn!(module_id, "{issue}");
        }
        Ok(())
    }

    async fn list_cells(&self, module_id: &str) -> anyhow::Result<()> {
        let lesson = self.load_lesson(module_id).await?;
        let segments = parse(&lesson.raw_body);
        let cells = code_cells(&segments);

        if cells.is_empty() {
            println!("{module_id} has no code cells");
            return Ok(());
        }
        for (id, source) in cells {
            let first_line = source.lines().next().unwrap_or("");
            let lines = source.lines().count();
            println!("{id:<20} {lines:>3} lines  {first_line}");
        }
        Ok(())
    }

    async fn run_cells(&self, module: Option<&str>, cell: Option<&str>) -> anyhow::Result<()> {
        let modules = match module {
            Some(id) => vec![id.to_string()],
            None => self.library().module_ids()?,
        };

        let mut jobs = Vec::new();
        for module_id in &modules {
            let lesson = self.load_lesson(module_id).await?;
            let segments = parse(&lesson.raw_body);
            for (cell_id, source) in code_cells(&segments) {
                if cell.map_or(true, |wanted| wanted == cell_id) {
                    jobs.push((module_id.clone(), cell_id.to_string(), source.to_string()));
                }
            }
        }
        if let Some(cell_id) = cell {
            if jobs.is_empty() {
                anyhow::bail!("No code cell '{cell_id}' in {}", modules.join(", "));
            }
        }

        let gateway = self.ready_gateway().await?;
        let mut failed = 0usize;
        for (module_id, cell_id, source) in &jobs {
            println!("=== {module_id} / {cell_id} ===");
            let result = gateway.execute(source).await;
            print_result(&result);
            if !result.success {
                failed += 1;
            }
        }

        println!();
        println!("{} cells run, {failed} failed", jobs.len());
        if failed > 0 {
            anyhow::bail!("{failed} code cell(s) failed");
        }
        Ok(())
    }

    async fn exec_file(&self, file: &str) -> anyhow::Result<()> {
        let code = read_source(file)?;
        let gateway = self.ready_gateway().await?;
        let result = gateway.execute(&code).await;
        print_result(&result);
        if !result.success {
            anyhow::bail!("Execution failed");
        }
        Ok(())
    }

    async fn validate(&self, module_id: &str, exercise_id: &str, file: &str) -> anyhow::Result<()> {
        let code = read_source(file)?;
        let client = ValidationClient::from_config(&self.config)?;
        let mut store = self.progress_store();

        let verdict = submit_exercise(&client, &mut store, module_id, exercise_id, &code).await;

        println!(
            "Result: {} ({}/{} tests passed)",
            verdict.result, verdict.passed_tests, verdict.total_tests
        );
        if !verdict.feedback.is_empty() {
            println!("{}", verdict.feedback.trim_end());
        }
        if let Some(ref message) = verdict.error_message {
            println!("Error: {message}");
        }
        if !verdict.stdout.is_empty() {
            println!("--- stdout ---\n{}", verdict.stdout.trim_end());
        }
        if !verdict.stderr.is_empty() {
            println!("--- stderr ---\n{}", verdict.stderr.trim_end());
        }

        if verdict.result == VerdictStatus::Passed {
            println!(
                "Exercises completed in {module_id}: {}",
                store.completed_exercise_count(module_id)
            );
            Ok(())
        } else {
            anyhow::bail!("Exercise '{exercise_id}' did not pass")
        }
    }

    async fn show_doc(&self, symbol: &str) -> anyhow::Result<()> {
        let client = ApiClient::from_config(&self.config)?;
        match client.get_doc_info(symbol).await {
            Ok(info) => {
                println!("{}", info.symbol);
                if let Some(signature) = info.signature {
                    println!("  {signature}");
                }
                if let Some(description) = info.description {
                    println!();
                    println!("{description}");
                }
                println!();
                println!("{}", info.url);
            }
            Err(e) => {
                tracing::warn!(symbol, error = %e, "Documentation lookup failed");
                println!("{symbol}");
                println!("{}", doc_url(symbol));
            }
        }
        Ok(())
    }

    async fn progress(&self, action: ProgressAction) -> anyhow::Result<()> {
        let mut store = self.progress_store();
        match action {
            ProgressAction::Show => {
                let ledger = store.ledger();
                if ledger.is_empty() {
                    println!("No progress recorded yet");
                    return Ok(());
                }
                println!("{}", serde_json::to_string_pretty(ledger)?);
                if let Ok(curriculum) = self.load_curriculum().await {
                    let summary = store.curriculum_progress(&curriculum);
                    println!(
                        "\n{}/{} modules complete ({}%)",
                        summary.completed_modules, summary.total_modules, summary.percent
                    );
                }
            }
            ProgressAction::Complete { module } => {
                if store.complete_module(&module)? {
                    println!("Marked {module} complete");
                } else {
                    println!("{module} was already complete");
                }
            }
            ProgressAction::Reset => {
                store.reset_progress()?;
                println!("Progress cleared");
            }
        }
        Ok(())
    }

    fn theme(&self, value: Option<&str>) -> anyhow::Result<()> {
        let mut prefs = PreferencesStore::load(self.storage(), &self.config.namespace);
        match value {
            None => {}
            Some(v) if v.eq_ignore_ascii_case("toggle") => prefs.toggle_theme()?,
            Some(v) => {
                let theme = Theme::from_str_case_insensitive(v).ok_or_else(|| {
                    anyhow::anyhow!("Invalid theme '{v}'\n\nSuggestion: Use dark, light or toggle")
                })?;
                prefs.set_theme(theme)?;
            }
        }
        println!("Theme: {}", prefs.state().theme);
        Ok(())
    }

    fn verify(&self) -> anyhow::Result<()> {
        let report = self.library().verify()?;
        for issue in &report.issues {
            println!("{issue}");
        }
        println!(
            "{} modules checked, {} issue(s)",
            report.modules_checked,
            report.issues.len()
        );
        if !report.is_clean() {
            anyhow::bail!("Content verification failed");
        }
        Ok(())
    }

    async fn check(&self) -> anyhow::Result<()> {
        let gateway = ExecutionGateway::from_config(&self.config)?;
        let outcome = gateway.initialize().await;
        println!("Backend: {}", gateway.backend_name());
        println!("State:   {}", gateway.state());
        outcome?;
        Ok(())
    }
}

fn print_result(result: &ExecutionResult) {
    if !result.stdout.is_empty() {
        print!("{}", result.stdout);
        if !result.stdout.ends_with('\n') {
            println!();
        }
    }
    if !result.stderr.is_empty() {
        eprint!("{}", result.stderr);
        if !result.stderr.ends_with('\n') {
            eprintln!();
        }
    }
    let timing = result
        .execution_time_ms
        .map(|ms| format!(" in {ms}ms"))
        .unwrap_or_default();
    match (&result.error, result.success) {
        (_, true) => println!("[ok{timing}]"),
        (Some(error), false) => println!("[failed{timing}] {error}"),
        (None, false) => println!("[failed{timing}]"),
    }
}
