use std::collections::BTreeMap;
use std::fmt;

use quiz_core::model::{
    AttemptId, Caller, OptionId, QuestionId, QuizDraft, QuizId, ResultDetail, Role, UserId,
};
use services::{AppServices, Clock, QuizServiceError};
use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt as log_fmt, prelude::*, util::SubscriberInitExt};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArg { what: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    MissingUser,
    InvalidUserId { raw: String },
    InvalidRole { raw: String },
    InvalidId { what: &'static str, raw: String },
    InvalidResponse { raw: String },
    DuplicateResponse { question: QuestionId },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArg { what } => write!(f, "missing {what}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::MissingUser => write!(f, "no user given; pass --user or set QUIZ_USER_ID"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid --user value: {raw}"),
            ArgsError::InvalidRole { raw } => write!(f, "invalid --role value: {raw}"),
            ArgsError::InvalidId { what, raw } => write!(f, "invalid {what}: {raw}"),
            ArgsError::InvalidResponse { raw } => {
                write!(f, "invalid response {raw:?}, expected <question-id>=<option-id>")
            }
            ArgsError::DuplicateResponse { question } => {
                write!(f, "question {question} answered more than once")
            }
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [--db <sqlite_url>] [--user <id>] [--role <role>] <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  author <draft.json>              create a quiz from a JSON draft");
    eprintln!("  list                             quizzes open for taking");
    eprintln!("  mine                             quizzes you wrote, with hidden state");
    eprintln!("  hide <quiz-id>                   hide one of your quizzes");
    eprintln!("  unhide <quiz-id>                 show it again");
    eprintln!("  clear-hidden                     empty your hidden set");
    eprintln!("  submit <quiz-id> <qid=oid>...    answer a quiz");
    eprintln!("  result <attempt-id>              graded result of an attempt");
    eprintln!("  review <quiz-id>                 scores of every attempt at your quiz");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://quiz.sqlite3");
    eprintln!("  --role student");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_USER_ID, QUIZ_ROLE");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Author { path: String },
    List,
    Mine,
    Hide(QuizId),
    Unhide(QuizId),
    ClearHidden,
    Submit {
        quiz_id: QuizId,
        responses: BTreeMap<QuestionId, OptionId>,
    },
    Result(AttemptId),
    Review(QuizId),
}

impl Command {
    fn parse(name: &str, rest: Vec<String>) -> Result<Self, ArgsError> {
        let mut rest = rest.into_iter();
        let command = match name {
            "author" => Self::Author {
                path: rest.next().ok_or(ArgsError::MissingArg { what: "draft path" })?,
            },
            "list" => Self::List,
            "mine" => Self::Mine,
            "hide" => Self::Hide(parse_id(rest.next(), "quiz id")?),
            "unhide" => Self::Unhide(parse_id(rest.next(), "quiz id")?),
            "clear-hidden" => Self::ClearHidden,
            "submit" => {
                let quiz_id = parse_id(rest.next(), "quiz id")?;
                let mut responses = BTreeMap::new();
                for raw in rest.by_ref() {
                    let (question, option) = parse_response(&raw)?;
                    if responses.insert(question, option).is_some() {
                        return Err(ArgsError::DuplicateResponse { question });
                    }
                }
                Self::Submit { quiz_id, responses }
            }
            "result" => Self::Result(parse_id(rest.next(), "attempt id")?),
            "review" => Self::Review(parse_id(rest.next(), "quiz id")?),
            other => return Err(ArgsError::UnknownCommand(other.to_string())),
        };

        match rest.next() {
            Some(extra) => Err(ArgsError::UnknownArg(extra)),
            None => Ok(command),
        }
    }
}

fn parse_id<T: std::str::FromStr>(
    raw: Option<String>,
    what: &'static str,
) -> Result<T, ArgsError> {
    let raw = raw.ok_or(ArgsError::MissingArg { what })?;
    raw.parse().map_err(|_| ArgsError::InvalidId { what, raw })
}

fn parse_response(raw: &str) -> Result<(QuestionId, OptionId), ArgsError> {
    let invalid = || ArgsError::InvalidResponse {
        raw: raw.to_string(),
    };
    let (question, option) = raw.split_once('=').ok_or_else(invalid)?;
    let question = question.parse().map_err(|_| invalid())?;
    let option = option.parse().map_err(|_| invalid())?;
    Ok((question, option))
}

#[derive(Debug)]
struct Args {
    db_url: String,
    caller: Caller,
    command: Command,
}

impl Args {
    fn parse(
        args: impl IntoIterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>, ArgsError> {
        let mut db_url = env("QUIZ_DB_URL")
            .map_or_else(|| "sqlite://quiz.sqlite3".into(), normalize_sqlite_url);
        let mut user = env("QUIZ_USER_ID");
        let mut role = env("QUIZ_ROLE");
        let mut positional = Vec::new();

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--user" => user = Some(require_value(&mut args, "--user")?),
                "--role" => role = Some(require_value(&mut args, "--role")?),
                "--help" | "-h" => return Ok(None),
                _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        let user = user.ok_or(ArgsError::MissingUser)?;
        let user_id = user
            .parse::<UserId>()
            .map_err(|_| ArgsError::InvalidUserId { raw: user.clone() })?;
        let role = match role {
            Some(raw) => raw
                .parse::<Role>()
                .map_err(|_| ArgsError::InvalidRole { raw: raw.clone() })?,
            None => Role::Student,
        };

        if positional.is_empty() {
            return Err(ArgsError::MissingArg { what: "command" });
        }
        let name = positional.remove(0);
        let command = Command::parse(&name, positional)?;

        Ok(Some(Self {
            db_url,
            caller: Caller { user_id, role },
            command,
        }))
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn print_result(detail: &ResultDetail) {
    println!("{}", detail.quiz.title());
    for (n, item) in detail.questions.iter().enumerate() {
        let mark = match (item.is_answered(), item.is_correct()) {
            (false, _) => "unanswered",
            (true, true) => "correct",
            (true, false) => "wrong",
        };
        println!("{}. {} [{mark}]", n + 1, item.question.text);
        let chosen_id = item.chosen_option().map(|o| o.id);
        for option in &item.options {
            let chosen = if chosen_id == Some(option.id) { ">" } else { " " };
            let correct = if option.is_correct { "*" } else { " " };
            println!("   {chosen}{correct} {}", option.text);
        }
        if let Some(explanation) = &item.question.explanation {
            println!("   {explanation}");
        }
    }
    let score = detail.score();
    println!("Score: {}/{} ({:.0}%)", score.correct, score.total, score.percent());
}

async fn execute(
    app: &AppServices,
    caller: &Caller,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    let quizzes = app.quiz_service();
    let attempts = app.attempt_service();
    let hidden = app.hidden();

    match command {
        Command::Author { path } => {
            let raw = std::fs::read_to_string(&path)?;
            let draft: QuizDraft = serde_json::from_str(&raw)?;
            match quizzes.create_quiz(caller, draft).await {
                Ok(quiz_id) => println!("created quiz {quiz_id}"),
                Err(QuizServiceError::Invalid(errors)) => {
                    for code in errors.codes() {
                        eprintln!("{code}");
                    }
                    return Err(QuizServiceError::Invalid(errors).into());
                }
                Err(err) => return Err(err.into()),
            }
        }
        Command::List => {
            for quiz in quizzes.list_available(&hidden).await? {
                println!("{}\t{}", quiz.id(), quiz.title());
            }
        }
        Command::Mine => {
            for listing in quizzes.list_authored(caller, &hidden).await? {
                let state = if listing.hidden { "hidden" } else { "visible" };
                println!("{}\t{state}\t{}", listing.quiz.id(), listing.quiz.title());
            }
        }
        Command::Hide(quiz_id) => quizzes.hide_quiz(caller, quiz_id, &hidden).await?,
        Command::Unhide(quiz_id) => quizzes.unhide_quiz(caller, quiz_id, &hidden).await?,
        Command::ClearHidden => hidden.clear().await?,
        Command::Submit { quiz_id, responses } => {
            let attempt_id = attempts.submit(caller, quiz_id, responses).await?;
            println!("submitted attempt {attempt_id}");
        }
        Command::Result(attempt_id) => print_result(&attempts.result(attempt_id).await?),
        Command::Review(quiz_id) => {
            for row in attempts.review(caller, quiz_id).await? {
                println!(
                    "{}\t{}\t{}\t{}/{}",
                    row.attempt_id,
                    row.student_id,
                    row.submitted_at.to_rfc3339(),
                    row.score.correct,
                    row.score.total
                );
            }
        }
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let parsed =
        Args::parse(std::env::args().skip(1), |key| std::env::var(key).ok()).map_err(|e| {
            eprintln!("{e}");
            print_usage();
            e
        })?;
    let Some(parsed) = parsed else {
        print_usage();
        return Ok(());
    };

    // Open + migrate SQLite at startup; services stay storage-agnostic.
    prepare_sqlite_file(&parsed.db_url)?;
    let app =
        AppServices::new_sqlite(&parsed.db_url, Clock::system(), parsed.caller.user_id).await?;
    tracing::debug!(db = %parsed.db_url, user = %parsed.caller.user_id, "services ready");

    execute(&app, &parsed.caller, parsed.command).await
}

#[tokio::main]
async fn main() {
    let fmt = log_fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_file(false)
        .with_line_number(false);
    tracing_subscriber::registry()
        .with(fmt)
        .with(LevelFilter::from_level(Level::INFO))
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
