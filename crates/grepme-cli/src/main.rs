//! CLI interface for grepme - grep for GroupMe.

use std::env;
use std::ffi::{OsStr, OsString};
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Arg, ArgAction, Args, CommandFactory, Parser};
use clap_complete::Shell;
use env_logger::fmt::WriteStyle;
use grepme_core::{
    AppConfig, AppPaths, AuthManager, Context, Conversation, ConversationEnumerator,
    ConversationKind, GroupMeClient, MessageSearch, PresentOptions, Presenter, build_alternation,
    generate_schema,
};
use log::{LevelFilter, debug, info};
use regex::Regex;

const APP_NAME: &str = "grepme";
const REPO_URL: &str = "https://github.com/byteowlz/grepme";

fn main() -> anyhow::Result<()> {
    try_main()
}

fn try_main() -> Result<()> {
    let args: Vec<OsString> = env::args_os().collect();

    let (common, action) = if requests_list(&args) {
        let list = ListCli::parse_from(list_arguments(&args));
        (list.common, Action::List)
    } else {
        let cli = Cli::parse_from(&args);
        if let Some(shell) = cli.completions {
            handle_completions(shell);
            return Ok(());
        }
        cli.into_parts()
    };

    let ctx = RuntimeContext::new(common)?;
    ctx.init_logging()?;
    debug!("resolved paths: {}", ctx.paths);

    let result = dispatch(&ctx, &action);
    match result {
        Err(err) if is_broken_pipe(&err) => {
            debug!("stdout closed: {err}");
            Ok(())
        }
        other => other,
    }
}

fn dispatch(ctx: &RuntimeContext, action: &Action) -> Result<()> {
    match action {
        Action::PrintSchema => {
            let schema = generate_schema(APP_NAME, REPO_URL)?;
            writeln!(io::stdout(), "{schema}")?;
        }
        Action::PrintConfig => {
            let body = toml::to_string_pretty(&ctx.config).context("serializing config to TOML")?;
            write!(io::stdout(), "{body}")?;
        }
        Action::SaveToken(raw) => {
            let auth = ctx.auth();
            auth.save(raw)?;
            info!("saved token to {}", auth.storage().path().display());
            writeln!(io::stdout(), "Token saved to {}", auth.storage().path().display())?;
        }
        Action::ForgetToken => {
            ctx.auth().forget()?;
            writeln!(io::stdout(), "Token removed.")?;
        }
        Action::List => {
            let client = ctx.client()?;
            block_on_interruptible(handle_list(ctx, &client))?;
        }
        Action::Search(opts) => {
            let client = ctx.client()?;
            block_on_interruptible(handle_search(ctx, &client, opts))?;
        }
    }
    Ok(())
}

/// Drive `future` to completion, or stop quietly on Ctrl-C.
fn block_on_interruptible<F>(future: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        tokio::select! {
            result = future => result,
            signal = tokio::signal::ctrl_c() => {
                debug!("interrupted");
                // keep the shell prompt off the ^C line
                writeln!(io::stdout()).ok();
                signal.context("listening for Ctrl-C")
            }
        }
    })
}

#[derive(Debug, Parser)]
#[command(
    name = "grepme",
    author,
    version,
    about = "grep for GroupMe: search group and direct message history"
)]
struct Cli {
    #[command(flatten)]
    search: SearchOpts,

    #[command(flatten)]
    common: CommonOpts,

    /// Show all available conversations and exit. Every other search
    /// argument is ignored.
    #[arg(short, long)]
    list: bool,

    /// Store an access token for later runs and exit.
    #[arg(long, value_name = "TOKEN", conflicts_with = "forget_token")]
    save_token: Option<String>,

    /// Delete the stored access token and exit.
    #[arg(long)]
    forget_token: bool,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,

    /// Print the JSON schema of the config file and exit.
    #[arg(long)]
    print_schema: bool,

    /// Generate shell completions and exit.
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,
}

impl Cli {
    fn into_parts(self) -> (CommonOpts, Action) {
        let action = if self.print_schema {
            Action::PrintSchema
        } else if self.print_config {
            Action::PrintConfig
        } else if let Some(raw) = self.save_token {
            Action::SaveToken(raw)
        } else if self.forget_token {
            Action::ForgetToken
        } else if self.list {
            Action::List
        } else {
            Action::Search(self.search)
        };
        (self.common, action)
    }
}

/// What a run does once the command line is understood.
#[derive(Debug)]
enum Action {
    PrintSchema,
    PrintConfig,
    SaveToken(String),
    ForgetToken,
    List,
    Search(SearchOpts),
}

/// Options that only shape a search.
#[derive(Debug, Clone, Args)]
struct SearchOpts {
    /// Text to search for. Each value is a regular expression; a message
    /// matches if any of them does.
    #[arg(
        value_name = "TEXT",
        required_unless_present_any = [
            "list",
            "save_token",
            "forget_token",
            "completions",
            "print_config",
            "print_schema",
        ]
    )]
    text: Vec<String>,

    /// Conversation to search, matched as a regex against its name. Can be
    /// given multiple times. Defaults to `search.default_group`.
    #[arg(long = "group", value_name = "NAME")]
    groups: Vec<String>,

    /// Don't show who said something.
    #[arg(short, long)]
    quiet: bool,

    /// Show the date a message was sent.
    #[arg(short, long)]
    date: bool,

    /// Ignore case distinctions in both text and groups.
    #[arg(short, long)]
    ignore_case: bool,

    /// Show the following n messages after a match.
    #[arg(short = 'A', long, value_name = "N", default_value_t = 0)]
    after_context: usize,

    /// Show the previous n messages before a match.
    #[arg(short = 'B', long, value_name = "N", default_value_t = 0)]
    before_context: usize,

    /// Show n messages around a match. Overrides -A and -B.
    #[arg(short = 'C', long, value_name = "N")]
    context: Option<usize>,
}

impl SearchOpts {
    const fn search_context(&self) -> Context {
        match self.context {
            Some(n) => Context::symmetric(n),
            None => Context::new(self.before_context, self.after_context),
        }
    }
}

/// Options every online or offline action honors, `--list` included.
#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Always color output.
    #[arg(long, overrides_with = "no_color")]
    color: bool,

    /// Never color output.
    #[arg(long = "no-color", overrides_with = "color")]
    no_color: bool,

    /// Print one JSON object per match (or per conversation with --list).
    #[arg(long)]
    json: bool,

    /// Override the config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (stackable).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,

    /// Enable trace logging.
    #[arg(long)]
    trace: bool,

    /// GroupMe access token.
    #[arg(long, env = "GREPME_TOKEN", hide_env_values = true, value_name = "TOKEN")]
    token: Option<String>,

    /// Override the API base URL.
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,
}

impl CommonOpts {
    fn color_enabled(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            io::stdout().is_terminal()
        }
    }
}

// ─── List pre-scan ───────────────────────────────────────────────────

/// The part of the command line `--list` honors.
#[derive(Debug, Parser)]
#[command(
    name = "grepme",
    disable_help_flag = true,
    disable_version_flag = true,
    args_override_self = true
)]
struct ListCli {
    #[command(flatten)]
    common: CommonOpts,
}

/// True when `-l`/`--list` appears before any `--` and is not the value of
/// `--group`.
fn requests_list(args: &[OsString]) -> bool {
    let mut previous: Option<&OsStr> = None;
    for arg in args.iter().skip(1).map(OsString::as_os_str) {
        if arg == "--" {
            return false;
        }
        if (arg == "--list" || arg == "-l") && previous != Some(OsStr::new("--group")) {
            return true;
        }
        previous = Some(arg);
    }
    false
}

/// Keep only the options [`ListCli`] knows, with their values, so nothing
/// else on the command line can fail validation.
fn list_arguments(args: &[OsString]) -> Vec<OsString> {
    let cmd = ListCli::command();
    let long = |name: &str| cmd.get_arguments().find(|arg| arg.get_long() == Some(name));
    let short = |c: char| cmd.get_arguments().find(|arg| arg.get_short() == Some(c));

    let mut kept: Vec<OsString> = args.iter().take(1).cloned().collect();
    let mut rest = args.iter().skip(1);
    while let Some(raw) = rest.next() {
        let Some(text) = raw.to_str() else { continue };
        if text == "--" {
            break;
        }
        let wants_value = if let Some(name) = text.strip_prefix("--") {
            match name.split_once('=') {
                Some((name, _)) if long(name).is_some() => false,
                None => match long(name) {
                    Some(arg) => takes_value(arg),
                    None => continue,
                },
                Some(_) => continue,
            }
        } else if let Some(cluster) = text.strip_prefix('-').filter(|c| !c.is_empty()) {
            let known: Option<Vec<&Arg>> = cluster.chars().map(short).collect();
            match known.as_deref() {
                Some([arg]) => takes_value(arg),
                Some(all) if !all.iter().copied().any(takes_value) => false,
                _ => continue,
            }
        } else {
            continue;
        };

        kept.push(raw.clone());
        if wants_value {
            kept.extend(rest.next().cloned());
        }
    }
    kept
}

fn takes_value(arg: &Arg) -> bool {
    arg.get_action().takes_values()
}

// ─── Runtime ─────────────────────────────────────────────────────────

#[derive(Debug)]
struct RuntimeContext {
    common: CommonOpts,
    paths: AppPaths,
    config: AppConfig,
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let paths = AppPaths::discover(common.config.as_deref())?;
        let config = AppConfig::load(&paths)?;
        let paths = paths.apply_overrides(&config)?;
        Ok(Self {
            common,
            paths,
            config,
        })
    }

    fn init_logging(&self) -> Result<()> {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(self.effective_log_level());
        if let Ok(filters) = env::var("RUST_LOG") {
            builder.parse_filters(&filters);
        }

        let force_color = self.common.color || env::var_os("FORCE_COLOR").is_some();
        let disable_color = self.common.no_color
            || env::var_os("NO_COLOR").is_some()
            || (!force_color && !io::stderr().is_terminal());

        if disable_color {
            builder.write_style(WriteStyle::Never);
        } else if force_color {
            builder.write_style(WriteStyle::Always);
        } else {
            builder.write_style(WriteStyle::Auto);
        }

        builder.try_init().or_else(|err| {
            if self.common.verbose > 0 {
                eprintln!("logger already initialized: {err}");
            }
            Ok(())
        })
    }

    const fn effective_log_level(&self) -> LevelFilter {
        if self.common.trace {
            LevelFilter::Trace
        } else if self.common.debug {
            LevelFilter::Debug
        } else {
            match self.common.verbose {
                0 => self.config.logging.level.to_level_filter(),
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }

    fn auth(&self) -> AuthManager {
        AuthManager::new(&self.paths.data_dir)
    }

    fn client(&self) -> Result<GroupMeClient> {
        let token = self.auth().resolve(
            self.common.token.as_deref(),
            self.config.api.token.as_deref(),
        )?;
        let base_url = self
            .common
            .api_url
            .as_deref()
            .unwrap_or(&self.config.api.base_url);
        Ok(GroupMeClient::new(base_url, token, self.config.api.timeout())?)
    }

    fn presenter(&self, opts: &SearchOpts) -> Presenter {
        let options = PresentOptions {
            show_author: !opts.quiet,
            show_date: opts.date,
            color: self.common.color_enabled(),
        };
        Presenter::new(options, self.config.search.date_format.as_str())
    }
}

// ─── Handlers ────────────────────────────────────────────────────────

async fn handle_list(ctx: &RuntimeContext, client: &GroupMeClient) -> Result<()> {
    let stdout = io::stdout();
    for kind in [ConversationKind::Group, ConversationKind::Direct] {
        let mut conversations = ConversationEnumerator::new(client, kind, None);
        while let Some(conversation) = conversations.next_conversation().await? {
            let mut out = stdout.lock();
            if ctx.common.json {
                serde_json::to_writer(&mut out, &conversation).map_err(io::Error::from)?;
                writeln!(out)?;
            } else {
                writeln!(out, "{}", conversation.name)?;
            }
        }
    }
    Ok(())
}

async fn handle_search(
    ctx: &RuntimeContext,
    client: &GroupMeClient,
    opts: &SearchOpts,
) -> Result<()> {
    let text_pattern = build_alternation(&opts.text, opts.ignore_case)?;
    let group_pattern = if opts.groups.is_empty() {
        build_alternation(&[ctx.config.search.default_group.as_str()], opts.ignore_case)?
    } else {
        build_alternation(&opts.groups, opts.ignore_case)?
    };

    let presenter = ctx.presenter(opts);
    debug!("text: {text_pattern}, groups: {group_pattern}");

    for kind in [ConversationKind::Group, ConversationKind::Direct] {
        let mut conversations = ConversationEnumerator::new(client, kind, Some(&group_pattern));
        while let Some(conversation) = conversations.next_conversation().await? {
            search_conversation(ctx, client, &conversation, &text_pattern, &presenter, opts)
                .await?;
        }
    }
    Ok(())
}

async fn search_conversation(
    ctx: &RuntimeContext,
    client: &GroupMeClient,
    conversation: &Conversation,
    pattern: &Regex,
    presenter: &Presenter,
    opts: &SearchOpts,
) -> Result<()> {
    info!("searching {} {:?}", conversation.kind, conversation.name);
    let mut search = MessageSearch::new(client, conversation, pattern, opts.search_context())
        .with_page_size(ctx.config.api.page_size);

    let stdout = io::stdout();
    let mut matches = 0_usize;
    while let Some(window) = search.next_match().await? {
        matches += 1;
        let mut out = stdout.lock();
        if ctx.common.json {
            presenter.write_json(&mut out, conversation, &window)?;
        } else {
            presenter.write_window(&mut out, &window, pattern)?;
        }
        out.flush()?;
    }
    info!(
        "{} {:?}: {matches} matches in {} pages",
        conversation.kind,
        conversation.name,
        search.fetches()
    );
    Ok(())
}

fn handle_completions(shell: Shell) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
}

fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|io_err| io_err.kind() == io::ErrorKind::BrokenPipe)
    })
}
