use std::io::{BufRead, IsTerminal, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, error};

use chw_portal::api::models::{CommodityRequest, Credentials, ReviewAction, Role};
use chw_portal::api::{ApiClient, ApiError, CommoditiesApi, RequestsApi};
use chw_portal::auth::{navigate, AuthController, AuthState, GuardDecision, LoginOutcome};
use chw_portal::config::ClientConfig;
use chw_portal::forms::{
    submit_password_change, submit_request, submit_review, PasswordChange, RequestDraft,
    ReviewDraft,
};
use chw_portal::routes::{Navigator, Route};
use chw_portal::session::SessionStore;
use chw_portal::utils::logging;
use chw_portal::views::{self, StatusFilter};

#[derive(Parser)]
#[command(name = "chw", version, about = "Commodity request client for CHWs, CHAs and admins")]
struct AppCli {
    /// Config file path (JSON)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable coloured status output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session
    Login {
        username: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in user's profile
    #[command(alias = "profile")]
    Whoami,
    /// Request counts and recent activity
    Dashboard,
    /// List requests visible to you
    Requests {
        /// all, pending, approved, rejected or delivered
        #[arg(long, default_value = "all")]
        status: StatusFilter,
    },
    /// Show one request and its history
    Show { id: u64 },
    /// List the commodity catalog
    Commodities,
    /// This month's allocation usage (CHW)
    Allocation,
    /// Submit a new commodity request (CHW)
    NewRequest {
        #[arg(long)]
        commodity: Option<u64>,
        #[arg(long, default_value = "")]
        quantity: String,
        #[arg(long, default_value = "")]
        reason: String,
    },
    /// Requests awaiting your approval (CHA/ADMIN)
    Pending,
    /// Approve a pending request (CHA/ADMIN)
    Approve {
        id: u64,
        /// Defaults to the requested quantity
        #[arg(long)]
        quantity: Option<i64>,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Reject a pending request (CHA/ADMIN)
    Reject {
        id: u64,
        #[arg(long, default_value = "")]
        reason: String,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Change your password
    ChangePassword {
        #[arg(long)]
        old: String,
        #[arg(long)]
        new: String,
        #[arg(long)]
        confirm: String,
    },
    /// Show what the route guard decides for a client path
    Route { path: String },
}

impl Commands {
    /// Client page each command stands in for; the guard runs against it.
    fn route(&self) -> Route {
        match self {
            Commands::Login { .. } | Commands::Logout => Route::Login,
            Commands::Whoami | Commands::ChangePassword { .. } => Route::Profile,
            Commands::Dashboard | Commands::Allocation => Route::Dashboard,
            Commands::Requests { .. } | Commands::Show { .. } | Commands::Commodities => {
                Route::Requests
            }
            Commands::NewRequest { .. } => Route::NewRequest,
            Commands::Pending | Commands::Approve { .. } | Commands::Reject { .. } => Route::Pending,
            Commands::Route { path } => Route::resolve(path),
        }
    }
}

struct App {
    auth: AuthController,
    navigator: Navigator,
    color: bool,
}

impl App {
    fn client(&self) -> &ApiClient {
        self.auth.client()
    }

    fn user_role(&self) -> Role {
        self.auth.snapshot().role().unwrap_or(Role::Chw)
    }

    /// Report a failed call the way a page would: a forced logout wins,
    /// otherwise the best message from the payload.
    fn fail(&self, err: ApiError, fallback: &str) -> ExitCode {
        if self.navigator.take() == Some(Route::Login) {
            eprintln!("Your session has expired. Run `chw login <username>` to sign in again.");
            return ExitCode::FAILURE;
        }
        if !matches!(err, ApiError::Form(_) | ApiError::Status { .. }) {
            error!(error = %err, "{}", fallback);
        }
        eprintln!("{}", err.user_message(fallback));
        ExitCode::FAILURE
    }
}

fn read_password() -> Result<String> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        eprint!("Password: ");
        std::io::stderr().flush().ok();
    }
    let mut line = String::new();
    stdin
        .lock()
        .read_line(&mut line)
        .context("reading password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = AppCli::parse();
    logging::init(args.verbose);

    let config = ClientConfig::load(args.config.as_deref())?;
    debug!(
        version = chw_portal::VERSION,
        api_base_url = %config.api_base_url,
        session_file = %config.session_file.display(),
        "configuration loaded"
    );

    let session = SessionStore::open(&config.session_file).await;
    let navigator = Navigator::new();
    let client = ApiClient::from_config(&config, session, navigator.clone())
        .context("building API client")?;
    let app = App {
        auth: AuthController::new(client),
        navigator,
        color: !args.no_color && std::io::stdout().is_terminal(),
    };

    run(&app, args.command).await
}

async fn run(app: &App, command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Login { username, password } => {
            let password = match password {
                Some(p) => p,
                None => read_password()?,
            };
            return Ok(login(app, Credentials { username, password }).await);
        }
        Commands::Logout => {
            app.auth.logout().await;
            println!("Signed out.");
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    let state = app.auth.restore_session().await;
    let route = command.route();
    match navigate(&state, route) {
        GuardDecision::Render => {}
        GuardDecision::Loading => {
            eprintln!("Session is still being established, try again.");
            return Ok(ExitCode::FAILURE);
        }
        GuardDecision::Redirect(Route::Login) => {
            if let Some(error) = state.error() {
                eprintln!("{}", error);
            }
            eprintln!("Not signed in. Run `chw login <username>` first.");
            return Ok(ExitCode::FAILURE);
        }
        GuardDecision::Redirect(target) => {
            eprintln!("You are not authorized to open {} (redirected to {}).", route, target);
            return Ok(ExitCode::FAILURE);
        }
    }

    Ok(dispatch(app, &state, command).await)
}

async fn login(app: &App, credentials: Credentials) -> ExitCode {
    match app.auth.login(&credentials).await {
        LoginOutcome::Success(user) => {
            println!("Signed in as {} ({}).", user.full_name(), user.role);
            ExitCode::SUCCESS
        }
        LoginOutcome::Failure { error } => {
            eprintln!("{}", error);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(app: &App, state: &AuthState, command: Commands) -> ExitCode {
    let requests = RequestsApi::new(app.client());
    let role = app.user_role();

    match command {
        Commands::Whoami => match state.user() {
            Some(user) => {
                print!("{}", views::render_profile(user));
                ExitCode::SUCCESS
            }
            None => ExitCode::FAILURE,
        },
        Commands::Dashboard => match (state.user(), requests.dashboard_stats().await) {
            (Some(user), Ok(stats)) => {
                print!("{}", views::render_dashboard(user, &stats, app.color));
                ExitCode::SUCCESS
            }
            (_, Err(e)) => app.fail(e, "Failed to load dashboard data"),
            (None, Ok(_)) => ExitCode::FAILURE,
        },
        Commands::Requests { status } => match requests.list().await {
            Ok(all) => {
                let shown = views::filter_requests(&all, status);
                print!("{}", views::render_request_table(&shown, role, status, app.color));
                ExitCode::SUCCESS
            }
            Err(e) => app.fail(e, "Failed to load requests"),
        },
        Commands::Show { id } => {
            let request = match requests.get(id).await {
                Ok(r) => r,
                Err(e) => return app.fail(e, "Failed to load request"),
            };
            print!(
                "{}",
                views::render_request_table(&[&request], role, StatusFilter::All, app.color)
            );
            if let Some(reason) = &request.rejection_reason {
                println!("Rejection reason: {}", reason);
            }
            match requests.logs(id).await {
                Ok(logs) if !logs.is_empty() => print!("\nHistory\n{}", views::render_logs(&logs)),
                Ok(_) => {}
                Err(e) => debug!(error = %e, "request history unavailable"),
            }
            ExitCode::SUCCESS
        }
        Commands::Commodities => match CommoditiesApi::new(app.client()).list().await {
            Ok(list) => {
                print!("{}", views::render_commodities(&list));
                ExitCode::SUCCESS
            }
            Err(e) => app.fail(e, "Failed to load commodities"),
        },
        Commands::Allocation => match requests.allocation_status().await {
            Ok(items) => {
                print!("{}", views::render_allocation(&items, app.color));
                ExitCode::SUCCESS
            }
            Err(e) => app.fail(e, "Failed to load allocation status"),
        },
        Commands::NewRequest {
            commodity,
            quantity,
            reason,
        } => {
            let draft = RequestDraft {
                commodity,
                quantity_requested: quantity,
                reason_for_request: reason,
            };
            // Check the catalog cap only when the basic form is already valid.
            let selected = match (draft.validate(), commodity) {
                (Ok(_), Some(id)) => CommoditiesApi::new(app.client()).get(id).await.ok(),
                _ => None,
            };
            match submit_request(app.client(), &draft, selected.as_ref()).await {
                Ok(_) => {
                    println!("Request submitted! Your commodity request has been sent for approval.");
                    ExitCode::SUCCESS
                }
                Err(e) => app.fail(e, "Failed to submit request"),
            }
        }
        Commands::Pending => match requests.pending().await {
            Ok(list) => {
                print!("{}", views::render_pending(&list));
                ExitCode::SUCCESS
            }
            Err(e) => app.fail(e, "Failed to load pending requests"),
        },
        Commands::Approve {
            id,
            quantity,
            notes,
        } => {
            let request = match requests.get(id).await {
                Ok(r) => r,
                Err(e) => return app.fail(e, "Failed to load request"),
            };
            let draft = ReviewDraft {
                action: Some(ReviewAction::Approved),
                quantity_approved: quantity,
                notes,
                ..Default::default()
            };
            review(app, id, &draft, Some(&request)).await
        }
        Commands::Reject { id, reason, notes } => {
            let draft = ReviewDraft {
                action: Some(ReviewAction::Rejected),
                rejection_reason: reason,
                notes,
                ..Default::default()
            };
            review(app, id, &draft, None).await
        }
        Commands::ChangePassword { old, new, confirm } => {
            let change = PasswordChange {
                old_password: old,
                new_password: new,
                confirm_password: confirm,
            };
            match submit_password_change(app.client(), &change).await {
                Ok(()) => {
                    println!("Password changed successfully");
                    ExitCode::SUCCESS
                }
                Err(e) => app.fail(e, "Failed to change password"),
            }
        }
        Commands::Route { path } => {
            let route = Route::resolve(&path);
            println!("{} -> {} (render)", path, route);
            ExitCode::SUCCESS
        }
        Commands::Login { .. } | Commands::Logout => ExitCode::SUCCESS,
    }
}

async fn review(
    app: &App,
    id: u64,
    draft: &ReviewDraft,
    request: Option<&CommodityRequest>,
) -> ExitCode {
    match submit_review(app.client(), id, draft, request).await {
        Ok(_) => {
            println!("Request #{} updated.", id);
            ExitCode::SUCCESS
        }
        Err(e) => app.fail(e, "Failed to update request"),
    }
}
