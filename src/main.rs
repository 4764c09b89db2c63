use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod access;
mod api;
mod buckets;
mod config;
mod dashboard;
mod error;
mod metrics;
mod models;
mod report;
mod search;
mod selection;
mod session;
mod settings;

use api::ApiClient;
use config::Config;
use dashboard::load_or_default;
use selection::{SelectedEmployee, SelectionStore};
use session::{load_session, Page, Role, Session};

#[derive(Parser)]
#[command(name = "bankperf")]
#[command(
    about = "Bank performance console: branch KPIs, employee efficiency and access administration",
    long_about = None
)]
struct Cli {
    /// Backend base URL, overrides BANKPERF_API_URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check credentials against the backend and show the signed-in profile
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Show the signed-in profile
    Whoami,
    /// Greeting and the pages available to your role
    Welcome,
    /// Find a page by name
    Search { query: String },
    /// Bank-wide KPIs: satisfaction, fraud and churn rates, efficiency
    Bank {
        #[arg(long)]
        bank_id: String,
        #[arg(long)]
        year: Option<i32>,
    },
    /// Branch KPIs for one year
    Branch {
        #[arg(long)]
        branch_id: String,
        #[arg(long)]
        year: Option<i32>,
    },
    /// Efficiency of every employee in a branch
    Employees {
        #[arg(long)]
        branch_id: String,
        #[arg(long, requires = "to")]
        from: Option<NaiveDate>,
        #[arg(long, requires = "from")]
        to: Option<NaiveDate>,
        /// Also export the ranking as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Remember an employee for the `employee` drill-down
    SelectEmployee { employee_id: String },
    /// Drill-down for one employee (defaults to the selected one)
    Employee {
        #[arg(long)]
        id: Option<String>,
        #[arg(long, requires = "to")]
        from: Option<NaiveDate>,
        #[arg(long, requires = "from")]
        to: Option<NaiveDate>,
    },
    /// Generate a markdown branch report
    Report {
        #[arg(long)]
        branch_id: String,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long, default_value = "branch-report.md")]
        out: PathBuf,
    },
    /// Permanently escalate an employee's role and provision their account
    GrantAccess {
        #[arg(long)]
        employee_id: String,
        #[arg(long, value_enum)]
        role: Role,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
    },
    /// Grant a time-boxed role elevation
    TempAccess {
        #[arg(long)]
        employee_id: String,
        #[arg(long, value_enum)]
        role: Role,
        /// RFC 3339 timestamp, or YYYY-MM-DD for end of that day (UTC)
        #[arg(long, value_parser = parse_expiry)]
        expires_at: DateTime<Utc>,
        #[arg(long)]
        reason: String,
        /// Your own password, verified before the grant is sent
        #[arg(long)]
        admin_password: String,
    },
    /// Change your password
    ChangePassword {
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
        #[arg(long)]
        confirm: String,
    },
}

fn parse_expiry(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(23, 59, 59))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("expected an RFC 3339 timestamp or YYYY-MM-DD, got {raw:?}"))
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bankperf=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn session_for(client: &ApiClient, page: Page) -> anyhow::Result<Session> {
    let session = load_session(client)
        .await
        .context("failed to load the signed-in profile")?;
    session.require(page)?;
    Ok(session)
}

fn window(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> anyhow::Result<Option<(NaiveDate, NaiveDate)>> {
    match (from, to) {
        (Some(from), Some(to)) if from > to => anyhow::bail!("--from {from} is after --to {to}"),
        (Some(from), Some(to)) => Ok(Some((from, to))),
        _ => Ok(None),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env()?.with_api_url(cli.api_url);
    let current_year = Utc::now().year();

    if let Commands::Search { query } = &cli.command {
        let hits = search::search(query);
        if hits.is_empty() {
            println!("No pages match {query:?}.");
        }
        for hit in hits {
            println!("{:<24} {}", hit.label, hit.route);
        }
        return Ok(());
    }

    if let Commands::Login { email, password } = &cli.command {
        let client = ApiClient::new(&Config {
            session_cookie: None,
            ..config.clone()
        })?;
        client.login(email, password).await.context("login failed")?;
        let session = load_session(&client).await?;
        print!("{}", report::render_profile(&session));
        return Ok(());
    }

    let client = ApiClient::connect(&config)
        .await
        .with_context(|| format!("failed to open a session with {}", config.api_url))?;
    let selection = SelectionStore::new(&config.state_dir);

    match cli.command {
        Commands::Search { .. } | Commands::Login { .. } => {}
        Commands::Whoami => {
            let session = session_for(&client, Page::UserInfo).await?;
            print!("{}", report::render_profile(&session));
        }
        Commands::Welcome => {
            let session = session_for(&client, Page::Welcome).await?;
            print!("{}", report::render_welcome(&session));
        }
        Commands::Bank { bank_id, year } => {
            let year = year.unwrap_or(current_year);
            let (session, (view, failure)) = tokio::join!(
                session_for(&client, Page::BankPerformance),
                load_or_default(
                    Page::BankPerformance.label(),
                    dashboard::bank_performance(&client, &bank_id, year)
                ),
            );
            session?;
            print!("{}", report::render_bank(&view));
            if let Some(err) = failure {
                return Err(err).context("bank performance is incomplete");
            }
        }
        Commands::Branch { branch_id, year } => {
            let year = year.unwrap_or(current_year);
            let (session, (view, failure)) = tokio::join!(
                session_for(&client, Page::BranchPerformance),
                load_or_default(
                    Page::BranchPerformance.label(),
                    dashboard::branch_performance(&client, &branch_id, year)
                ),
            );
            session?;
            print!("{}", report::render_branch(&view));
            if let Some(err) = failure {
                return Err(err).context("branch performance is incomplete");
            }
        }
        Commands::Employees {
            branch_id,
            from,
            to,
            csv,
        } => {
            selection.clear()?;
            let window = window(from, to)?;
            let (session, (view, failure)) = tokio::join!(
                session_for(&client, Page::EmployeePerformance),
                load_or_default(
                    Page::EmployeePerformance.label(),
                    dashboard::employee_performance(&client, &branch_id, window)
                ),
            );
            session?;
            print!("{}", report::render_employees(&view));
            if let Some(err) = failure {
                return Err(err).context("employee performance is incomplete");
            }
            if let Some(path) = csv {
                report::write_ranking_csv(&path, &view.scores)?;
                println!("Ranking written to {}.", path.display());
            }
        }
        Commands::SelectEmployee { employee_id } => {
            session_for(&client, Page::EmployeePerformance).await?;
            let employees = client.employees().await?;
            let employee = employees
                .iter()
                .find(|e| e.id == employee_id)
                .with_context(|| format!("Employee ID {employee_id} not found"))?;
            selection.store(&SelectedEmployee {
                employee_id: employee.id.clone(),
                full_name: employee.full_name.clone(),
            })?;
            println!("Selected {} ({}).", employee.full_name, employee.id);
        }
        Commands::Employee { id, from, to } => {
            let employee_id = match id {
                Some(id) => id,
                None => selection
                    .load()?
                    .map(|selected| selected.employee_id)
                    .context("no employee selected; pass --id or run `select-employee` first")?,
            };
            let window = window(from, to)?;
            let (session, (view, failure)) = tokio::join!(
                session_for(&client, Page::EmployeeDetail),
                load_or_default(
                    Page::EmployeeDetail.label(),
                    dashboard::employee_detail(&client, &employee_id, window)
                ),
            );
            session?;
            print!("{}", report::render_employee(&view));
            if let Some(err) = failure {
                return Err(err).context("employee details are incomplete");
            }
        }
        Commands::Report {
            branch_id,
            year,
            out,
        } => {
            session_for(&client, Page::BranchPerformance).await?;
            let year = year.unwrap_or(current_year);
            let view = dashboard::branch_performance(&client, &branch_id, year).await?;
            std::fs::write(&out, report::build_report(&view))?;
            println!("Report written to {}.", out.display());
        }
        Commands::GrantAccess {
            employee_id,
            role,
            password,
            confirm_password,
        } => {
            session_for(&client, Page::GiveAccess).await?;
            let form = access::PrivilegeEscalation {
                employee_id,
                role,
                password,
                confirm_password,
            };
            let message = access::escalate(&client, &form).await?;
            println!("{message}");
        }
        Commands::TempAccess {
            employee_id,
            role,
            expires_at,
            reason,
            admin_password,
        } => {
            let session = session_for(&client, Page::TemporaryAccess).await?;
            let form = access::TemporaryAccess {
                employee_id,
                role,
                expires_at,
                reason,
                admin_password,
            };
            let message =
                access::grant_temporary(&client, &session.profile, &form, Utc::now()).await?;
            println!("{message}");
        }
        Commands::ChangePassword {
            current,
            new,
            confirm,
        } => {
            session_for(&client, Page::Settings).await?;
            let form = settings::PasswordChangeForm {
                current,
                new,
                confirm,
            };
            let message = settings::change_password(&client, &form).await?;
            println!("{message}");
        }
    }

    Ok(())
}
