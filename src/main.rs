use clap::{Parser, Subcommand};
use chrono::{DateTime, Utc};
use ordergate::broker::BrokerClient;
use ordergate::config::{AppConfig, LoggingConfig};
use ordergate::domain::{OrderAction, OrderIntent, ScheduleKind};
use ordergate::error::{OrdergateError, Result};
use ordergate::notify::NotificationChannel;
use ordergate::runner::CronSpec;
use ordergate::store::ExecutionFilter;
use ordergate::{
    ApprovalConfig, ApprovalGateway, CliAgentPipeline, OrderExecutor, PaperBroker, PromptRunner,
    SchedulerStore, Store, TelegramChannel, TimerService,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ordergate", about = "Approval-gated trading assistant core")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config directory path
    #[arg(short, long, default_value = "config")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the service: approval listener plus scheduled prompt runner
    Serve,
    /// Run a stored prompt through the agent pipeline once
    RunPrompt {
        /// Prompt id to run
        prompt_id: i64,
    },
    /// Submit one approval-gated order against the paper broker
    Order {
        /// Contract id to trade
        con_id: i64,
        /// BUY or SELL
        action: String,
        /// Number of units
        quantity: u32,
        /// Limit price; omitted means a market order
        #[arg(long)]
        limit: Option<Decimal>,
    },
    /// Store a new prompt
    AddPrompt {
        /// Prompt text
        content: String,
    },
    /// Schedule a stored prompt
    Schedule {
        /// Prompt id to schedule
        prompt_id: i64,
        /// One-time run timestamp (RFC 3339)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
        /// Recurring cron expression (5 fields)
        #[arg(long)]
        cron: Option<String>,
    },
    /// Delete a stored prompt; execution history keeps its rows
    DeletePrompt {
        /// Prompt id to delete
        prompt_id: i64,
    },
    /// Delete a schedule; a running service drops its timer on the next
    /// schedule reload
    DeleteSchedule {
        /// Schedule id to delete
        schedule_id: i64,
    },
    /// List stored schedules
    Schedules,
    /// Show execution history, newest first
    History {
        /// Only executions for this schedule
        #[arg(long)]
        schedule_id: Option<i64>,
        /// Only executions for this prompt
        #[arg(long)]
        prompt_id: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match AppConfig::load_from(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config.logging);

    if let Err(errors) = config.validate() {
        for message in &errors {
            error!("Invalid configuration: {}", message);
        }
        std::process::exit(1);
    }

    match cli.command {
        Some(Commands::RunPrompt { prompt_id }) => run_prompt_once(config, prompt_id).await,
        Some(Commands::Order {
            con_id,
            action,
            quantity,
            limit,
        }) => run_order(config, con_id, &action, quantity, limit).await,
        Some(Commands::AddPrompt { content }) => add_prompt(config, &content).await,
        Some(Commands::Schedule {
            prompt_id,
            at,
            cron,
        }) => add_schedule(config, prompt_id, at, cron.as_deref()).await,
        Some(Commands::DeletePrompt { prompt_id }) => delete_prompt(config, prompt_id).await,
        Some(Commands::DeleteSchedule { schedule_id }) => {
            delete_schedule(config, schedule_id).await
        }
        Some(Commands::Schedules) => list_schedules(config).await,
        Some(Commands::History {
            schedule_id,
            prompt_id,
        }) => show_history(config, schedule_id, prompt_id).await,
        Some(Commands::Serve) | None => serve(config).await,
    }
}

/// Long-running mode: reload persisted schedules and dispatch them until
/// shutdown
async fn serve(config: AppConfig) -> Result<()> {
    info!("Starting ordergate service");

    let store = connect_store(&config).await?;

    let pipeline = Arc::new(CliAgentPipeline::new(config.agent.clone()));
    if !pipeline.check_availability().await? {
        warn!("Agent CLI unavailable; scheduled prompts will fail until it is restored");
    }

    let runner = Arc::new(PromptRunner::new(
        Arc::new(store.clone()) as Arc<dyn SchedulerStore>,
        pipeline,
        config.runner.clone(),
    ));

    let timers = TimerService::new(runner);
    timers.reload_schedules(&store).await?;

    let channel = TelegramChannel::new(&config.telegram);
    if let Err(e) = channel
        .send_message("🟢 Trading assistant is up, schedules loaded")
        .await
    {
        warn!("Startup notification failed: {}", e);
    }

    info!("Service running, press Ctrl+C to stop");
    shutdown_signal().await;

    info!("Shutting down");
    timers.clear();
    info!("Shutdown complete");
    Ok(())
}

async fn run_prompt_once(config: AppConfig, prompt_id: i64) -> Result<()> {
    let store = connect_store(&config).await?;
    let pipeline = Arc::new(CliAgentPipeline::new(config.agent.clone()));
    let runner = PromptRunner::new(
        Arc::new(store) as Arc<dyn SchedulerStore>,
        pipeline,
        config.runner.clone(),
    );

    let answer = runner.run(prompt_id, None).await?;
    println!("{answer}");
    Ok(())
}

async fn run_order(
    config: AppConfig,
    con_id: i64,
    action: &str,
    quantity: u32,
    limit: Option<Decimal>,
) -> Result<()> {
    let action: OrderAction = action
        .parse()
        .map_err(|e: &str| OrdergateError::Validation(e.to_string()))?;
    let intent = match limit {
        Some(price) => OrderIntent::limit(action, quantity, price),
        None => OrderIntent::market(action, quantity),
    };

    let channel: Arc<dyn NotificationChannel> = Arc::new(TelegramChannel::new(&config.telegram));
    let gateway = Arc::new(ApprovalGateway::new(
        channel,
        ApprovalConfig::new(
            config.telegram.allowed_user_id.clone(),
            Duration::from_secs(config.telegram.approval_timeout_secs),
        ),
    ));

    let broker = Arc::new(PaperBroker::new());
    let contract = broker.qualify(con_id).await?;
    let executor = OrderExecutor::new(broker, gateway, config.execution.clone());

    let outcome = executor.execute_order(&contract, &intent).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn add_prompt(config: AppConfig, content: &str) -> Result<()> {
    let store = connect_store(&config).await?;
    let prompt = store.insert_prompt(content).await?;
    println!("Stored prompt {}", prompt.id);
    Ok(())
}

async fn add_schedule(
    config: AppConfig,
    prompt_id: i64,
    at: Option<DateTime<Utc>>,
    cron: Option<&str>,
) -> Result<()> {
    let (kind, cron) = match (at, cron) {
        (Some(_), None) => (ScheduleKind::OneTime, None),
        (None, Some(expression)) => {
            // Reject bad expressions before they reach the database
            CronSpec::parse(expression)?;
            (ScheduleKind::Recurring, Some(expression))
        }
        _ => {
            return Err(OrdergateError::Validation(
                "pass exactly one of --at or --cron".to_string(),
            ));
        }
    };

    let store = connect_store(&config).await?;
    let schedule = store.insert_schedule(prompt_id, kind, at, cron).await?;
    println!("Stored schedule {} ({})", schedule.id, schedule.kind.as_str());
    Ok(())
}

async fn delete_prompt(config: AppConfig, prompt_id: i64) -> Result<()> {
    let store = connect_store(&config).await?;
    if store.delete_prompt(prompt_id).await? {
        println!("Deleted prompt {prompt_id}");
    } else {
        println!("No prompt {prompt_id}");
    }
    Ok(())
}

async fn delete_schedule(config: AppConfig, schedule_id: i64) -> Result<()> {
    let store = connect_store(&config).await?;
    if store.delete_schedule(schedule_id).await? {
        println!("Deleted schedule {schedule_id}");
    } else {
        println!("No schedule {schedule_id}");
    }
    Ok(())
}

async fn list_schedules(config: AppConfig) -> Result<()> {
    let store = connect_store(&config).await?;
    let schedules = store.list_schedules().await?;

    if schedules.is_empty() {
        println!("No schedules stored");
        return Ok(());
    }

    for schedule in &schedules {
        let when = match schedule.kind {
            ScheduleKind::OneTime => schedule
                .run_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string()),
            ScheduleKind::Recurring => schedule
                .cron_expression
                .clone()
                .unwrap_or_else(|| "-".to_string()),
        };
        println!(
            "{:>4}  prompt {:>4}  {:<9}  {}",
            schedule.id,
            schedule.prompt_id,
            schedule.kind.as_str(),
            when
        );
    }
    Ok(())
}

async fn show_history(
    config: AppConfig,
    schedule_id: Option<i64>,
    prompt_id: Option<i64>,
) -> Result<()> {
    let store = connect_store(&config).await?;
    let filter = ExecutionFilter {
        schedule_id,
        prompt_id,
        ..Default::default()
    };
    let executions = store.list_executions(&filter).await?;

    if executions.is_empty() {
        println!("No executions recorded");
        return Ok(());
    }

    for record in &executions {
        let detail = record
            .result
            .as_deref()
            .or(record.error.as_deref())
            .unwrap_or("-");
        println!(
            "{:>4}  {}  {:<7}  {}",
            record.id,
            record.executed_at.format("%Y-%m-%d %H:%M:%S"),
            record.status.as_str(),
            detail
        );
    }
    Ok(())
}

async fn connect_store(config: &AppConfig) -> Result<Store> {
    let store = Store::new(&config.database.url, config.database.max_connections).await?;
    store.init_schema().await?;
    Ok(store)
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},sqlx=warn", config.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
