//! taskstreak command-line entry point.

use anyhow::Result;
use chrono::{DateTime, Days, Local, NaiveDate, Utc};
use clap::Parser;
use serde::Serialize;
use std::process::ExitCode;
use taskstreak::cli::habit::HabitCommand;
use taskstreak::cli::task::TaskCommand;
use taskstreak::cli::{Cli, Command, ExpandArgs, HeatmapArgs};
use taskstreak::config::{Config, ConfigLoader};
use taskstreak::db::{ActivityRequest, Database, TaskFilter};
use taskstreak::error::LedgerError;
use taskstreak::format::{self, OutputFormat};
use taskstreak::logging::{LogTarget, init_logging};
use taskstreak::recurrence::{self, RecurrenceRule};
use taskstreak::types::{NewHabit, Permission, Task};
use taskstreak::{habits, gamification};
use tracing::{debug, info};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(&LogTarget::parse(&cli.log), cli.verbose) {
        eprintln!("Failed to initialize logging: {err:#}");
        return ExitCode::FAILURE;
    }

    let output = cli.format.as_deref().and_then(OutputFormat::from_str);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err, output.unwrap_or_default());
            ExitCode::FAILURE
        }
    }
}

/// Print an error. Ledger errors carry a code for JSON consumers.
fn report_error(err: &anyhow::Error, output: OutputFormat) {
    match (output, err.downcast_ref::<LedgerError>()) {
        (OutputFormat::Json, Some(ledger)) => {
            let report = serde_json::json!({ "error": ledger.report() });
            println!("{report}");
        }
        (OutputFormat::Json, None) => {
            println!("{}", serde_json::json!({ "error": { "message": format!("{err:#}") } }));
        }
        (OutputFormat::Markdown, _) => eprintln!("Error: {err:#}"),
    }
}

/// Everything a command needs.
struct Context {
    db: Database,
    config: Config,
    user: String,
    today: NaiveDate,
    /// Timestamp for ledger writes; falls on `today` when `--today` is given.
    now: DateTime<Utc>,
    output: OutputFormat,
}

impl Context {
    fn emit<T: Serialize>(&self, value: &T, markdown: impl FnOnce() -> String) -> Result<()> {
        match self.output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Markdown => print!("{}", markdown()),
        }
        Ok(())
    }
}

fn run(cli: Cli) -> Result<()> {
    // If explicit config path given, set it as env var for ConfigLoader to pick up
    if let Some(config_path) = &cli.config {
        // SAFETY: single-threaded at this point; nothing else reads the environment yet
        unsafe {
            std::env::set_var("TASKSTREAK_CONFIG_PATH", config_path);
        }
    }
    let mut loader = ConfigLoader::load()?;
    for (tier, path) in loader.sources() {
        debug!(tier = %tier, path = %path.display(), "Config source");
    }

    let config = loader.config_mut();
    if let Some(db_path) = &cli.database {
        config.storage.db_path = db_path.into();
    }
    let config = loader.into_config();
    config.ensure_db_dir()?;

    let db = Database::open(&config.storage.db_path)?;
    info!(db = %config.storage.db_path.display(), user = %cli.user, "Database opened");

    let output = match cli.format.as_deref() {
        Some(s) => OutputFormat::from_str(s).ok_or_else(|| {
            LedgerError::invalid_value("format", format!("expected json or markdown, got '{s}'"))
        })?,
        None => config.output.format,
    };

    let now = cli.ledger_timestamp(Utc::now());
    let ctx = Context {
        db,
        config,
        user: cli.user,
        today: cli.today.unwrap_or_else(|| Local::now().date_naive()),
        now,
        output,
    };

    match cli.command {
        Command::Task(cmd) => run_task(&ctx, cmd),
        Command::Habit(cmd) => run_habit(&ctx, cmd),
        Command::Stats => run_stats(&ctx),
        Command::Heatmap(args) => run_heatmap(&ctx, args),
        Command::Expand(args) => run_expand(&ctx, args),
        Command::Rebuild => {
            let stats = ctx
                .db
                .rebuild_gamification(&ctx.user, &ctx.config.gamification.level_thresholds)?
                .as_of(ctx.today);
            ctx.emit(&stats, || {
                let levels = &ctx.config.gamification.level_thresholds;
                let progress = levels.progress(stats.total_points);
                format::format_stats_markdown(&stats, &progress, &[])
            })
        }
    }
}

fn require_task(ctx: &Context, id: &str) -> Result<Task> {
    ctx.db
        .get_task(id)?
        .ok_or_else(|| LedgerError::task_not_found(id).into())
}

/// Instance to complete when none is given: the earliest open occurrence up
/// to today, else the next one after today.
fn default_instance(ctx: &Context, task: &Task) -> Result<Option<NaiveDate>> {
    if !task.is_recurring() {
        return Ok(None);
    }
    let anchor = task.recurrence_anchor();
    if anchor <= ctx.today {
        if let Some(first) = ctx.db.pending_occurrences(&task.id, anchor, ctx.today)?.first() {
            return Ok(Some(*first));
        }
    }
    let after = ctx.today.pred_opt().unwrap_or(ctx.today);
    Ok(recurrence::next_occurrence_after(task.recurrence, anchor, after)?)
}

fn run_task(ctx: &Context, cmd: TaskCommand) -> Result<()> {
    match cmd {
        TaskCommand::Add(args) => {
            let task = ctx.db.create_task(args.into_new_task(&ctx.user)?)?;
            ctx.emit(&task, || format::format_task_markdown(&task, &[]))
        }
        TaskCommand::List(args) => {
            let tasks = ctx.db.list_tasks(&TaskFilter {
                user_id: Some(ctx.user.clone()),
                completed: args.completed_filter(),
                category: args.category.clone(),
                tag: args.tag.clone(),
                recurring: args.recurring.then_some(true),
                limit: args.limit,
            })?;
            ctx.emit(&tasks, || format::format_tasks_markdown(&tasks))
        }
        TaskCommand::Show { id } => {
            let task = require_task(ctx, &id)?;
            let unmet = ctx.db.unmet_dependencies(&id)?;
            ctx.emit(&task, || format::format_task_markdown(&task, &unmet))
        }
        TaskCommand::Complete(args) => {
            let task = require_task(ctx, &args.id)?;
            let instance = match args.date {
                Some(date) => Some(date),
                None => default_instance(ctx, &task)?,
            };
            let award = ctx.db.complete_task(
                &ctx.user,
                &args.id,
                instance,
                &ctx.config.gamification,
                ctx.now,
            )?;
            ctx.emit(&award, || {
                let mut md = format!(
                    "Completed **{}**: +{} points ({} total, level {})\n",
                    task.title, award.points_awarded, award.new_total, award.level
                );
                if award.leveled_up {
                    md.push_str(&format!("Level up! Now level {}\n", award.level));
                }
                for key in &award.unlocked {
                    let name =
                        gamification::achievements::find(key).map_or(key.as_str(), |a| a.name);
                    md.push_str(&format!("Achievement unlocked: {}\n", name));
                }
                md
            })
        }
        TaskCommand::Uncomplete(args) => {
            let task = require_task(ctx, &args.id)?;
            let instance = match args.date {
                Some(date) => Some(date),
                None if task.is_recurring() => ctx.db.last_completed_instance(&args.id)?,
                None => None,
            };
            let reversal = ctx.db.uncomplete_task(
                &ctx.user,
                &args.id,
                instance,
                &ctx.config.gamification.level_thresholds,
                ctx.now,
            )?;
            ctx.emit(&reversal, || match &reversal {
                Some(r) => format!(
                    "Reopened **{}**: -{} points ({} total, level {})\n",
                    task.title, r.points_reverted, r.new_total, r.level
                ),
                None => format!("**{}** has no completion to undo\n", task.title),
            })
        }
        TaskCommand::Depend(args) => {
            if args.replace {
                ctx.db.set_dependencies(&args.id, &args.on)?;
            } else {
                for dep in &args.on {
                    if args.remove {
                        ctx.db.remove_dependency(&args.id, dep)?;
                    } else {
                        ctx.db.add_dependency(&args.id, dep)?;
                    }
                }
            }
            let task = require_task(ctx, &args.id)?;
            let unmet = ctx.db.unmet_dependencies(&args.id)?;
            ctx.emit(&task, || format::format_task_markdown(&task, &unmet))
        }
        TaskCommand::Due(args) => {
            let start = args.from.unwrap_or(ctx.today);
            let end = match args.to {
                Some(end) => end,
                None => start
                    .checked_add_days(Days::new(7))
                    .unwrap_or(NaiveDate::MAX),
            };
            let due = ctx.db.due_between(&ctx.user, start, end)?;
            ctx.emit(&due, || {
                let mut md = format!("# Due {} to {}\n\n", start, end);
                for (task, dates) in &due {
                    let dates: Vec<String> = dates.iter().map(|d| d.to_string()).collect();
                    md.push_str(&format!("- {} `{}`: {}\n", task.title, task.id, dates.join(", ")));
                }
                md
            })
        }
        TaskCommand::Share(args) => {
            let permission = args.permission.parse::<Permission>()?;
            let expires_at = args
                .until
                .and_then(|d| d.succ_opt())
                .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc());
            let share = ctx
                .db
                .share_task(&args.id, &ctx.user, &args.with, permission, expires_at)?;
            ctx.emit(&share, || {
                format!(
                    "Shared `{}` with {} ({})\n",
                    share.task_id,
                    share.shared_with,
                    share.permission.as_str()
                )
            })
        }
        TaskCommand::Delete { id } => {
            let deleted = ctx.db.delete_task(&id)?;
            if !deleted {
                return Err(LedgerError::task_not_found(&id).into());
            }
            ctx.emit(&serde_json::json!({ "deleted": id }), || format!("Deleted `{}`\n", id))
        }
    }
}

fn run_habit(ctx: &Context, cmd: HabitCommand) -> Result<()> {
    match cmd {
        HabitCommand::Add(args) => {
            let habit = ctx.db.create_habit(NewHabit {
                id: args.id,
                user_id: ctx.user.clone(),
                name: args.name,
                frequency: args.frequency.parse()?,
                target_count: Some(args.target),
                points: args.points,
            })?;
            ctx.emit(&habit, || format::format_habit_markdown(&habit, false))
        }
        HabitCommand::List => {
            let list = ctx.db.list_habits(&ctx.user, ctx.today)?;
            ctx.emit(&list, || format::format_habits_markdown(&list))
        }
        HabitCommand::Show { id } => {
            let mut habit = ctx
                .db
                .get_habit(&id)?
                .ok_or_else(|| LedgerError::habit_not_found(&id))?;
            habits::recompute(&mut habit, ctx.today);
            let done = habits::is_done_for_period(&habit, ctx.today);
            ctx.emit(&habit, || format::format_habit_markdown(&habit, done))
        }
        HabitCommand::Check(args) => {
            let date = args.date.unwrap_or(ctx.today);
            let habit = ctx.db.check_habit(&args.id, date, ctx.today)?;
            let done = habits::is_done_for_period(&habit, ctx.today);
            ctx.emit(&habit, || format::format_habit_markdown(&habit, done))
        }
        HabitCommand::Uncheck(args) => {
            let date = args.date.unwrap_or(ctx.today);
            let habit = ctx.db.uncheck_habit(&args.id, date, ctx.today)?;
            let done = habits::is_done_for_period(&habit, ctx.today);
            ctx.emit(&habit, || format::format_habit_markdown(&habit, done))
        }
        HabitCommand::Delete { id } => {
            if !ctx.db.delete_habit(&id)? {
                return Err(LedgerError::habit_not_found(&id).into());
            }
            ctx.emit(&serde_json::json!({ "deleted": id }), || format!("Deleted `{}`\n", id))
        }
    }
}

fn run_stats(ctx: &Context) -> Result<()> {
    let stats = ctx.db.get_gamification(&ctx.user, ctx.today)?;
    let unlocked = ctx.db.list_achievements(&ctx.user)?;
    let progress = ctx.config.gamification.level_thresholds.progress(stats.total_points);
    let value = serde_json::json!({
        "stats": stats,
        "progress": progress,
        "achievements": unlocked,
    });
    ctx.emit(&value, || format::format_stats_markdown(&stats, &progress, &unlocked))
}

fn run_heatmap(ctx: &Context, args: HeatmapArgs) -> Result<()> {
    let end = args.to.unwrap_or(ctx.today);
    let mut request = ActivityRequest::last_weeks(&ctx.user, end, args.weeks);
    if let Some(from) = args.from {
        request.start = from;
    }
    request.include_habits = args.habits;

    let grid = ctx.db.activity_grid(&request)?;
    let week_start = ctx.config.calendar.week_start.weekday();
    ctx.emit(&grid, || format::format_heatmap_markdown(&grid, week_start))
}

fn run_expand(ctx: &Context, args: ExpandArgs) -> Result<()> {
    let rule = RecurrenceRule::from_parts(&args.pattern, args.every)?;
    let start = args.from.unwrap_or(args.anchor);
    let dates: Vec<NaiveDate> = recurrence::expand(rule, args.anchor, start, args.to)?.collect();
    ctx.emit(&dates, || {
        format::format_dates_markdown(&format!("Occurrences ({})", rule), &dates)
    })
}
