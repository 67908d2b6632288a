use std::io::{self, BufRead, IsTerminal};

use anstream::{print, println};
use chimera_dice::cpr::{roll_cpr_critical_injury, roll_cpr_d10, HitLocation};
use chimera_dice::notation::parse_roll_and_label;
use chimera_dice::{Engine, LuckProfile, Outcome, Pcg, PresetQueue, RollMode, Tuning};
use chrono::{TimeDelta, Utc};
use clap::Parser;
use rand::SeedableRng;
use owo_colors::OwoColorize;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

/// Roll dice with luck and karma
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Dice expression, optionally followed by a label
    ///
    /// Without it, lines are read from STDIN or an interactive prompt.
    expr: Vec<String>,
    /// How dice are rolled: standard, luck or karma
    #[arg(short, long, default_value_t = RollMode::Standard)]
    mode: RollMode,
    /// Starting karma debt
    #[arg(long, allow_negative_numbers = true)]
    debt: Option<f64>,
    /// Luck used in luck mode, 0 to 100
    #[arg(long)]
    luck: Option<i64>,
    /// Karma debt is kept between -LIMIT and LIMIT
    #[arg(long, value_name = "LIMIT")]
    debt_limit: Option<f64>,
    /// Roll each expression this many times
    #[arg(short = 'n', long, default_value_t = 1)]
    times: u32,
    /// Seed the pseudorandom generator
    #[arg(long)]
    seed: Option<u64>,
    /// Quiet, only show the totals
    #[arg(short, long)]
    quiet: bool,
    /// Show the percentile of each roll and the karma debt
    #[arg(short, long)]
    percentile: bool,
    #[command(flatten)]
    color: colorchoice_clap::Color,
}

/// The only user of a terminal session
const USER: u64 = 0;

struct Session {
    engine: Engine,
    profile: LuckProfile,
    presets: PresetQueue,
    /// For rolls outside the engine, CPR checks
    rng: Pcg,
    mode: RollMode,
    times: u32,
    quiet: bool,
    percentile: bool,
}

impl Session {
    fn run(&mut self, input: &str) {
        let (expr, label) = parse_roll_and_label(input);
        if expr.is_empty() {
            return;
        }
        for _ in 0..self.times {
            let rolled = self.engine.roll_queued(
                expr,
                self.mode,
                &mut self.profile,
                &mut self.presets,
                USER,
                Utc::now(),
            );
            match rolled {
                Ok(out) => self.print(&out, label),
                Err(err) => println!("{}: {err}", "error".red()),
            }
        }
    }

    fn print(&self, out: &Outcome, label: Option<&str>) {
        if self.quiet {
            println!("{out:#}");
            return;
        }
        let label = label.map(|l| format!(" {}", l.italic())).unwrap_or_default();
        let mut extra = String::new();
        if self.percentile {
            if let Some(p) = out.percentile {
                extra.push_str(&format!(" {}", format!("{p:.1}%").dimmed()));
            }
            if let Some(debt) = out.debt {
                extra.push_str(&format!(" {}", format!("debt {debt:+.1}").dimmed()));
            }
        }
        println!("{out}{label}{extra}");
    }

    /// Handle a `:command`, returns false to stop
    fn command(&mut self, line: &str) -> bool {
        let mut parts = line.split_whitespace();
        let cmd = parts.next().unwrap_or_default();
        let arg = parts.next();
        let limit = self.engine.tuning().debt_limit;
        match (cmd, arg) {
            (":q" | ":quit" | ":exit", _) => return false,
            (":mode", None) => println!("{} {}", self.mode.emoji(), self.mode),
            (":mode", Some(mode)) => match mode.parse() {
                Ok(mode) => self.mode = mode,
                Err(err) => println!("{}: {err}", "error".red()),
            },
            (":luck", Some(luck)) => match luck.parse() {
                Ok(luck) => self.profile.set_luck(luck),
                Err(err) => println!("{}: bad luck: {err}", "error".red()),
            },
            (":debt", Some(debt)) => match debt.parse() {
                Ok(debt) => self.profile.set_debt(debt, limit),
                Err(err) => println!("{}: bad debt: {err}", "error".red()),
            },
            (":reset", _) => self.profile.reset_debt(),
            (":stats", _) => self.stats(),
            (":recent", hours) => self.recent(hours.unwrap_or("24")),
            (":history", _) => print!("{}", self.profile.export_history()),
            (":preset", Some(expr)) => self.preset(expr, parts),
            (":cpr", modifier) => match modifier.unwrap_or("0").parse::<i64>() {
                Ok(modifier) => {
                    let check = roll_cpr_d10(&mut self.rng).with_modifier(modifier);
                    println!("{check} = {}", check.total().bold());
                }
                Err(err) => println!("{}: bad modifier: {err}", "error".red()),
            },
            (":crit", Some(location)) => match location.parse::<HitLocation>() {
                Ok(location) => {
                    let (roll, injury) = roll_cpr_critical_injury(&mut self.rng, location);
                    println!("{} {roll}\n{injury}", "2d6".dimmed());
                }
                Err(err) => println!("{}: {err}", "error".red()),
            },
            _ => println!(
                "{}: unknown command, try :mode, :luck, :debt, :reset, :stats, :recent, :history, :preset, :cpr, :crit or :quit",
                "error".red()
            ),
        }
        true
    }

    fn recent(&self, hours: &str) {
        let hours = match hours.parse::<i64>() {
            Ok(h @ 1..=24) => h,
            _ => {
                println!("{}: hours must be between 1 and 24", "error".red());
                return;
            }
        };
        let recent = self.profile.recent_luck(Utc::now(), TimeDelta::hours(hours));
        let luck = recent
            .luck
            .map_or_else(|| "no trackable rolls".to_string(), |l| format!("{l:.1}"));
        println!("{} {} in the last {hours}h", "rolls".bold(), recent.rolls);
        println!("{} {luck}", "recent luck".bold());
        println!("{} {:.1}", "overall luck".bold(), self.profile.natural_luck);
    }

    fn preset<'a>(&mut self, expr: &str, values: impl Iterator<Item = &'a str>) {
        let values: Result<Vec<i64>, _> = values.map(str::parse).collect();
        let queued = match values {
            Ok(values) => self.presets.push(USER, expr, values, Utc::now()),
            Err(err) => {
                println!("{}: bad preset value: {err}", "error".red());
                return;
            }
        };
        match queued {
            Ok(()) => println!("queued {:?} for {expr}", self.presets.pending(USER, expr)),
            Err(err) => println!("{}: {err}", "error".red()),
        }
    }

    fn stats(&self) {
        let p = &self.profile;
        println!("{} {}", "mode".bold(), self.mode);
        println!("{} {:.1}", "natural luck".bold(), p.natural_luck);
        println!("{} {}", "set luck".bold(), p.set_luck);
        println!("{} {:+.1}", "debt".bold(), p.percentile_debt);
        println!(
            "{} {} ({} standard, {} luck, {} karma)",
            "rolls".bold(),
            p.total_rolls(),
            p.standard_rolls,
            p.luck_rolls,
            p.karma_rolls
        );
    }
}

fn repl(session: &mut Session) -> anyhow::Result<()> {
    let mut rl = rustyline::DefaultEditor::new()?;
    loop {
        let prompt = format!("{} ", session.mode.emoji());
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line)?;
                if line.starts_with(':') {
                    if !session.command(line) {
                        break;
                    }
                } else {
                    session.run(line);
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

pub fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.color.write_global();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let mut tuning = Tuning::default();
    if let Some(limit) = cli.debt_limit {
        tuning = tuning.with_debt_limit(limit);
    }
    let engine = match cli.seed {
        Some(seed) => Engine::with_seed(seed),
        None => Engine::new(),
    }
    .with_tuning(tuning);

    let mut profile = LuckProfile::default();
    if let Some(luck) = cli.luck {
        profile.set_luck(luck);
    }
    if let Some(debt) = cli.debt {
        profile.set_debt(debt, engine.tuning().debt_limit);
    }

    let rng = match cli.seed {
        Some(seed) => Pcg::seed_from_u64(seed),
        None => Pcg::from_entropy(),
    };
    let mut session = Session {
        presets: PresetQueue::from(engine.tuning()),
        engine,
        profile,
        rng,
        mode: cli.mode,
        times: cli.times,
        quiet: cli.quiet,
        percentile: cli.percentile,
    };

    if !cli.expr.is_empty() {
        session.run(&cli.expr.join(" "));
        return Ok(());
    }

    let stdin = io::stdin();
    if stdin.is_terminal() {
        repl(&mut session)?;
    } else {
        for line in stdin.lock().lines() {
            session.run(&line?);
        }
    }

    Ok(())
}
