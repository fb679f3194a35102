//! talkroom - chat export recap CLI
//!
//! Reads a KakaoTalk chat export and prints statistics and awards.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use talkroom_core::ingest::parse_chat_with_report;
use talkroom_core::{
    compute_stats_with, read_export, time, ActivityStats, AwardKind, Config, Error, RoomStatsData,
};

#[derive(Parser, Debug)]
#[command(name = "talkroom")]
#[command(about = "Statistics and awards for a KakaoTalk chat export")]
#[command(version)]
struct Args {
    /// Chat export file (.txt)
    file: PathBuf,

    /// Export format (md = markdown, json = JSON)
    #[arg(long)]
    export: Option<String>,

    /// Quick-reply window in minutes (overrides config)
    #[arg(long)]
    quick_reply_minutes: Option<u32>,

    /// Config file (default: $XDG_CONFIG_HOME/talkroom/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

/// What gets printed: the stats plus the header fields the parser found.
struct Report {
    title: Option<String>,
    exported_at: Option<String>,
    stats: RoomStatsData,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Config::load().context("failed to load configuration")?,
    };
    if let Some(minutes) = args.quick_reply_minutes {
        config.stats.quick_reply_minutes = minutes;
    }
    let _log_guard = talkroom_core::logging::init(&config.logging).ok();

    let text = read_export(&args.file, &config.upload).map_err(coded)?;

    let (chat, report) = parse_chat_with_report(&text);
    tracing::info!(
        lines = report.lines,
        unknown_lines = report.unknown_lines,
        invalid_timestamps = report.invalid_timestamps,
        messages = chat.messages.len(),
        participants = chat.participants.len(),
        "Parsed export"
    );

    if chat.messages.is_empty() {
        return Err(coded(Error::EmptyChat));
    }
    if chat.participants.is_empty() {
        return Err(coded(Error::NoParticipants));
    }

    let stats = compute_stats_with(&chat.messages, &chat.participants, &config.stats);
    let report = Report {
        title: chat.title,
        exported_at: chat.exported_at,
        stats,
    };

    match args.export.as_deref() {
        Some("json") => print_json(&report.stats)?,
        Some("md") => print_markdown(&report),
        Some(other) => anyhow::bail!("Unknown export format: {}. Use 'md' or 'json'", other),
        None => print_terminal(&report),
    }

    Ok(())
}

/// Prefix the stable error code so scripts can match on it.
fn coded(e: Error) -> anyhow::Error {
    anyhow::anyhow!("{}: {}", e.code(), e)
}

/// Display name for an award winner's alias.
fn winner_name(stats: &RoomStatsData, kind: AwardKind) -> Option<String> {
    let award = stats.award(kind)?;
    if award.participant.is_empty() {
        return None;
    }
    let name = stats
        .participant(&award.participant)
        .map(|p| format!("{} ({})", p.display_name, p.alias))
        .unwrap_or_else(|| award.participant.clone());
    Some(name)
}

fn print_terminal(report: &Report) {
    let stats = &report.stats;
    let title = report.title.as_deref().unwrap_or("대화");

    // Header
    println!();
    println!("╭{}╮", "─".repeat(60));
    println!("│{:^60}│", title);
    println!("╰{}╯", "─".repeat(60));
    println!();

    // The Numbers
    println!("📊 THE NUMBERS");
    println!(
        "   Messages: {:<12} Attachments: {}",
        stats.total_messages, stats.total_attachments
    );
    println!(
        "   People:   {:<12} Bursts: {}",
        stats.participants.len(),
        stats.bursts.len()
    );
    if let Some(exported_at) = &report.exported_at {
        println!("   Export:   {}", exported_at);
    }
    println!();

    // Participants, busiest first
    println!("👥 PARTICIPANTS");
    let mut ranked: Vec<_> = stats.participants.iter().collect();
    ranked.sort_by(|a, b| b.message_count.cmp(&a.message_count));
    for p in ranked {
        println!(
            "   {:<4} {:<16} {:>6} msgs   ㅋ {:<5} ㅠ {:<5} !? {}",
            p.alias,
            p.display_name,
            p.message_count,
            p.top_tokens.laughter,
            p.top_tokens.cry,
            p.top_tokens.punctuation
        );
    }
    println!();

    // Time Patterns
    println!("⏰ TIME PATTERNS (KST)");
    match stats.activity.peak_hour() {
        Some(hour) => println!("   Peak hour:    {}", ActivityStats::hour_display(hour)),
        None => println!("   Peak hour:    -"),
    }
    match stats.activity.busiest_weekday() {
        Some(day) => println!("   Busiest day:  {}", ActivityStats::day_name(day)),
        None => println!("   Busiest day:  -"),
    }
    if let Some(burst) = stats.bursts.iter().max_by_key(|b| b.message_count) {
        println!(
            "   Biggest burst: {} messages from {}",
            burst.message_count,
            time::to_iso(&burst.start)
        );
    }
    println!();

    // Awards
    println!("🏆 AWARDS");
    for kind in AwardKind::ALL {
        let winner = winner_name(stats, kind).unwrap_or_else(|| "-".to_string());
        println!("   {:<12} {}", kind.title(), winner);
    }
    println!();
}

fn print_markdown(report: &Report) {
    let stats = &report.stats;

    println!("# {}", report.title.as_deref().unwrap_or("대화"));
    println!();

    // Summary table
    println!("## Summary");
    println!();
    println!("| Metric | Value |");
    println!("|--------|-------|");
    println!("| Messages | {} |", stats.total_messages);
    println!("| Attachments | {} |", stats.total_attachments);
    println!("| Participants | {} |", stats.participants.len());
    println!("| Bursts | {} |", stats.bursts.len());
    println!();

    // Participants
    println!("## Participants");
    println!();
    println!("| Alias | Name | Messages | Laughter | Crying | Punctuation |");
    println!("|-------|------|----------|----------|--------|-------------|");
    for p in &stats.participants {
        println!(
            "| {} | {} | {} | {} | {} | {} |",
            p.alias,
            p.display_name,
            p.message_count,
            p.top_tokens.laughter,
            p.top_tokens.cry,
            p.top_tokens.punctuation
        );
    }
    println!();

    // Time Patterns
    println!("## Time Patterns");
    println!();
    if let Some(hour) = stats.activity.peak_hour() {
        println!("- **Peak hour:** {}", ActivityStats::hour_display(hour));
    }
    if let Some(day) = stats.activity.busiest_weekday() {
        println!("- **Busiest day:** {}", ActivityStats::day_name(day));
    }
    println!();

    // Awards
    println!("## Awards");
    println!();
    for kind in AwardKind::ALL {
        match winner_name(stats, kind) {
            Some(name) => println!("- **{}** {} - *{}*", kind.title(), name, kind.description()),
            None => println!("- **{}** -", kind.title()),
        }
    }
}

fn print_json(stats: &RoomStatsData) -> Result<()> {
    let json = serde_json::to_string_pretty(stats).context("failed to serialize stats")?;
    println!("{}", json);
    Ok(())
}
