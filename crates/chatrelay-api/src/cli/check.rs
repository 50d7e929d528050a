//! `relay check`: validate the config and summarize its agents.

use anyhow::Result;
use chatrelay_core::event::EventBus;
use chatrelay_types::config::{AgentConfig, OverflowMode, RelayConfig, SendMode};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde::Serialize;

use super::run::build_relay;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct AgentSummary {
    name: String,
    sources: Vec<String>,
    bots: Vec<String>,
    skills: Vec<String>,
    send_mode: SendMode,
    overflow_mode: OverflowMode,
    history_enabled: bool,
    timeout_seconds: u64,
}

impl AgentSummary {
    fn new(agent: &AgentConfig) -> Self {
        let names = |rules: &[chatrelay_types::rule::MessageRule]| {
            rules.iter().map(|r| r.instance_name.clone()).collect()
        };
        Self {
            name: agent.name.clone(),
            sources: agent.source_instance_names.clone(),
            bots: names(&agent.bot_response_rule),
            skills: names(&agent.skill_rules),
            send_mode: agent.send_mode,
            overflow_mode: agent.overflow_mode,
            history_enabled: agent.history_enabled,
            timeout_seconds: agent.timeout_seconds,
        }
    }
}

#[derive(Debug, Serialize)]
struct CheckReport {
    config_path: String,
    valid: bool,
    agents: Vec<AgentSummary>,
    sources: usize,
    bots: usize,
    skills: usize,
}

fn report(state: &AppState, config: &RelayConfig) -> CheckReport {
    CheckReport {
        config_path: state.config_path.display().to_string(),
        valid: true,
        agents: config.agents.iter().map(AgentSummary::new).collect(),
        sources: config.sources.len(),
        bots: config.bots.len(),
        skills: config.skills.len(),
    }
}

pub async fn check(state: &AppState, json: bool) -> Result<()> {
    let config = state.load_config().await?;
    // instantiating catches unknown kinds and bad plugin options
    build_relay(&config, EventBus::default())?;
    let report = report(state, &config);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {} is valid",
        style("✓").green().bold(),
        style(&report.config_path).cyan()
    );
    println!();

    if report.agents.is_empty() {
        println!(
            "  {} No agents defined. Add an {} table to get started.",
            style("i").blue().bold(),
            style("[[agents]]").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Agent").fg(Color::White),
        Cell::new("Sources").fg(Color::White),
        Cell::new("Bots").fg(Color::White),
        Cell::new("Skills").fg(Color::White),
        Cell::new("Send").fg(Color::White),
        Cell::new("Overflow").fg(Color::White),
        Cell::new("History").fg(Color::White),
    ]);

    for agent in &report.agents {
        let history = if agent.history_enabled {
            Cell::new("● on").fg(Color::Green)
        } else {
            Cell::new("○ off").fg(Color::DarkGrey)
        };
        table.add_row(vec![
            Cell::new(&agent.name).fg(Color::Cyan),
            Cell::new(agent.sources.join(", ")),
            Cell::new(agent.bots.join(", ")),
            Cell::new(agent.skills.join(", ")).fg(Color::DarkGrey),
            Cell::new(send_mode_label(agent.send_mode)),
            Cell::new(overflow_label(agent.overflow_mode)),
            history,
        ]);
    }

    println!("{table}");
    println!();
    println!(
        "  {} agent{}, {} source{}, {} bot{}, {} skill{}",
        style(report.agents.len()).bold(),
        plural(report.agents.len()),
        style(report.sources).bold(),
        plural(report.sources),
        style(report.bots).bold(),
        plural(report.bots),
        style(report.skills).bold(),
        plural(report.skills),
    );
    println!();
    Ok(())
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

fn send_mode_label(mode: SendMode) -> &'static str {
    match mode {
        SendMode::Now => "now",
        SendMode::Queue => "queue",
    }
}

fn overflow_label(mode: OverflowMode) -> &'static str {
    match mode {
        OverflowMode::Pool => "pool",
        OverflowMode::Tips => "tips",
        OverflowMode::PoolTips => "pool+tips",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatrelay_core::config::parse_config;
    use chatrelay_types::rule::MessageRule;

    #[test]
    fn summary_lists_rule_instances() {
        let mut agent = AgentConfig::new("main");
        agent.source_instance_names = vec!["console".into()];
        agent.bot_response_rule = vec![MessageRule::for_instance("echo")];
        agent.skill_rules = vec![
            MessageRule::for_instance("commands"),
            MessageRule::for_instance("tts"),
        ];

        let summary = AgentSummary::new(&agent);
        assert_eq!(summary.bots, vec!["echo"]);
        assert_eq!(summary.skills, vec!["commands", "tts"]);
        assert_eq!(summary.send_mode, SendMode::Queue);
    }

    #[test]
    fn report_serializes_modes_in_config_spelling() {
        let config = parse_config(
            r#"
[[sources]]
kind = "console"
name = "console"

[[bots]]
kind = "echo"
name = "echo"

[[agents]]
name = "main"
source_instance_names = ["console"]
overflow_mode = "pool_tips"

[[agents.bot_response_rule]]
instance_name = "echo"
"#,
        )
        .unwrap();
        let state = AppState::new(Some("config.toml".into()));
        let json = serde_json::to_value(report(&state, &config)).unwrap();
        assert_eq!(json["agents"][0]["overflow_mode"], "pool_tips");
        assert_eq!(json["bots"], 1);
    }
}
