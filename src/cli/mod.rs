use crate::{
    BudgetCategory, PlannerConfig, TravelPlanner, TravelPreference, TravelRequest,
};
use anyhow::{bail, Context};
use chrono::{Days, NaiveDate, Utc};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::sync::Arc;
use tracing::{error, info};

fn command() -> Command {
    Command::new("travel-buddy")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Plan a two-day trip from a destination, budget and preferences")
        .subcommand_required(true)
        .subcommand(
            Command::new("plan")
                .about("Build an itinerary and print it as JSON")
                .arg(
                    Arg::new("destination")
                        .help("Destination as \"City, Country\"")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("budget")
                        .short('b')
                        .long("budget")
                        .value_name("USD")
                        .help("Total trip budget")
                        .required(true),
                )
                .arg(
                    Arg::new("category")
                        .short('c')
                        .long("category")
                        .value_name("CATEGORY")
                        .help("budget, moderate or luxury")
                        .default_value("moderate"),
                )
                .arg(
                    Arg::new("prefer")
                        .short('p')
                        .long("prefer")
                        .value_name("PREFERENCE")
                        .help("adventure, culture, relaxation, food, nightlife or family (repeatable)")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("start")
                        .short('s')
                        .long("start")
                        .value_name("YYYY-MM-DD")
                        .help("First day of the trip (defaults to one week from today)"),
                )
                .arg(
                    Arg::new("group-size")
                        .short('g')
                        .long("group-size")
                        .value_name("PEOPLE")
                        .default_value("1"),
                )
                .arg(
                    Arg::new("requirements")
                        .short('r')
                        .long("requirements")
                        .value_name("TEXT")
                        .help("Special requirements, e.g. dietary restrictions"),
                )
                .arg(
                    Arg::new("repeat")
                        .long("repeat")
                        .value_name("N")
                        .help("Issue N identical requests concurrently and print planner stats")
                        .default_value("1"),
                ),
        )
}

fn request_from(matches: &ArgMatches) -> anyhow::Result<TravelRequest> {
    let destination = matches
        .get_one::<String>("destination")
        .context("destination is required")?;
    let budget: f64 = matches
        .get_one::<String>("budget")
        .context("budget is required")?
        .parse()
        .context("budget must be a number")?;
    let category: BudgetCategory = matches
        .get_one::<String>("category")
        .map(String::as_str)
        .unwrap_or("moderate")
        .parse()?;

    let mut preferences = Vec::new();
    if let Some(values) = matches.get_many::<String>("prefer") {
        for value in values {
            preferences.push(value.parse::<TravelPreference>()?);
        }
    }
    if preferences.is_empty() {
        preferences.push(TravelPreference::Culture);
    }

    let start = match matches.get_one::<String>("start") {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .with_context(|| format!("invalid start date `{raw}`"))?,
        None => Utc::now()
            .date_naive()
            .checked_add_days(Days::new(7))
            .context("start date out of range")?,
    };
    let group_size: u32 = matches
        .get_one::<String>("group-size")
        .map(String::as_str)
        .unwrap_or("1")
        .parse()
        .context("group size must be a whole number")?;

    let mut request = TravelRequest::new(destination.as_str(), budget, category, preferences, start)
        .with_group_size(group_size);
    if let Some(requirements) = matches.get_one::<String>("requirements") {
        request = request.with_special_requirements(requirements.as_str());
    }
    Ok(request)
}

async fn plan(matches: &ArgMatches) -> anyhow::Result<()> {
    let request = request_from(matches)?;
    let repeat: usize = matches
        .get_one::<String>("repeat")
        .map(String::as_str)
        .unwrap_or("1")
        .parse()
        .context("repeat must be a whole number")?;
    if repeat == 0 {
        bail!("repeat must be at least 1");
    }

    let planner = Arc::new(TravelPlanner::from_config(PlannerConfig::from_env()?).await?);
    info!(destination = %request.destination, repeat, "planning itinerary");

    let calls = (0..repeat).map(|_| {
        let planner = Arc::clone(&planner);
        let request = request.clone();
        async move { planner.respond(request).await }
    });
    let responses = futures::future::join_all(calls).await;

    if let Some(response) = responses.first() {
        println!("{}", serde_json::to_string_pretty(response)?);
        if !response.success {
            error!(
                code = response.error_code.as_deref().unwrap_or("UNKNOWN_ERROR"),
                "planning failed"
            );
        }
    }
    if repeat > 1 {
        println!("{}", serde_json::to_string_pretty(&planner.stats())?);
    }
    Ok(())
}

/// CLI entry point for the travel-buddy binary
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let matches = command().get_matches();
    match matches.subcommand() {
        Some(("plan", plan_matches)) => plan(plan_matches).await,
        _ => bail!("unknown command"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_arguments_build_a_request() {
        let matches = command().get_matches_from([
            "travel-buddy",
            "plan",
            "Lisbon, Portugal",
            "--budget",
            "650",
            "--category",
            "budget",
            "-p",
            "food",
            "-p",
            "nightlife",
            "--start",
            "2030-05-04",
            "--group-size",
            "2",
        ]);
        let (_, plan_matches) = matches.subcommand().unwrap();
        let request = request_from(plan_matches).unwrap();

        assert_eq!(request.destination, "Lisbon, Portugal");
        assert_eq!(request.budget_category, BudgetCategory::Budget);
        assert_eq!(
            request.travel_preferences,
            vec![TravelPreference::Food, TravelPreference::Nightlife]
        );
        assert_eq!(request.group_size, 2);
        assert_eq!(request.start_date, NaiveDate::from_ymd_opt(2030, 5, 4).unwrap());
    }

    #[test]
    fn test_bad_budget_is_rejected() {
        let matches =
            command().get_matches_from(["travel-buddy", "plan", "Oslo, Norway", "--budget", "lots"]);
        let (_, plan_matches) = matches.subcommand().unwrap();
        assert!(request_from(plan_matches).is_err());
    }
}
