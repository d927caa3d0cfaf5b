pub mod config;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod normalize;
pub mod ranking;
pub mod report;
pub mod summary;
pub mod types;

use std::sync::Arc;

use clap::{ArgGroup, Parser};

use coordinator::{ApplyOutcome, FetchCoordinator};
use error::LicenseError;
use gateway::GatewayClient;
use ranking::{SortDirective, SortField};

/// Look up per-user license downgrade recommendations by cost center.
#[derive(Parser, Debug, Default, PartialEq)]
#[command(name = "license-reduction", version)]
#[command(group(
    ArgGroup::new("target")
        .required(true)
        .multiple(true)
        .args(["list", "cost_center"])
))]
pub struct CliArgs {
    /// Print the available cost centers
    #[arg(long)]
    pub list: bool,

    /// Load recommendations for this cost center
    #[arg(long, value_name = "NAME")]
    pub cost_center: Option<String>,

    /// Filter rows by name, email or user
    #[arg(long, value_name = "TEXT")]
    pub search: Option<String>,

    /// Explicit column sort, e.g. estSavingsUsd:desc
    #[arg(long, value_name = "FIELD[:asc|desc]", value_parser = parse_sort)]
    pub sort: Option<SortDirective>,

    /// Print the table view as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_sort(raw: &str) -> Result<SortDirective, String> {
    SortDirective::parse(raw).ok_or_else(|| {
        let fields: Vec<&str> = SortField::ALL.iter().map(|f| f.key()).collect();
        format!("expected one of {} with optional :asc or :desc", fields.join(", "))
    })
}

/// CLI entry point. Returns the process exit code.
pub fn run() -> i32 {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return e.exit_code();
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            return 1;
        }
    };

    match runtime.block_on(execute(args)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}\n{}", e, e.recovery_suggestion());
            1
        }
    }
}

async fn execute(args: CliArgs) -> Result<i32, LicenseError> {
    let config = config::load_config()?;
    let ttl = config.cost_center_ttl_minutes;
    let client = GatewayClient::new(config)?;
    log::info!(
        "Using {:?} source at {}",
        client.source_kind(),
        client.api_base()
    );
    let coord = FetchCoordinator::new(Arc::new(client), ttl);

    if args.list {
        for name in coord.cost_centers().await? {
            println!("{}", name);
        }
    }

    let Some(cost_center) = args.cost_center else {
        return Ok(0);
    };

    if coord.select(&cost_center).await == Some(ApplyOutcome::Stale) {
        log::warn!("Selection changed while loading {}", cost_center);
    }
    if let Some(search) = &args.search {
        coord.set_search_text(search);
    }
    coord.set_sort(args.sort);

    let view = coord.view();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&view).map_err(LicenseError::from)?);
    } else {
        print!("{}", report::render_table(&view));
    }

    Ok(if view.failure().is_some() { 1 } else { 0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use ranking::SortDirection;

    fn args(list: &[&str]) -> Result<CliArgs, clap::Error> {
        CliArgs::try_parse_from(std::iter::once("license-reduction").chain(list.iter().copied()))
    }

    #[test]
    fn test_cli_parse_full() {
        let parsed = args(&[
            "--cost-center",
            "T1 MIE",
            "--search",
            "am",
            "--sort",
            "user:desc",
            "--json",
        ])
        .unwrap();
        assert_eq!(parsed.cost_center.as_deref(), Some("T1 MIE"));
        assert_eq!(parsed.search.as_deref(), Some("am"));
        assert_eq!(
            parsed.sort,
            Some(SortDirective {
                field: SortField::User,
                direction: SortDirection::Descending,
            })
        );
        assert!(parsed.json);
    }

    #[test]
    fn test_cli_parse_list_only() {
        let parsed = args(&["--list"]).unwrap();
        assert!(parsed.list);
        assert!(parsed.cost_center.is_none());
    }

    #[test]
    fn test_cli_requires_list_or_cost_center() {
        let err = args(&[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        let err = args(&["--search", "am"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_parse_errors() {
        assert!(args(&["--cost-center"]).is_err());
        assert_eq!(
            args(&["--cost-center", "X", "--sort", "bogus"])
                .unwrap_err()
                .kind(),
            ErrorKind::ValueValidation
        );
        assert_eq!(
            args(&["--frobnicate"]).unwrap_err().kind(),
            ErrorKind::UnknownArgument
        );
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        CliArgs::command().debug_assert();
    }
}
