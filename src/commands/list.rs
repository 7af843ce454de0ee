use anyhow::Result;
use clap::ArgMatches;
use tokio::runtime::Runtime;

use crate::core::process_monitor::{ProcessManager, QueryOptions, SortField};
use crate::ui::print_process_table;

fn query_options(matches: &ArgMatches) -> QueryOptions {
    QueryOptions {
        search_term: matches
            .get_one::<String>("search")
            .cloned()
            .unwrap_or_default(),
        sort_by: matches
            .get_one::<String>("sort")
            .map(|s| SortField::parse(s))
            .unwrap_or_default(),
        sort_desc: matches.get_flag("desc"),
        show_system: matches.get_flag("system"),
        limit: matches.get_one::<usize>("limit").copied().unwrap_or(0),
        offset: matches.get_one::<usize>("offset").copied().unwrap_or(0),
    }
}

pub fn execute(matches: &ArgMatches, manager: &ProcessManager, runtime: &Runtime) -> Result<()> {
    super::prime_snapshot(manager, runtime)?;

    let options = query_options(matches);
    let result = manager.get_processes(&options)?;

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_process_table(&result);
    }

    Ok(())
}
