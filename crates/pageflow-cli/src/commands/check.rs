// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use console::style;

use crate::config::Config;

/// Compiles every page and prints diagnostics. Fails if any page does not
/// compile.
pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    let working_dir = std::env::current_dir()?;
    let engine = super::build_engine(&config, &working_dir)?;

    let outcomes = engine.compile_all().await;
    let mut failures = 0;

    for (descriptor, outcome) in &outcomes {
        match outcome {
            Ok(compiled) => println!(
                "{} {} ({})",
                style("ok").green(),
                descriptor.relative_path,
                compiled.page_type.name()
            ),
            Err(err) => {
                failures += 1;
                println!("{} {}", style("error").red().bold(), descriptor.relative_path);
                println!("{}", err);
            }
        }
    }

    println!();
    if failures > 0 {
        anyhow::bail!("{} of {} page(s) failed to compile", failures, outcomes.len());
    }
    println!("{} {} page(s) compiled", style("Done:").green().bold(), outcomes.len());
    Ok(())
}
